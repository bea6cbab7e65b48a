//! Per-row normalization: date coercion and tag derivation.
//!
//! Everything here is a pure function of a single row. Nothing is carried
//! from one row to the next.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::models::{Cell, SourceRow};
use crate::settings::TagDef;

/// Outcome of coercing one date cell.
#[derive(Debug, Clone, PartialEq)]
pub enum DateValue {
    Empty,
    Date(NaiveDate),
    /// Could not be parsed; holds the raw text for review.
    Invalid(String),
}

impl DateValue {
    pub fn as_iso(&self) -> Option<String> {
        match self {
            Self::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            _ => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }
}

/// A source row with its dates coerced and its tag derived.
#[derive(Debug, Clone)]
pub struct NormalizedRow {
    pub source: SourceRow,
    pub entry_date: DateValue,
    pub site_visit_date: DateValue,
    pub tags: String,
}

impl NormalizedRow {
    pub fn has_invalid_date(&self) -> bool {
        self.entry_date.is_invalid() || self.site_visit_date.is_invalid()
    }
}

pub fn normalize_row(source: SourceRow) -> NormalizedRow {
    let entry_date = coerce_date(&source.entry_date);
    let site_visit_date = coerce_date(&source.site_visit_date);
    let tags = derive_tag(&source.tags, &source.highlight);
    NormalizedRow {
        source,
        entry_date,
        site_visit_date,
        tags,
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

// Serial 2958465 is 9999-12-31, the last date a workbook can hold.
const MAX_SERIAL: f64 = 2_958_465.0;

const FOUR_DIGIT_YEAR_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%d-%m-%Y",
    "%d %b %Y",
    "%d-%b-%Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

const TWO_DIGIT_YEAR_FORMATS: &[&str] = &["%d-%m-%y", "%d/%m/%y", "%d.%m.%y", "%d-%b-%y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

fn strict_dmy() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{2})-(\d{2})-(\d{4})$").expect("valid date pattern"))
}

fn five_digit_serial() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{5}(\.\d+)?$").expect("valid serial pattern"))
}

/// Convert a workbook serial date to a calendar date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_SERIAL {
        return None;
    }
    // Epoch is 1899-12-30, which absorbs the 1900 leap year bug
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(chrono::Duration::days(serial.trunc() as i64))
}

/// Coerce a raw date cell. Empty is not an error; anything unparseable is
/// kept as `Invalid` with its raw text.
pub fn coerce_date(cell: &Cell) -> DateValue {
    if cell.is_blank() {
        return DateValue::Empty;
    }
    let parsed = match cell {
        Cell::Number(n) => excel_serial_to_date(*n),
        Cell::Text(s) => parse_text_date(s.trim()),
        Cell::Empty => None,
    };
    match parsed {
        Some(date) => DateValue::Date(date),
        None => DateValue::Invalid(cell.to_text()),
    }
}

fn parse_text_date(raw: &str) -> Option<NaiveDate> {
    // dd-mm-yyyy is what the register's date column holds; take it first
    // so it is never read month-first.
    if let Some(caps) = strict_dmy().captures(raw) {
        let d: u32 = caps[1].parse().ok()?;
        let m: u32 = caps[2].parse().ok()?;
        let y: i32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d).filter(|date| date.year() >= 1000);
    }

    if five_digit_serial().is_match(raw) {
        return raw.parse::<f64>().ok().and_then(excel_serial_to_date);
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }

    for fmt in FOUR_DIGIT_YEAR_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            // %Y happily reads "25" as year 25; leave those for the %y pass
            if date.year() >= 1000 {
                return Some(date);
            }
        }
    }

    TWO_DIGIT_YEAR_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

pub const SITE_VISITED: &str = "SITE VISITED";
pub const CANCELLED: &str = "CANCELLED";

/// Derive a row's tag text from its own cells only: the explicit tags cell
/// wins, otherwise the highlight color stands in for it.
pub fn derive_tag(explicit: &str, highlight: &str) -> String {
    let explicit = explicit.trim();
    if !explicit.is_empty() {
        return explicit.to_string();
    }
    match highlight.trim().to_lowercase().as_str() {
        "yellow" => SITE_VISITED.to_string(),
        "blue" => CANCELLED.to_string(),
        _ => String::new(),
    }
}

/// Lowercase, trim, and collapse runs of whitespace. Used for district and
/// tag name lookups.
pub fn canonical_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// The closed set of tag names the store recognizes, keyed to tag ids.
#[derive(Debug, Clone, Default)]
pub struct TagVocabulary {
    by_name: HashMap<String, String>,
}

impl TagVocabulary {
    pub fn from_defs(defs: &[TagDef]) -> Self {
        let mut by_name = HashMap::new();
        for def in defs {
            by_name
                .entry(canonical_name(&def.name))
                .or_insert_with(|| def.id.clone());
            for alias in &def.aliases {
                by_name
                    .entry(canonical_name(alias))
                    .or_insert_with(|| def.id.clone());
            }
        }
        Self { by_name }
    }

    pub fn lookup(&self, text: &str) -> Option<&str> {
        self.by_name.get(&canonical_name(text)).map(String::as_str)
    }

    /// Tag ids for a derived tag string. A whole-string match wins; failing
    /// that, a comma-separated list (as the tracker's own export writes
    /// them) is looked up name by name. Unknown names are skipped.
    pub fn tag_ids(&self, derived: &str) -> Vec<String> {
        if derived.trim().is_empty() {
            return Vec::new();
        }
        if let Some(id) = self.lookup(derived) {
            return vec![id.to_string()];
        }
        let mut ids: Vec<String> = Vec::new();
        for part in derived.split(',') {
            match self.lookup(part) {
                Some(id) if !ids.iter().any(|existing| existing == id) => ids.push(id.to_string()),
                Some(_) => {}
                None => {
                    tracing::debug!(tag = part.trim(), "unrecognized tag text");
                }
            }
        }
        ids
    }
}
