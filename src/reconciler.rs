use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::district::DistrictIndex;
use crate::error::Result;
use crate::importer::read_source;
use crate::models::{SourceRow, TaskRecord, TaskTagRecord};
use crate::normalize::{normalize_row, NormalizedRow, TagVocabulary};

#[derive(Debug, Clone)]
pub struct DuplicateRow {
    /// 1-based position of this row among rows sharing its phone number.
    pub occurrence: usize,
    pub duplicate_count: usize,
    pub row: NormalizedRow,
}

#[derive(Debug, Clone)]
pub struct DuplicateGroup {
    pub phone: String,
    pub rows: Vec<DuplicateRow>,
}

#[derive(Debug, Default)]
pub struct ReconcileResult {
    pub clean_tasks: Vec<TaskRecord>,
    pub task_tags: Vec<TaskTagRecord>,
    /// Ordered by phone number.
    pub duplicate_groups: Vec<DuplicateGroup>,
    /// Drawn from every source row, before duplicates are split out.
    pub invalid_date_rows: Vec<NormalizedRow>,
    /// Clean rows with no district; held back from record generation.
    pub missing_district_rows: Vec<NormalizedRow>,
    pub unmatched_districts: usize,
    pub unknown_headers: Vec<String>,
    pub total_rows: usize,
}

impl ReconcileResult {
    pub fn duplicate_row_count(&self) -> usize {
        self.duplicate_groups.iter().map(|g| g.rows.len()).sum()
    }
}

/// Count rows per trimmed phone number. Blank numbers are left out, so rows
/// without a phone are never grouped together as duplicates.
pub fn phone_frequencies(rows: &[NormalizedRow]) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for row in rows {
        let key = row.source.phone_key();
        if key.is_empty() {
            continue;
        }
        *counts.entry(key.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Run the reconciliation over parsed source rows. `next_id` supplies a
/// fresh task id for each clean row.
pub fn reconcile(
    rows: Vec<SourceRow>,
    districts: &DistrictIndex,
    tags: &TagVocabulary,
    mut next_id: impl FnMut() -> String,
) -> ReconcileResult {
    let total_rows = rows.len();
    let normalized: Vec<NormalizedRow> = rows.into_iter().map(normalize_row).collect();

    let invalid_date_rows: Vec<NormalizedRow> = normalized
        .iter()
        .filter(|r| r.has_invalid_date())
        .cloned()
        .collect();
    for row in &invalid_date_rows {
        tracing::debug!(line = row.source.line, "row has an unparseable date");
    }

    let counts = phone_frequencies(&normalized);
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut groups: BTreeMap<String, Vec<DuplicateRow>> = BTreeMap::new();
    let mut result = ReconcileResult {
        invalid_date_rows,
        total_rows,
        ..Default::default()
    };

    for row in normalized {
        let key = row.source.phone_key().to_string();
        let count = counts.get(&key).copied().unwrap_or(0);
        if count > 1 {
            let occurrence = seen.entry(key.clone()).or_insert(0);
            *occurrence += 1;
            groups.entry(key).or_default().push(DuplicateRow {
                occurrence: *occurrence,
                duplicate_count: count,
                row,
            });
            continue;
        }

        if !row.source.has_district() {
            tracing::debug!(line = row.source.line, "row has no district");
            result.missing_district_rows.push(row);
            continue;
        }

        let district_id = districts.resolve(&row.source.district);
        if district_id.is_empty() {
            tracing::debug!(line = row.source.line, district = %row.source.district, "district not found");
            result.unmatched_districts += 1;
        }

        let task = TaskRecord {
            id: next_id(),
            client_name: row.source.client_name.clone(),
            phone_number: key,
            place: row.source.place.clone(),
            district_id,
            site_visit_payment: row.source.site_visit_payment.clone(),
            site_visit_date: row.site_visit_date.as_iso(),
            entry_date: row.entry_date.as_iso(),
            staff: row.source.staff.clone(),
        };
        for tag_id in tags.tag_ids(&row.tags) {
            result.task_tags.push(TaskTagRecord {
                task_id: task.id.clone(),
                tag_id,
            });
        }
        result.clean_tasks.push(task);
    }

    result.duplicate_groups = groups
        .into_iter()
        .map(|(phone, rows)| DuplicateGroup { phone, rows })
        .collect();
    result
}

/// Read a register file and reconcile it with fresh UUID task ids.
pub fn reconcile_file(
    file_path: &Path,
    districts: &DistrictIndex,
    tags: &TagVocabulary,
) -> Result<ReconcileResult> {
    let sheet = read_source(file_path)?;
    tracing::info!(rows = sheet.rows.len(), file = %file_path.display(), "register loaded");
    let mut result = reconcile(sheet.rows, districts, tags, || {
        uuid::Uuid::new_v4().to_string()
    });
    result.unknown_headers = sheet.unknown_headers;
    Ok(result)
}
