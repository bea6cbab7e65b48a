use crate::fmt::plain_number;

/// A raw spreadsheet cell, reduced to what reconciliation needs.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(_) => false,
        }
    }

    /// Render the cell as text. Numbers never come out in scientific notation.
    pub fn to_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => plain_number(*n),
        }
    }
}

/// One data row of the source register, as read from the sheet.
#[derive(Debug, Clone, Default)]
pub struct SourceRow {
    /// 1-based line number in the source sheet.
    pub line: usize,
    pub no: String,
    pub entry_date: Cell,
    pub staff: String,
    pub client_name: String,
    pub phone: String,
    pub place: String,
    pub district: String,
    pub site_visit_date: Cell,
    pub site_visit_payment: String,
    pub work_status: String,
    pub work_start_date: String,
    pub remarks: String,
    pub tags: String,
    pub highlight: String,
}

impl SourceRow {
    pub fn phone_key(&self) -> &str {
        self.phone.trim()
    }

    pub fn has_district(&self) -> bool {
        !self.district.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct District {
    pub id: String,
    pub name: String,
}

/// A task ready for insertion into the `tasks` table.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub id: String,
    pub client_name: String,
    pub phone_number: String,
    pub place: String,
    /// Empty when the district name had no match.
    pub district_id: String,
    pub site_visit_payment: String,
    pub site_visit_date: Option<String>,
    pub entry_date: Option<String>,
    pub staff: String,
}

impl TaskRecord {
    pub const COLUMNS: [&'static str; 9] = [
        "id",
        "client_name",
        "phone_number",
        "place",
        "district_id",
        "site_visit_payment",
        "site_visit_date",
        "entry_date",
        "staff",
    ];

    pub fn to_fields(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.client_name.clone(),
            self.phone_number.clone(),
            self.place.clone(),
            self.district_id.clone(),
            self.site_visit_payment.clone(),
            self.site_visit_date.clone().unwrap_or_default(),
            self.entry_date.clone().unwrap_or_default(),
            self.staff.clone(),
        ]
    }
}

/// Association between a generated task and one of the fixed tags.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskTagRecord {
    pub task_id: String,
    pub tag_id: String,
}

impl TaskTagRecord {
    pub const COLUMNS: [&'static str; 2] = ["task_id", "tag_id"];
}
