use std::collections::HashMap;
use std::path::Path;

use calamine::{Data, Reader};

use crate::error::{Result, TaskbookError};
use crate::models::{Cell, SourceRow};

// Row 1 of the register is a banner; headers sit on row 2.
const HEADER_ROW: usize = 1;

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    No,
    EnterDate,
    StaffName,
    Name,
    PhNo,
    Place,
    District,
    SiteVisitDate,
    SiteVisitPayment,
    Highlight,
    Tags,
    WorkStatus,
    WorkStartDate,
    Remarks,
}

pub const ALL_COLUMNS: &[Column] = &[
    Column::No,
    Column::EnterDate,
    Column::StaffName,
    Column::Name,
    Column::PhNo,
    Column::Place,
    Column::District,
    Column::SiteVisitDate,
    Column::SiteVisitPayment,
    Column::Highlight,
    Column::Tags,
    Column::WorkStatus,
    Column::WorkStartDate,
    Column::Remarks,
];

impl Column {
    /// Header text exactly as the register spells it. The trailing space in
    /// `NAME ` and the double space in the payment header are real.
    pub fn header(&self) -> &'static str {
        match self {
            Self::No => "NO",
            Self::EnterDate => "ENTER DATE",
            Self::StaffName => "STAFF NAME",
            Self::Name => "NAME ",
            Self::PhNo => "PH NO",
            Self::Place => "PLACE",
            Self::District => "DISTRICT",
            Self::SiteVisitDate => "SITE VISIT DATE",
            Self::SiteVisitPayment => "SITE VISIT  PAYMENT",
            Self::Highlight => "HIGHLIGHT",
            Self::Tags => "TAGS",
            Self::WorkStatus => "WORK STATUS",
            Self::WorkStartDate => "WORK START DATE",
            Self::Remarks => "REMARKS",
        }
    }

    pub fn is_required(&self) -> bool {
        !matches!(
            self,
            Self::Tags | Self::WorkStatus | Self::WorkStartDate | Self::Remarks
        )
    }

    pub fn from_header(header: &str) -> Option<Column> {
        ALL_COLUMNS.iter().find(|c| c.header() == header).copied()
    }
}

/// Positions of known columns in the header row.
#[derive(Debug, Default)]
pub struct HeaderMap {
    positions: HashMap<Column, usize>,
    pub unknown: Vec<String>,
}

impl HeaderMap {
    pub fn position(&self, column: Column) -> Option<usize> {
        self.positions.get(&column).copied()
    }

    fn cell<'a>(&self, row: &'a [Cell], column: Column) -> Option<&'a Cell> {
        self.position(column).and_then(|i| row.get(i))
    }

    fn cell_value(&self, row: &[Cell], column: Column) -> Cell {
        self.cell(row, column).cloned().unwrap_or_default()
    }

    fn text(&self, row: &[Cell], column: Column) -> String {
        self.cell(row, column).map(Cell::to_text).unwrap_or_default()
    }
}

/// Validate a header row. Every required column must be present; unknown
/// headers are kept aside so the operator can see them.
pub fn map_headers(headers: &[Cell]) -> Result<HeaderMap> {
    let mut map = HeaderMap::default();
    for (i, cell) in headers.iter().enumerate() {
        let text = cell.to_text();
        if text.trim().is_empty() {
            continue;
        }
        match Column::from_header(&text) {
            Some(column) => {
                if map.positions.contains_key(&column) {
                    tracing::warn!(header = %text, position = i, "repeated column ignored");
                } else {
                    map.positions.insert(column, i);
                }
            }
            None => {
                tracing::warn!(header = %text, "unrecognized column ignored");
                map.unknown.push(text);
            }
        }
    }

    let missing: Vec<String> = ALL_COLUMNS
        .iter()
        .filter(|c| c.is_required() && !map.positions.contains_key(c))
        .map(|c| format!("{:?}", c.header()))
        .collect();
    if !missing.is_empty() {
        return Err(TaskbookError::MissingHeaders(missing));
    }
    Ok(map)
}

// ---------------------------------------------------------------------------
// Sheet → rows
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SourceSheet {
    pub rows: Vec<SourceRow>,
    pub unknown_headers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceFormat {
    Workbook,
    Csv,
}

impl SourceFormat {
    pub fn detect(file_path: &Path) -> Option<SourceFormat> {
        let ext = file_path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(Self::Workbook),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// Read the first sheet of a register file into typed rows. Any failure here
/// is fatal for the run.
pub fn read_source(file_path: &Path) -> Result<SourceSheet> {
    let format = SourceFormat::detect(file_path)
        .ok_or_else(|| TaskbookError::UnsupportedFormat(file_path.display().to_string()))?;
    let grid = match format {
        SourceFormat::Workbook => read_workbook_grid(file_path)?,
        SourceFormat::Csv => read_csv_grid(file_path)?,
    };
    rows_from_grid(grid).map_err(|e| match e {
        TaskbookError::EmptySheet(_) => TaskbookError::EmptySheet(file_path.display().to_string()),
        other => other,
    })
}

/// Turn an absolutely positioned grid (row 0 = banner) into source rows.
pub fn rows_from_grid(grid: Vec<Vec<Cell>>) -> Result<SourceSheet> {
    let headers = grid
        .get(HEADER_ROW)
        .filter(|row| row.iter().any(|c| !c.is_blank()))
        .ok_or_else(|| TaskbookError::EmptySheet(String::new()))?;
    let map = map_headers(headers)?;

    let mut rows = Vec::new();
    for (i, cells) in grid.iter().enumerate().skip(HEADER_ROW + 1) {
        if cells.iter().all(Cell::is_blank) {
            continue;
        }
        rows.push(SourceRow {
            line: i + 1,
            no: map.text(cells, Column::No),
            entry_date: map.cell_value(cells, Column::EnterDate),
            staff: map.text(cells, Column::StaffName),
            client_name: map.text(cells, Column::Name),
            phone: map.text(cells, Column::PhNo),
            place: map.text(cells, Column::Place),
            district: map.text(cells, Column::District),
            site_visit_date: map.cell_value(cells, Column::SiteVisitDate),
            site_visit_payment: map.text(cells, Column::SiteVisitPayment),
            work_status: map.text(cells, Column::WorkStatus),
            work_start_date: map.text(cells, Column::WorkStartDate),
            remarks: map.text(cells, Column::Remarks),
            tags: map.text(cells, Column::Tags),
            highlight: map.text(cells, Column::Highlight),
        });
    }

    Ok(SourceSheet {
        rows,
        unknown_headers: map.unknown,
    })
}

pub fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        // Kept as text so a broken date cell is reported, not read as blank
        Data::Error(e) => Cell::Text(e.to_string()),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// Load the first worksheet as a grid anchored at A1, so row offsets hold
/// even when leading rows or columns are empty.
pub fn read_workbook_grid(file_path: &Path) -> Result<Vec<Vec<Cell>>> {
    let mut workbook = calamine::open_workbook_auto(file_path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| TaskbookError::EmptySheet(file_path.display().to_string()))??;

    let Some((start_row, start_col)) = range.start() else {
        return Ok(Vec::new());
    };
    let mut grid: Vec<Vec<Cell>> = vec![Vec::new(); start_row as usize];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; start_col as usize];
        cells.extend(row.iter().map(cell_from_data));
        grid.push(cells);
    }
    Ok(grid)
}

pub fn read_csv_grid(file_path: &Path) -> Result<Vec<Vec<Cell>>> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));
    let mut grid = Vec::new();
    for result in rdr.records() {
        let record = result?;
        grid.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER_LINE: &str =
        "NO,ENTER DATE,STAFF NAME,NAME ,PH NO,PLACE,DISTRICT,SITE VISIT DATE,SITE VISIT  PAYMENT,HIGHLIGHT";

    fn text_row(fields: &[&str]) -> Vec<Cell> {
        fields
            .iter()
            .map(|f| if f.is_empty() { Cell::Empty } else { Cell::Text(f.to_string()) })
            .collect()
    }

    fn header_cells() -> Vec<Cell> {
        text_row(&HEADER_LINE.split(',').collect::<Vec<_>>())
    }

    #[test]
    fn test_header_texts_are_verbatim() {
        assert_eq!(Column::Name.header(), "NAME ");
        assert_eq!(Column::SiteVisitPayment.header(), "SITE VISIT  PAYMENT");
        assert_eq!(Column::from_header("NAME"), None);
        assert_eq!(Column::from_header("SITE VISIT PAYMENT"), None);
    }

    #[test]
    fn test_map_headers_accepts_required_set() {
        let map = map_headers(&header_cells()).unwrap();
        assert_eq!(map.position(Column::No), Some(0));
        assert_eq!(map.position(Column::Highlight), Some(9));
        assert_eq!(map.position(Column::Tags), None);
        assert!(map.unknown.is_empty());
    }

    #[test]
    fn test_map_headers_reports_all_missing() {
        let headers = text_row(&["NO", "ENTER DATE", "STAFF NAME", "NAME", "PH NO"]);
        let err = map_headers(&headers).unwrap_err();
        match err {
            TaskbookError::MissingHeaders(missing) => {
                assert!(missing.contains(&"\"NAME \"".to_string()));
                assert!(missing.contains(&"\"SITE VISIT  PAYMENT\"".to_string()));
                assert_eq!(missing.len(), 6);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_map_headers_keeps_unknown() {
        let mut headers = header_cells();
        headers.push(Cell::Text("FOLLOW UP".into()));
        let map = map_headers(&headers).unwrap();
        assert_eq!(map.unknown, vec!["FOLLOW UP".to_string()]);
    }

    #[test]
    fn test_rows_from_grid_skips_banner_and_blank_rows() {
        let grid = vec![
            text_row(&["CALL REGISTER 2025"]),
            header_cells(),
            text_row(&["1", "28-09-2025", "Rahul", "Anu", "9876543210", "Aluva", "Ernakulam", "", "500", "yellow"]),
            vec![Cell::Empty, Cell::Text("  ".into())],
            text_row(&["2", "", "Rahul", "Biju", "9876500000", "Kakkanad", "", "", "", ""]),
        ];
        let sheet = rows_from_grid(grid).unwrap();
        assert_eq!(sheet.rows.len(), 2);
        let first = &sheet.rows[0];
        assert_eq!(first.line, 3);
        assert_eq!(first.client_name, "Anu");
        assert_eq!(first.entry_date, Cell::Text("28-09-2025".into()));
        assert_eq!(first.site_visit_payment, "500");
        assert_eq!(first.highlight, "yellow");
        assert_eq!(sheet.rows[1].line, 5);
        assert!(!sheet.rows[1].has_district());
    }

    #[test]
    fn test_rows_from_grid_short_rows_fill_empty() {
        let grid = vec![
            Vec::new(),
            header_cells(),
            vec![Cell::Number(1.0), Cell::Number(45928.0), Cell::Text("Rahul".into())],
        ];
        let sheet = rows_from_grid(grid).unwrap();
        assert_eq!(sheet.rows[0].no, "1");
        assert_eq!(sheet.rows[0].entry_date, Cell::Number(45928.0));
        assert_eq!(sheet.rows[0].phone, "");
        assert_eq!(sheet.rows[0].site_visit_date, Cell::Empty);
    }

    #[test]
    fn test_rows_from_grid_without_header_row() {
        let grid = vec![text_row(&["CALL REGISTER"])];
        assert!(matches!(rows_from_grid(grid), Err(TaskbookError::EmptySheet(_))));
    }

    #[test]
    fn test_numeric_phone_cells_keep_all_digits() {
        assert_eq!(cell_from_data(&Data::Float(9876543210.0)).to_text(), "9876543210");
        assert_eq!(cell_from_data(&Data::Int(9876543210)).to_text(), "9876543210");
    }

    #[test]
    fn test_error_cells_are_kept_and_flagged_as_dates() {
        let cell = cell_from_data(&Data::Error(calamine::CellErrorType::Value));
        assert_eq!(cell, Cell::Text("#VALUE!".into()));
        assert!(!cell.is_blank());
        assert_eq!(
            crate::normalize::coerce_date(&cell),
            crate::normalize::DateValue::Invalid("#VALUE!".into())
        );
    }

    #[test]
    fn test_read_source_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("register.csv");
        let content = format!(
            "CALL REGISTER\n{HEADER_LINE},TAGS\n1,28-09-2025,Rahul,Anu,09876543210,Aluva,Ernakulam,,500,,WORK STARTED\n"
        );
        std::fs::write(&path, content).unwrap();
        let sheet = read_source(&path).unwrap();
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0].phone, "09876543210");
        assert_eq!(sheet.rows[0].tags, "WORK STARTED");
    }

    #[test]
    fn test_read_source_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("register.txt");
        std::fs::write(&path, "x").unwrap();
        assert!(matches!(read_source(&path), Err(TaskbookError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_read_source_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_source(&dir.path().join("nope.csv")).is_err());
    }
}
