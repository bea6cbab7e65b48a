use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::TaskRow;
use crate::error::{Result, TaskbookError};
use crate::importer::{read_csv_grid, read_workbook_grid, Column};
use crate::models::{Cell, TaskRecord, TaskTagRecord};
use crate::normalize::{DateValue, NormalizedRow};
use crate::reconciler::ReconcileResult;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Xlsx,
    Csv,
}

impl Default for OutputFormat {
    fn default() -> Self {
        if cfg!(feature = "xlsx") {
            Self::Xlsx
        } else {
            Self::Csv
        }
    }
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }
}

/// A named sheet of text cells ready to write.
#[derive(Debug, Clone)]
pub struct OutputSheet {
    pub name: &'static str,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Result → sheets
// ---------------------------------------------------------------------------

pub fn tasks_sheet(tasks: &[TaskRecord]) -> OutputSheet {
    OutputSheet {
        name: "tasks",
        headers: TaskRecord::COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows: tasks.iter().map(TaskRecord::to_fields).collect(),
    }
}

pub fn task_tags_sheet(task_tags: &[TaskTagRecord]) -> OutputSheet {
    OutputSheet {
        name: "task_tags",
        headers: TaskTagRecord::COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows: task_tags
            .iter()
            .map(|t| vec![t.task_id.clone(), t.tag_id.clone()])
            .collect(),
    }
}

fn register_headers() -> Vec<String> {
    [
        Column::No,
        Column::EnterDate,
        Column::StaffName,
        Column::Name,
        Column::PhNo,
        Column::Place,
        Column::District,
        Column::SiteVisitDate,
        Column::SiteVisitPayment,
        Column::WorkStatus,
        Column::WorkStartDate,
        Column::Remarks,
        Column::Highlight,
        Column::Tags,
    ]
    .iter()
    .map(|c| c.header().to_string())
    .collect()
}

/// Normalized date if there is one, otherwise whatever was in the cell.
fn date_for_review(value: &DateValue, raw: &Cell) -> String {
    match value {
        DateValue::Date(_) => value.as_iso().unwrap_or_default(),
        DateValue::Invalid(raw_text) => raw_text.clone(),
        DateValue::Empty => raw.to_text().trim().to_string(),
    }
}

fn register_fields(row: &NormalizedRow) -> Vec<String> {
    let s = &row.source;
    vec![
        s.no.clone(),
        date_for_review(&row.entry_date, &s.entry_date),
        s.staff.clone(),
        s.client_name.clone(),
        s.phone.clone(),
        s.place.clone(),
        s.district.clone(),
        date_for_review(&row.site_visit_date, &s.site_visit_date),
        s.site_visit_payment.clone(),
        s.work_status.clone(),
        s.work_start_date.clone(),
        s.remarks.clone(),
        s.highlight.clone(),
        row.tags.clone(),
    ]
}

pub fn duplicates_sheet(result: &ReconcileResult) -> OutputSheet {
    let mut headers = vec!["LINE".to_string()];
    headers.extend(register_headers());
    headers.push("OCCURRENCE".to_string());
    headers.push("DUPLICATE COUNT".to_string());

    let mut rows = Vec::new();
    for group in &result.duplicate_groups {
        for dup in &group.rows {
            let mut fields = vec![dup.row.source.line.to_string()];
            fields.extend(register_fields(&dup.row));
            fields.push(dup.occurrence.to_string());
            fields.push(dup.duplicate_count.to_string());
            rows.push(fields);
        }
    }
    OutputSheet {
        name: "duplicates",
        headers,
        rows,
    }
}

pub fn invalid_dates_sheet(rows: &[NormalizedRow]) -> OutputSheet {
    let flag = |v: &DateValue| {
        let status = if v.is_invalid() { "INVALID" } else { "" };
        status.to_string()
    };
    OutputSheet {
        name: "invalid_dates",
        headers: [
            "LINE",
            "NAME ",
            "PH NO",
            "ENTER DATE",
            "ENTER DATE STATUS",
            "SITE VISIT DATE",
            "SITE VISIT DATE STATUS",
        ]
        .iter()
        .map(|h| h.to_string())
        .collect(),
        rows: rows
            .iter()
            .map(|r| {
                vec![
                    r.source.line.to_string(),
                    r.source.client_name.clone(),
                    r.source.phone.clone(),
                    r.source.entry_date.to_text(),
                    flag(&r.entry_date),
                    r.source.site_visit_date.to_text(),
                    flag(&r.site_visit_date),
                ]
            })
            .collect(),
    }
}

pub fn missing_districts_sheet(rows: &[NormalizedRow]) -> OutputSheet {
    let mut headers = vec!["LINE".to_string()];
    headers.extend(register_headers());
    OutputSheet {
        name: "missing_districts",
        headers,
        rows: rows
            .iter()
            .map(|r| {
                let mut fields = vec![r.source.line.to_string()];
                fields.extend(register_fields(r));
                fields
            })
            .collect(),
    }
}

/// Stored tasks laid out with the register's own headers, numbered from 1.
pub fn store_tasks_sheet(rows: &[TaskRow]) -> OutputSheet {
    let mut headers: Vec<String> = [Column::No, Column::EnterDate, Column::StaffName, Column::Name, Column::Tags]
        .iter()
        .map(|c| c.header().to_string())
        .collect();
    headers.extend(
        [
            Column::PhNo,
            Column::Place,
            Column::District,
            Column::SiteVisitDate,
            Column::SiteVisitPayment,
            Column::WorkStatus,
        ]
        .iter()
        .map(|c| c.header().to_string()),
    );

    OutputSheet {
        name: "Tasks",
        headers,
        rows: rows
            .iter()
            .enumerate()
            .map(|(i, t)| {
                vec![
                    (i + 1).to_string(),
                    t.entry_date.clone().unwrap_or_default(),
                    t.staff.clone(),
                    t.client_name.clone(),
                    t.tags.join(", "),
                    t.phone_number.clone(),
                    t.place.clone(),
                    t.district.clone().unwrap_or_default(),
                    t.site_visit_date.clone().unwrap_or_default(),
                    t.site_visit_payment.clone(),
                    t.status.clone(),
                ]
            })
            .collect(),
    }
}

pub fn result_sheets(result: &ReconcileResult) -> Vec<OutputSheet> {
    vec![
        tasks_sheet(&result.clean_tasks),
        task_tags_sheet(&result.task_tags),
        duplicates_sheet(result),
        invalid_dates_sheet(&result.invalid_date_rows),
        missing_districts_sheet(&result.missing_district_rows),
    ]
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Write every output of a run into `out_dir`, one file per sheet.
pub fn write_outputs(result: &ReconcileResult, out_dir: &Path, format: OutputFormat) -> Result<Vec<PathBuf>> {
    write_sheets(&result_sheets(result), out_dir, format)
}

/// Write sheets into `out_dir` all or nothing. Files are staged in a
/// hidden sibling directory and only moved into place once every sheet
/// has been written; on failure the staging directory is removed.
pub fn write_sheets(sheets: &[OutputSheet], out_dir: &Path, format: OutputFormat) -> Result<Vec<PathBuf>> {
    let parent = match out_dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent)?;
    let staging = tempfile::Builder::new()
        .prefix(".taskbook-staging-")
        .tempdir_in(&parent)?;

    let mut names = Vec::new();
    for sheet in sheets {
        let name = format!("{}.{}", sheet.name, format.extension());
        write_sheet(sheet, &staging.path().join(&name), format)?;
        names.push(name);
    }

    if out_dir.exists() {
        for name in &names {
            std::fs::rename(staging.path().join(name), out_dir.join(name))?;
        }
    } else {
        std::fs::rename(staging.path(), out_dir)?;
    }
    tracing::debug!(dir = %out_dir.display(), files = names.len(), "outputs written");
    Ok(names.into_iter().map(|name| out_dir.join(name)).collect())
}

pub fn write_sheet(sheet: &OutputSheet, path: &Path, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Csv => write_csv(sheet, path),
        OutputFormat::Xlsx => write_xlsx(sheet, path),
    }
}

fn write_csv(sheet: &OutputSheet, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(&sheet.headers)?;
    for row in &sheet.rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(feature = "xlsx")]
fn write_xlsx(sheet: &OutputSheet, path: &Path) -> Result<()> {
    use rust_xlsxwriter::{Format, Workbook};

    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet.name)?;

    for (col, name) in sheet.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, name, &header)?;
        let widest = sheet
            .rows
            .iter()
            .filter_map(|r| r.get(col))
            .map(|v| v.chars().count())
            .chain(std::iter::once(name.chars().count()))
            .max()
            .unwrap_or(8);
        worksheet.set_column_width(col as u16, (widest.clamp(6, 40) + 2) as f64)?;
    }
    // Everything goes in as a string cell so phone numbers keep their
    // digits and leading zeros.
    for (i, row) in sheet.rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            worksheet.write_string((i + 1) as u32, col as u16, value)?;
        }
    }
    worksheet.set_freeze_panes(1, 0)?;
    workbook.save(path)?;
    Ok(())
}

#[cfg(not(feature = "xlsx"))]
fn write_xlsx(_sheet: &OutputSheet, path: &Path) -> Result<()> {
    Err(TaskbookError::UnsupportedFormat(format!(
        "{} (built without xlsx support; use --format csv)",
        path.display()
    )))
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

/// Read a written sheet back as header → text rows. The header is row 1.
fn read_table(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let grid = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => read_csv_grid(path)?,
        Some(ext) if ext.eq_ignore_ascii_case("xlsx") => read_workbook_grid(path)?,
        _ => return Err(TaskbookError::UnsupportedFormat(path.display().to_string())),
    };
    let mut rows = grid
        .into_iter()
        .map(|r| r.iter().map(Cell::to_text).collect::<Vec<_>>());
    let headers = rows
        .next()
        .ok_or_else(|| TaskbookError::EmptySheet(path.display().to_string()))?;
    Ok((headers, rows.filter(|r| r.iter().any(|v| !v.is_empty())).collect()))
}

fn column_positions<const N: usize>(headers: &[String], wanted: [&str; N]) -> Result<[usize; N]> {
    let mut positions = [0usize; N];
    let mut missing = Vec::new();
    for (slot, name) in positions.iter_mut().zip(wanted) {
        match headers.iter().position(|h| h == name) {
            Some(i) => *slot = i,
            None => missing.push(name.to_string()),
        }
    }
    if missing.is_empty() {
        Ok(positions)
    } else {
        Err(TaskbookError::MissingHeaders(missing))
    }
}

fn field(row: &[String], idx: usize) -> String {
    row.get(idx).cloned().unwrap_or_default()
}

fn optional(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

pub fn read_tasks(path: &Path) -> Result<Vec<TaskRecord>> {
    let (headers, rows) = read_table(path)?;
    let idx = column_positions(&headers, TaskRecord::COLUMNS)?;
    Ok(rows
        .iter()
        .map(|r| TaskRecord {
            id: field(r, idx[0]),
            client_name: field(r, idx[1]),
            phone_number: field(r, idx[2]),
            place: field(r, idx[3]),
            district_id: field(r, idx[4]),
            site_visit_payment: field(r, idx[5]),
            site_visit_date: optional(field(r, idx[6])),
            entry_date: optional(field(r, idx[7])),
            staff: field(r, idx[8]),
        })
        .collect())
}

pub fn read_task_tags(path: &Path) -> Result<Vec<TaskTagRecord>> {
    let (headers, rows) = read_table(path)?;
    let idx = column_positions(&headers, TaskTagRecord::COLUMNS)?;
    Ok(rows
        .iter()
        .map(|r| TaskTagRecord {
            task_id: field(r, idx[0]),
            tag_id: field(r, idx[1]),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::district::DistrictIndex;
    use crate::models::{District, SourceRow};
    use crate::normalize::TagVocabulary;
    use crate::reconciler::reconcile;
    use crate::settings::default_tags;

    fn sample_tasks() -> Vec<TaskRecord> {
        vec![
            TaskRecord {
                id: "7c0e3a4e-0001".into(),
                client_name: "Anu Thomas".into(),
                phone_number: "09876543210".into(),
                place: "Aluva".into(),
                district_id: "d-ekm".into(),
                site_visit_payment: "1500".into(),
                site_visit_date: Some("2025-10-02".into()),
                entry_date: Some("2025-09-28".into()),
                staff: "Rahul".into(),
            },
            TaskRecord {
                id: "7c0e3a4e-0002".into(),
                client_name: "Biju, K.".into(),
                phone_number: "919876543210".into(),
                place: "".into(),
                district_id: "".into(),
                site_visit_payment: "".into(),
                site_visit_date: None,
                entry_date: None,
                staff: "".into(),
            },
        ]
    }

    fn sample_result() -> ReconcileResult {
        let row = |line: usize, phone: &str, highlight: &str| SourceRow {
            line,
            client_name: format!("Client {line}"),
            phone: phone.into(),
            district: "Kochi".into(),
            highlight: highlight.into(),
            entry_date: Cell::Text("28-09-2025".into()),
            site_visit_date: Cell::Text("soon".into()),
            ..Default::default()
        };
        let districts = DistrictIndex::from_districts(&[District {
            id: "d-kochi".into(),
            name: "Kochi".into(),
        }]);
        let mut n = 0;
        reconcile(
            vec![row(3, "1", "yellow"), row(4, "2", ""), row(5, "2", "blue")],
            &districts,
            &TagVocabulary::from_defs(&default_tags()),
            || {
                n += 1;
                format!("task-{n}")
            },
        )
    }

    #[test]
    fn test_csv_tasks_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.csv");
        let tasks = sample_tasks();
        write_sheet(&tasks_sheet(&tasks), &path, OutputFormat::Csv).unwrap();
        assert_eq!(read_tasks(&path).unwrap(), tasks);
    }

    #[cfg(feature = "xlsx")]
    #[test]
    fn test_xlsx_tasks_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.xlsx");
        let tasks = sample_tasks();
        write_sheet(&tasks_sheet(&tasks), &path, OutputFormat::Xlsx).unwrap();
        let back = read_tasks(&path).unwrap();
        assert_eq!(back, tasks);
        assert!(back.iter().all(|t| !t.phone_number.contains('E') && !t.phone_number.contains('e')));
    }

    #[test]
    fn test_csv_task_tags_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task_tags.csv");
        let tags = vec![TaskTagRecord {
            task_id: "t1".into(),
            tag_id: "g1".into(),
        }];
        write_sheet(&task_tags_sheet(&tags), &path, OutputFormat::Csv).unwrap();
        assert_eq!(read_task_tags(&path).unwrap(), tags);
    }

    #[test]
    fn test_read_tasks_requires_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.csv");
        std::fs::write(&path, "id,client_name\n1,Anu\n").unwrap();
        assert!(matches!(read_tasks(&path), Err(TaskbookError::MissingHeaders(m)) if m.len() == 7));
    }

    #[test]
    fn test_write_outputs_creates_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run");
        let written = write_outputs(&sample_result(), &out, OutputFormat::Csv).unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            ["tasks.csv", "task_tags.csv", "duplicates.csv", "invalid_dates.csv", "missing_districts.csv"]
        );
    }

    #[test]
    fn test_write_sheets_leaves_nothing_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run");
        let unwritable = OutputSheet {
            name: "no/such/dir",
            headers: vec!["x".into()],
            rows: Vec::new(),
        };
        let sheets = [tasks_sheet(&sample_tasks()), unwritable];
        assert!(write_sheets(&sheets, &out, OutputFormat::Csv).is_err());
        assert!(!out.exists());
        // staging directory cleaned up too
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_write_outputs_into_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("notes.txt"), "keep me").unwrap();
        write_outputs(&sample_result(), &out, OutputFormat::Csv).unwrap();
        assert!(out.join("notes.txt").exists());
        assert_eq!(read_tasks(&out.join("tasks.csv")).unwrap().len(), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_duplicates_sheet_carries_occurrence() {
        let sheet = duplicates_sheet(&sample_result());
        assert_eq!(sheet.rows.len(), 2);
        let occ = sheet.headers.iter().position(|h| h == "OCCURRENCE").unwrap();
        let count = sheet.headers.iter().position(|h| h == "DUPLICATE COUNT").unwrap();
        let entry = sheet.headers.iter().position(|h| h == "ENTER DATE").unwrap();
        assert_eq!(sheet.rows[0][occ], "1");
        assert_eq!(sheet.rows[1][occ], "2");
        assert_eq!(sheet.rows[1][count], "2");
        // normalized, not raw
        assert_eq!(sheet.rows[0][entry], "2025-09-28");
    }

    #[test]
    fn test_invalid_dates_sheet_keeps_raw_values() {
        let result = sample_result();
        let sheet = invalid_dates_sheet(&result.invalid_date_rows);
        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.rows[0][3], "28-09-2025");
        assert_eq!(sheet.rows[0][4], "");
        assert_eq!(sheet.rows[0][5], "soon");
        assert_eq!(sheet.rows[0][6], "INVALID");
    }

    #[test]
    fn test_store_tasks_sheet_uses_register_headers() {
        let row = TaskRow {
            id: "t1".into(),
            client_name: "Anu".into(),
            phone_number: "09876543210".into(),
            place: "Aluva".into(),
            district: Some("Kochi".into()),
            site_visit_payment: "500".into(),
            site_visit_date: None,
            entry_date: Some("2025-09-28".into()),
            staff: "Rahul".into(),
            status: "pending".into(),
            tags: vec!["CANCELLED".into(), "SITE VISITED".into()],
        };
        let sheet = store_tasks_sheet(&[row]);
        assert_eq!(sheet.headers[3], "NAME ");
        assert_eq!(sheet.headers[9], "SITE VISIT  PAYMENT");
        assert_eq!(sheet.headers.len(), sheet.rows[0].len());
        assert_eq!(sheet.rows[0][0], "1");
        assert_eq!(sheet.rows[0][4], "CANCELLED, SITE VISITED");
        assert_eq!(sheet.rows[0][5], "09876543210");
        assert_eq!(sheet.rows[0][7], "Kochi");
        assert_eq!(sheet.rows[0][8], "");
    }

    #[test]
    fn test_output_format_serde() {
        assert_eq!(serde_json::to_string(&OutputFormat::Csv).unwrap(), "\"csv\"");
        let f: OutputFormat = serde_json::from_str("\"xlsx\"").unwrap();
        assert_eq!(f, OutputFormat::Xlsx);
    }
}
