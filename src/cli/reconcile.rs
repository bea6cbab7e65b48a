use std::path::{Path, PathBuf};

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_store;
use crate::db::fetch_districts;
use crate::district::{read_district_csv, DistrictIndex};
use crate::error::Result;
use crate::export::{write_outputs, OutputFormat};
use crate::normalize::{DateValue, TagVocabulary};
use crate::reconciler::{reconcile_file, ReconcileResult};
use crate::settings::load_settings;

fn default_out_dir(data_dir: &str, file_path: &Path) -> PathBuf {
    let stem = file_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("register");
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    PathBuf::from(data_dir)
        .join("exports")
        .join(format!("{stem}-{stamp}"))
}

fn load_districts(snapshot: Option<&str>) -> Result<DistrictIndex> {
    let districts = match snapshot {
        Some(path) => read_district_csv(Path::new(path))?,
        None => fetch_districts(&open_store()?)?,
    };
    let index = DistrictIndex::from_districts(&districts);
    if index.is_empty() {
        println!("{}", "Warning: no districts loaded; every task will have an empty district.".yellow());
    }
    Ok(index)
}

pub fn run(
    file: &str,
    out: Option<&str>,
    format: Option<OutputFormat>,
    districts: Option<&str>,
    quiet: bool,
) -> Result<()> {
    let settings = load_settings();
    let file_path = PathBuf::from(file);

    // Both inputs are in hand before any record is generated
    let index = load_districts(districts)?;
    let vocabulary = TagVocabulary::from_defs(&settings.tags);
    let result = reconcile_file(&file_path, &index, &vocabulary)?;

    let out_dir = out
        .map(PathBuf::from)
        .unwrap_or_else(|| default_out_dir(&settings.data_dir, &file_path));
    let format = format.unwrap_or(settings.output_format);
    let written = write_outputs(&result, &out_dir, format)?;

    print_summary(&result, index.len());
    if !quiet {
        print_review_tables(&result);
    }
    println!();
    for path in &written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn print_summary(result: &ReconcileResult, district_count: usize) {
    println!("{} rows read, {} districts known", result.total_rows, district_count);
    println!(
        "{} tasks, {} tag links",
        result.clean_tasks.len().to_string().green().bold(),
        result.task_tags.len()
    );
    if result.unmatched_districts > 0 {
        println!(
            "{} tasks with an unrecognized district (district left empty)",
            result.unmatched_districts.to_string().yellow()
        );
    }
    if !result.duplicate_groups.is_empty() {
        println!(
            "{} rows held back as duplicates across {} phone numbers",
            result.duplicate_row_count().to_string().red().bold(),
            result.duplicate_groups.len()
        );
    }
    if !result.invalid_date_rows.is_empty() {
        println!(
            "{} rows with unreadable dates",
            result.invalid_date_rows.len().to_string().red()
        );
    }
    if !result.missing_district_rows.is_empty() {
        println!(
            "{} rows without a district held back",
            result.missing_district_rows.len().to_string().red()
        );
    }
    if !result.unknown_headers.is_empty() {
        println!(
            "Ignored columns: {}",
            result
                .unknown_headers
                .iter()
                .map(|h| format!("{h:?}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}

fn date_cell(value: &DateValue) -> Cell {
    match value {
        DateValue::Empty => Cell::new(""),
        DateValue::Date(_) => Cell::new(value.as_iso().unwrap_or_default()),
        DateValue::Invalid(raw) => Cell::new(format!("{raw} (invalid)").red()),
    }
}

fn print_review_tables(result: &ReconcileResult) {
    if !result.duplicate_groups.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Phone", "#", "Line", "Name", "Place", "District", "Entry Date"]);
        for group in &result.duplicate_groups {
            for dup in &group.rows {
                let s = &dup.row.source;
                table.add_row(vec![
                    Cell::new(&group.phone),
                    Cell::new(format!("{}/{}", dup.occurrence, dup.duplicate_count)),
                    Cell::new(s.line),
                    Cell::new(&s.client_name),
                    Cell::new(&s.place),
                    Cell::new(&s.district),
                    date_cell(&dup.row.entry_date),
                ]);
            }
        }
        println!("\nDuplicates\n{table}");
    }

    if !result.invalid_date_rows.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Line", "Name", "Phone", "Entry Date", "Site Visit Date"]);
        for row in &result.invalid_date_rows {
            table.add_row(vec![
                Cell::new(row.source.line),
                Cell::new(&row.source.client_name),
                Cell::new(&row.source.phone),
                date_cell(&row.entry_date),
                date_cell(&row.site_visit_date),
            ]);
        }
        println!("\nInvalid dates\n{table}");
    }

    if !result.missing_district_rows.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Line", "Name", "Phone", "Place"]);
        for row in &result.missing_district_rows {
            table.add_row(vec![
                Cell::new(row.source.line),
                Cell::new(&row.source.client_name),
                Cell::new(&row.source.phone),
                Cell::new(&row.source.place),
            ]);
        }
        println!("\nMissing district\n{table}");
    }
}
