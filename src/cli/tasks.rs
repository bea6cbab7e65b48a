use std::path::PathBuf;

use comfy_table::{Cell, Table};

use crate::cli::open_store;
use crate::db::{list_tasks, TaskFilter};
use crate::error::Result;
use crate::export::{store_tasks_sheet, write_sheet, OutputFormat};
use crate::settings::load_settings;

pub fn list(filter: TaskFilter) -> Result<()> {
    let conn = open_store()?;
    let tasks = list_tasks(&conn, &filter)?;
    if tasks.is_empty() {
        println!("No tasks match.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Entry Date", "Name", "Phone", "Place", "District", "Status", "Tags"]);
    for task in &tasks {
        table.add_row(vec![
            Cell::new(task.entry_date.as_deref().unwrap_or("")),
            Cell::new(&task.client_name),
            Cell::new(&task.phone_number),
            Cell::new(&task.place),
            Cell::new(task.district.as_deref().unwrap_or("")),
            Cell::new(&task.status),
            Cell::new(task.tags.join(", ")),
        ]);
    }
    println!("Tasks\n{table}");
    println!("{} tasks", tasks.len());
    Ok(())
}

pub fn export(filter: TaskFilter, out: Option<&str>, format: Option<OutputFormat>) -> Result<()> {
    let settings = load_settings();
    let format = format.unwrap_or(settings.output_format);
    let path = match out {
        Some(p) => PathBuf::from(p),
        None => PathBuf::from(&settings.data_dir).join("exports").join(format!(
            "tasks_export_{}.{}",
            chrono::Local::now().format("%Y-%m-%d"),
            format.extension()
        )),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let conn = open_store()?;
    let tasks = list_tasks(&conn, &filter)?;
    write_sheet(&store_tasks_sheet(&tasks), &path, format)?;
    println!("Exported {} tasks to {}", tasks.len(), path.display());
    Ok(())
}
