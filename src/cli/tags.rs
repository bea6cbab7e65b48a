use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::open_store;
use crate::db::{add_tag, delete_tag, list_tags};
use crate::error::{Result, TaskbookError};
use crate::settings::load_settings;

/// Parse `#rrggbb` or `#rgb`.
fn hex_rgb(color: &str) -> Option<(u8, u8, u8)> {
    let h = color.trim().trim_start_matches('#');
    let expanded: String = match h.len() {
        3 => h.chars().flat_map(|c| [c, c]).collect(),
        6 => h.to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

pub fn list() -> Result<()> {
    let conn = open_store()?;
    let tags = list_tags(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["", "Name", "ID", "Tasks"]);
    for tag in &tags {
        let swatch = match tag.color.as_deref().and_then(hex_rgb) {
            Some((r, g, b)) => "●".truecolor(r, g, b).to_string(),
            None => String::new(),
        };
        table.add_row(vec![
            Cell::new(swatch),
            Cell::new(&tag.name),
            Cell::new(&tag.id),
            Cell::new(tag.task_count),
        ]);
    }
    println!("Tags\n{table}");
    Ok(())
}

pub fn add(name: &str, color: &str) -> Result<()> {
    if hex_rgb(color).is_none() {
        return Err(TaskbookError::Other(format!("Not a #rrggbb color: {color}")));
    }
    let conn = open_store()?;
    let id = add_tag(&conn, name, Some(color.trim()))?;
    println!("Added tag: {} ({id})", name.trim());
    Ok(())
}

pub fn delete(tag: &str) -> Result<()> {
    let conn = open_store()?;
    let (id, name) = delete_tag(&conn, tag)?;
    println!("Deleted tag: {name}");
    if load_settings().tags.iter().any(|t| t.id == id) {
        println!(
            "{}",
            "Note: this tag is still in the settings vocabulary; links to it will be skipped on upload."
                .yellow()
        );
    }
    Ok(())
}
