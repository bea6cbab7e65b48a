use std::path::Path;

use comfy_table::{Cell, Table};

use crate::cli::open_store;
use crate::db::{add_district, delete_district, fetch_districts};
use crate::district::read_district_csv;
use crate::error::Result;

pub fn add(name: &str, id: Option<&str>) -> Result<()> {
    let conn = open_store()?;
    let id = add_district(&conn, name, id)?;
    println!("Added district: {} ({id})", name.trim());
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_store()?;
    let districts = fetch_districts(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name"]);
    for district in &districts {
        table.add_row(vec![Cell::new(&district.id), Cell::new(&district.name)]);
    }
    println!("Districts\n{table}");
    Ok(())
}

pub fn import(file: &str) -> Result<()> {
    let conn = open_store()?;
    let districts = read_district_csv(Path::new(file))?;
    let before = fetch_districts(&conn)?.len();
    for district in &districts {
        add_district(&conn, &district.name, Some(&district.id))?;
    }
    let added = fetch_districts(&conn)?.len() - before;
    println!("{added} districts added, {} already present", districts.len() - added);
    Ok(())
}

pub fn delete(district: &str) -> Result<()> {
    let conn = open_store()?;
    let name = delete_district(&conn, district)?;
    println!("Deleted district: {name}");
    Ok(())
}
