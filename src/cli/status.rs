use crate::db::get_connection;
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::settings::{db_path, load_settings};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let store = db_path(&data_dir);

    println!("Data dir:   {}", data_dir.display());
    println!("Store:      {}", store.display());
    println!("Format:     {}", settings.output_format.extension());

    if store.exists() {
        let size = std::fs::metadata(&store)?.len();
        println!("Store size: {}", format_bytes(size));

        let conn = get_connection(&store)?;
        let count = |table: &str| -> Result<i64> {
            Ok(conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))?)
        };

        println!();
        println!("Districts:  {}", count("districts")?);
        println!("Tags:       {}", count("tags")?);
        println!("Tasks:      {}", count("tasks")?);
        println!("Tag links:  {}", count("task_tags")?);
        println!("Uploads:    {}", count("uploads")?);
    } else {
        println!();
        println!("Store not found. Run `taskbook init` to set up.");
    }

    Ok(())
}
