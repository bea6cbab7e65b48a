use std::path::Path;

use crate::cli::open_store;
use crate::error::Result;
use crate::uploader::upload_files;

pub fn run(tasks: &str, task_tags: &str) -> Result<()> {
    let mut conn = open_store()?;
    let result = upload_files(&mut conn, Path::new(tasks), Path::new(task_tags))?;

    println!(
        "{} tasks inserted, {} skipped (already in store)",
        result.tasks_inserted, result.tasks_skipped
    );
    println!(
        "{} tag links inserted, {} skipped",
        result.tags_inserted, result.tags_skipped
    );
    Ok(())
}
