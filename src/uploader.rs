use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::error::{Result, TaskbookError};
use crate::export::{read_task_tags, read_tasks};

pub struct UploadResult {
    pub tasks_inserted: usize,
    pub tasks_skipped: usize,
    pub tags_inserted: usize,
    pub tags_skipped: usize,
}

fn compute_checksum(tasks_file: &Path, task_tags_file: &Path) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(std::fs::read(tasks_file)?);
    hasher.update(std::fs::read(task_tags_file)?);
    Ok(hex::encode(hasher.finalize()))
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

/// Insert a reconciled tasks file and its task_tags file into the store in
/// one transaction. Tasks whose id is already present are skipped, as are
/// tag links to unknown tasks or tags.
pub fn upload_files(conn: &mut Connection, tasks_file: &Path, task_tags_file: &Path) -> Result<UploadResult> {
    let checksum = compute_checksum(tasks_file, task_tags_file)?;
    let previous: Option<String> = conn
        .query_row(
            "SELECT uploaded_at FROM uploads WHERE checksum = ?1",
            [&checksum],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(when) = previous {
        return Err(TaskbookError::AlreadyUploaded(when));
    }

    let tasks = read_tasks(tasks_file)?;
    let task_tags = read_task_tags(task_tags_file)?;

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO uploads (tasks_file, task_tags_file, task_count, tag_count, checksum) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            file_name(tasks_file),
            file_name(task_tags_file),
            tasks.len() as i64,
            task_tags.len() as i64,
            checksum,
        ],
    )?;
    let upload_id = tx.last_insert_rowid();

    let mut result = UploadResult {
        tasks_inserted: 0,
        tasks_skipped: 0,
        tags_inserted: 0,
        tags_skipped: 0,
    };
    {
        let mut known_district = tx.prepare("SELECT 1 FROM districts WHERE id = ?1")?;
        let mut insert_task = tx.prepare(
            "INSERT OR IGNORE INTO tasks (id, client_name, phone_number, place, district_id, \
             site_visit_payment, site_visit_date, entry_date, staff, upload_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for task in &tasks {
            // An unresolved district is stored as NULL so the foreign key holds
            let district_id = if task.district_id.is_empty() {
                None
            } else if known_district.exists([&task.district_id])? {
                Some(task.district_id.as_str())
            } else {
                tracing::warn!(task = %task.id, district = %task.district_id, "district id not in store; storing none");
                None
            };
            let changed = insert_task.execute(rusqlite::params![
                task.id,
                task.client_name,
                task.phone_number,
                task.place,
                district_id,
                task.site_visit_payment,
                task.site_visit_date,
                task.entry_date,
                task.staff,
                upload_id,
            ])?;
            if changed == 0 {
                result.tasks_skipped += 1;
            } else {
                result.tasks_inserted += 1;
            }
        }

        let mut link_ok = tx.prepare(
            "SELECT 1 FROM tasks WHERE id = ?1 AND EXISTS (SELECT 1 FROM tags WHERE id = ?2)",
        )?;
        let mut insert_link =
            tx.prepare("INSERT OR IGNORE INTO task_tags (task_id, tag_id) VALUES (?1, ?2)")?;
        for link in &task_tags {
            if !link_ok.exists([&link.task_id, &link.tag_id])? {
                tracing::warn!(task = %link.task_id, tag = %link.tag_id, "tag link skipped");
                result.tags_skipped += 1;
                continue;
            }
            if insert_link.execute([&link.task_id, &link.tag_id])? == 0 {
                result.tags_skipped += 1;
            } else {
                result.tags_inserted += 1;
            }
        }
    }
    tx.commit()?;

    Ok(result)
}
