use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use crate::error::{Result, TaskbookError};
use crate::models::District;
use crate::settings::TagDef;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS districts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS tags (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    color TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    client_name TEXT,
    phone_number TEXT,
    place TEXT,
    district_id TEXT,
    site_visit_payment TEXT,
    site_visit_date TEXT,
    entry_date TEXT,
    staff TEXT,
    status TEXT DEFAULT 'pending',
    upload_id INTEGER,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (district_id) REFERENCES districts(id),
    FOREIGN KEY (upload_id) REFERENCES uploads(id)
);

CREATE TABLE IF NOT EXISTS task_tags (
    task_id TEXT NOT NULL,
    tag_id TEXT NOT NULL,
    PRIMARY KEY (task_id, tag_id),
    FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES tags(id)
);

CREATE TABLE IF NOT EXISTS uploads (
    id INTEGER PRIMARY KEY,
    tasks_file TEXT NOT NULL,
    task_tags_file TEXT NOT NULL,
    task_count INTEGER,
    tag_count INTEGER,
    checksum TEXT,
    uploaded_at TEXT DEFAULT (datetime('now'))
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

/// Create tables and seed the fixed tags. Tag ids come from settings so
/// generated associations line up with this table.
pub fn init_db(conn: &Connection, tags: &[TagDef]) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    for tag in tags {
        conn.execute(
            "INSERT OR IGNORE INTO tags (id, name, color) VALUES (?1, ?2, ?3)",
            rusqlite::params![tag.id, tag.name, tag.color],
        )?;
    }
    Ok(())
}

pub fn fetch_districts(conn: &Connection) -> Result<Vec<District>> {
    let mut stmt = conn.prepare("SELECT id, name FROM districts ORDER BY name")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(District {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Insert a district, returning its id. An existing name keeps its id.
pub fn add_district(conn: &Connection, name: &str, id: Option<&str>) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TaskbookError::Other("District name cannot be blank".into()));
    }
    let existing: Option<String> = conn
        .query_row("SELECT id FROM districts WHERE name = ?1", [name], |r| r.get(0))
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }
    let id = id
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    conn.execute(
        "INSERT INTO districts (id, name) VALUES (?1, ?2)",
        rusqlite::params![id, name],
    )?;
    Ok(id)
}

pub struct TagRow {
    pub id: String,
    pub name: String,
    pub color: Option<String>,
    pub task_count: i64,
}

pub fn list_tags(conn: &Connection) -> Result<Vec<TagRow>> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name, t.color, COUNT(tt.task_id) \
         FROM tags t LEFT JOIN task_tags tt ON tt.tag_id = t.id \
         GROUP BY t.id ORDER BY t.name",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TagRow {
                id: row.get(0)?,
                name: row.get(1)?,
                color: row.get(2)?,
                task_count: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Look up an `(id, name)` pair by exact id or case-insensitive name.
fn find_by_id_or_name(conn: &Connection, table: &str, key: &str) -> Result<Option<(String, String)>> {
    let key = key.trim();
    let found = conn
        .query_row(
            &format!("SELECT id, name FROM {table} WHERE id = ?1 OR lower(name) = lower(?1)"),
            [key],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    Ok(found)
}

/// Why a district cannot be deleted, or None when nothing refers to it.
pub fn district_blocking_reason(conn: &Connection, id: &str) -> Result<Option<String>> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM tasks WHERE district_id = ?1",
        [id],
        |r| r.get(0),
    )?;
    if count > 0 {
        let noun = if count == 1 { "task" } else { "tasks" };
        return Ok(Some(format!("Cannot delete: district is used by {count} {noun}")));
    }
    Ok(None)
}

/// Delete a district by id or name, returning its name.
pub fn delete_district(conn: &Connection, key: &str) -> Result<String> {
    let (id, name) = find_by_id_or_name(conn, "districts", key)?
        .ok_or_else(|| TaskbookError::Other(format!("District not found: {}", key.trim())))?;
    if let Some(reason) = district_blocking_reason(conn, &id)? {
        return Err(TaskbookError::Other(reason));
    }
    conn.execute("DELETE FROM districts WHERE id = ?1", [&id])?;
    Ok(name)
}

/// Insert a tag, returning its id. An existing name (in any case) keeps its id.
pub fn add_tag(conn: &Connection, name: &str, color: Option<&str>) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TaskbookError::Other("Tag name cannot be blank".into()));
    }
    if let Some((id, _)) = find_by_id_or_name(conn, "tags", name)? {
        return Ok(id);
    }
    let id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO tags (id, name, color) VALUES (?1, ?2, ?3)",
        rusqlite::params![id, name, color],
    )?;
    Ok(id)
}

pub fn tag_blocking_reason(conn: &Connection, id: &str) -> Result<Option<String>> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM task_tags WHERE tag_id = ?1",
        [id],
        |r| r.get(0),
    )?;
    if count > 0 {
        let noun = if count == 1 { "task" } else { "tasks" };
        return Ok(Some(format!("Cannot delete: tag is on {count} {noun}")));
    }
    Ok(None)
}

/// Delete a tag by id or name, returning its `(id, name)`.
pub fn delete_tag(conn: &Connection, key: &str) -> Result<(String, String)> {
    let (id, name) = find_by_id_or_name(conn, "tags", key)?
        .ok_or_else(|| TaskbookError::Other(format!("Tag not found: {}", key.trim())))?;
    if let Some(reason) = tag_blocking_reason(conn, &id)? {
        return Err(TaskbookError::Other(reason));
    }
    conn.execute("DELETE FROM tags WHERE id = ?1", [&id])?;
    Ok((id, name))
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Filters for stored tasks. An empty list matches everything; districts
/// and tags match by id or by name, ignoring case.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub districts: Vec<String>,
    pub tags: Vec<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TaskRow {
    pub id: String,
    pub client_name: String,
    pub phone_number: String,
    pub place: String,
    pub district: Option<String>,
    pub site_visit_payment: String,
    pub site_visit_date: Option<String>,
    pub entry_date: Option<String>,
    pub staff: String,
    pub status: String,
    /// Tag names, sorted.
    pub tags: Vec<String>,
}

// Push each value as a numbered parameter and return the placeholder list.
fn push_params(params: &mut Vec<String>, values: &[String]) -> String {
    values
        .iter()
        .map(|v| {
            params.push(v.trim().to_lowercase());
            format!("?{}", params.len())
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Stored tasks matching `filter`, newest first.
pub fn list_tasks(conn: &Connection, filter: &TaskFilter) -> Result<Vec<TaskRow>> {
    let mut sql = String::from(
        "SELECT t.id, t.client_name, t.phone_number, t.place, d.name, t.site_visit_payment, \
         t.site_visit_date, t.entry_date, t.staff, t.status, \
         (SELECT group_concat(g.name, char(31)) FROM task_tags tt JOIN tags g ON g.id = tt.tag_id \
          WHERE tt.task_id = t.id) \
         FROM tasks t LEFT JOIN districts d ON d.id = t.district_id WHERE 1 = 1",
    );
    let mut params: Vec<String> = Vec::new();

    if !filter.districts.is_empty() {
        let slots = push_params(&mut params, &filter.districts);
        sql.push_str(&format!(
            " AND (lower(t.district_id) IN ({slots}) OR lower(d.name) IN ({slots}))"
        ));
    }
    if !filter.tags.is_empty() {
        let slots = push_params(&mut params, &filter.tags);
        sql.push_str(&format!(
            " AND t.id IN (SELECT tt.task_id FROM task_tags tt JOIN tags g ON g.id = tt.tag_id \
             WHERE lower(g.id) IN ({slots}) OR lower(g.name) IN ({slots}))"
        ));
    }
    if let Some(status) = filter.status.as_deref().filter(|s| !s.trim().is_empty()) {
        params.push(status.trim().to_lowercase());
        sql.push_str(&format!(" AND lower(t.status) = ?{}", params.len()));
    }
    sql.push_str(" ORDER BY t.created_at DESC, t.rowid DESC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            let text = |i: usize| -> rusqlite::Result<String> {
                Ok(row.get::<_, Option<String>>(i)?.unwrap_or_default())
            };
            let mut tags: Vec<String> = row
                .get::<_, Option<String>>(10)?
                .map(|joined| joined.split('\u{1f}').map(str::to_string).collect())
                .unwrap_or_default();
            tags.sort();
            Ok(TaskRow {
                id: row.get(0)?,
                client_name: text(1)?,
                phone_number: text(2)?,
                place: text(3)?,
                district: row.get(4)?,
                site_visit_payment: text(5)?,
                site_visit_date: row.get(6)?,
                entry_date: row.get(7)?,
                staff: text(8)?,
                status: text(9)?,
                tags,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
