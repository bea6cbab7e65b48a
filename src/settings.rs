use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TaskbookError};
use crate::export::OutputFormat;

/// A tag the tracker already knows about. `id` must match the row in the
/// store's `tags` table; `aliases` are extra spellings seen in registers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub color: String,
}

impl TagDef {
    fn new(id: &str, name: &str, aliases: &[&str], color: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            color: color.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default = "default_tags")]
    pub tags: Vec<TagDef>,
}

pub fn default_tags() -> Vec<TagDef> {
    vec![
        TagDef::new(
            "3f1c9a52-7d4e-4b8a-9c61-2e5f0a8d7b13",
            "WORK STARTED",
            &["WOK STARTED", "WORK"],
            "#16a34a",
        ),
        TagDef::new("8b2e4d70-1a9f-4c3e-b5d8-6f7a0c2e9d41", "CANCELLED", &[], "#2563eb"),
        TagDef::new("c5a7e1f3-9b2d-4e60-8a4c-1d3f5b7e9a02", "SITE VISITED", &[], "#facc15"),
        TagDef::new("e9d3b5a1-4c7f-4a28-b6e0-7f2c9d1a3b85", "WORK IN PROGRESS", &[], "#f97316"),
    ]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            output_format: OutputFormat::default(),
            tags: default_tags(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("taskbook")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("taskbook")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable settings, using defaults");
                Settings::default()
            }
        }
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| TaskbookError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn get_data_dir() -> PathBuf {
    PathBuf::from(&load_settings().data_dir)
}

pub fn db_path(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("taskbook.db")
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            output_format: OutputFormat::Csv,
            tags: vec![TagDef::new("t-1", "SITE VISITED", &[], "")],
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.output_format, OutputFormat::Csv);
        assert_eq!(loaded.tags.len(), 1);
        assert_eq!(loaded.tags[0].id, "t-1");
    }

    #[test]
    fn test_defaults_carry_four_tags() {
        let s = Settings::default();
        assert!(!s.data_dir.is_empty());
        let names: Vec<&str> = s.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["WORK STARTED", "CANCELLED", "SITE VISITED", "WORK IN PROGRESS"]);
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.tags, default_tags());
        assert_eq!(s.output_format, OutputFormat::default());
    }

    #[test]
    fn test_tag_aliases_default_empty() {
        let json = r#"{"data_dir": "/tmp", "tags": [{"id": "x", "name": "CANCELLED"}]}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert!(s.tags[0].aliases.is_empty());
        assert!(s.tags[0].color.is_empty());
    }
}
