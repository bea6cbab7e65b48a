use std::collections::HashMap;
use std::path::Path;

use crate::error::{Result, TaskbookError};
use crate::models::District;
use crate::normalize::canonical_name;

/// Canonical district name → district id, loaded once per run.
#[derive(Debug, Clone, Default)]
pub struct DistrictIndex {
    by_name: HashMap<String, String>,
}

impl DistrictIndex {
    pub fn from_districts<'a>(districts: impl IntoIterator<Item = &'a District>) -> Self {
        let mut by_name = HashMap::new();
        for district in districts {
            let key = canonical_name(&district.name);
            if key.is_empty() {
                continue;
            }
            if by_name.contains_key(&key) {
                tracing::warn!(name = %district.name, "district listed twice; keeping the first id");
                continue;
            }
            by_name.insert(key, district.id.clone());
        }
        Self { by_name }
    }

    /// Resolve a free-text district name. A miss yields an empty id rather
    /// than an error.
    pub fn resolve(&self, name: &str) -> String {
        self.by_name
            .get(&canonical_name(name))
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Read a district snapshot exported from the store: a CSV with `id` and
/// `name` columns, in any order.
pub fn read_district_csv(file_path: &Path) -> Result<Vec<District>> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));

    let headers = rdr.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| TaskbookError::MissingHeaders(vec![name.to_string()]))
    };
    let idx_id = position("id")?;
    let idx_name = position("name")?;

    let mut districts = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let id = record.get(idx_id).unwrap_or("").trim();
        let name = record.get(idx_name).unwrap_or("").trim();
        if id.is_empty() || name.is_empty() {
            continue;
        }
        districts.push(District {
            id: id.to_string(),
            name: name.to_string(),
        });
    }
    Ok(districts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn district(id: &str, name: &str) -> District {
        District {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn index() -> DistrictIndex {
        let districts = vec![
            district("d-kochi", "Kochi"),
            district("d-tvm", "Thiruvananthapuram"),
            district("d-np", "North  Paravur"),
        ];
        DistrictIndex::from_districts(&districts)
    }

    #[test]
    fn test_resolve_ignores_case_and_whitespace() {
        let idx = index();
        assert_eq!(idx.resolve(" Kochi "), "d-kochi");
        assert_eq!(idx.resolve("KOCHI"), "d-kochi");
        assert_eq!(idx.resolve("north paravur"), "d-np");
    }

    #[test]
    fn test_resolve_miss_is_empty() {
        let idx = index();
        assert_eq!(idx.resolve("Unknown Place"), "");
        assert_eq!(idx.resolve(""), "");
    }

    #[test]
    fn test_first_duplicate_wins() {
        let districts = vec![district("a", "Kochi"), district("b", "kochi ")];
        let idx = DistrictIndex::from_districts(&districts);
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.resolve("Kochi"), "a");
    }

    #[test]
    fn test_read_district_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("districts.csv");
        std::fs::write(&path, "name,id\nKochi,d-1\n,d-2\nThrissur,d-3\n").unwrap();
        let districts = read_district_csv(&path).unwrap();
        assert_eq!(districts, vec![district("d-1", "Kochi"), district("d-3", "Thrissur")]);
    }

    #[test]
    fn test_read_district_csv_requires_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("districts.csv");
        std::fs::write(&path, "district\nKochi\n").unwrap();
        assert!(matches!(
            read_district_csv(&path),
            Err(TaskbookError::MissingHeaders(_))
        ));
    }
}
