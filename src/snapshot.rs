//! Read-only relational snapshot of the current dataset version.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FimsError, FimsResult};

pub type Row = BTreeMap<String, String>;

/// Storage descriptor written into the mapping file's database block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataStorage {
    pub driver: String,
    pub dsn: String,
}

impl Default for DataStorage {
    fn default() -> Self {
        Self {
            driver: "org.sqlite.JDBC".to_string(),
            dsn: "jdbc:sqlite::memory:".to_string(),
        }
    }
}

pub trait RowSource {
    fn has_table(&self, table: &str) -> bool;

    /// Normalized column names present in this dataset version.
    fn known_columns(&self) -> BTreeSet<String>;

    fn rows(&self, table: &str) -> &[Row];

    fn storage(&self) -> DataStorage {
        DataStorage::default()
    }
}

/// Column names are normalized the way the snapshot store names them.
pub fn normalize_column(name: &str) -> String {
    name.replace(' ', "_").replace('/', "")
}

#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    tables: BTreeMap<String, Vec<Row>>,
    storage: DataStorage,
}

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    storage: Option<DataStorage>,
    tables: BTreeMap<String, Vec<BTreeMap<String, Value>>>,
}

impl MemorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage(mut self, storage: DataStorage) -> Self {
        self.storage = storage;
        self
    }

    pub fn insert_row<I, K, V>(&mut self, table: &str, values: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let row = values
            .into_iter()
            .map(|(column, value)| (normalize_column(column.as_ref()), value.into()))
            .collect();
        self.tables.entry(table.to_string()).or_default().push(row);
    }

    pub fn from_json_str(content: &str) -> FimsResult<Self> {
        let file: SnapshotFile = serde_json::from_str(content)
            .map_err(|err| FimsError::SnapshotParse(err.to_string()))?;
        let mut snapshot = Self {
            tables: BTreeMap::new(),
            storage: file.storage.unwrap_or_default(),
        };
        for (table, rows) in file.tables {
            let rows = rows
                .into_iter()
                .map(|row| {
                    row.into_iter()
                        .filter_map(|(column, value)| {
                            cell_text(value).map(|text| (normalize_column(&column), text))
                        })
                        .collect()
                })
                .collect();
            snapshot.tables.insert(table, rows);
        }
        Ok(snapshot)
    }

    pub fn from_path(path: &Path) -> FimsResult<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            FimsError::SnapshotParse(format!("read {}: {err}", path.display()))
        })?;
        Self::from_json_str(&content)
    }
}

fn cell_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        other => Some(other.to_string()),
    }
}

impl RowSource for MemorySnapshot {
    fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    fn known_columns(&self) -> BTreeSet<String> {
        self.tables
            .values()
            .flat_map(|rows| rows.iter().flat_map(|row| row.keys().cloned()))
            .collect()
    }

    fn rows(&self, table: &str) -> &[Row] {
        self.tables
            .get(table)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn storage(&self) -> DataStorage {
        self.storage.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_column_names() {
        assert_eq!(normalize_column("depth of water/m"), "depth_of_waterm");
    }

    #[test]
    fn loads_json_snapshot() {
        let snapshot = MemorySnapshot::from_json_str(
            r#"{"tables": {"Samples": [{"materialSampleID": "S1", "year Collected": 2020, "note": null}]}}"#,
        )
        .unwrap();
        assert!(snapshot.has_table("Samples"));
        let columns = snapshot.known_columns();
        assert!(columns.contains("year_Collected"));
        assert!(!columns.contains("note"));
        assert_eq!(snapshot.rows("Samples")[0]["year_Collected"], "2020");
        assert!(snapshot.rows("Events").is_empty());
    }
}
