use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;
use std::path::Path;

use super::dataset::DatasetId;
use crate::api::middleware::AppError;

const DEFAULT_CATALOG: &str = include_str!("../../catalog/default_catalog.json");

/// A column as the model is allowed to see it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub columns: Vec<ColumnDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
}

impl TableDescriptor {
    /// Render as a DDL-like block, the shape models reproduce most reliably
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(description) = &self.description {
            let _ = writeln!(out, "-- {}", description);
        }
        let _ = writeln!(out, "TABLE {} (", self.name);

        let mut lines: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("    {} {}", c.name, c.data_type))
            .collect();
        if !self.primary_key.is_empty() {
            lines.push(format!("    PRIMARY KEY ({})", self.primary_key.join(", ")));
        }
        out.push_str(&lines.join(",\n"));
        out.push_str("\n);\n");
        out
    }
}

/// Everything known about one dataset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetSchema {
    pub id: DatasetId,
    /// Short name the router asks the model to answer with
    pub name: String,
    pub label: String,
    /// Physical database name; never to be used as an identifier qualifier
    pub database: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub tables: Vec<TableDescriptor>,
}

impl DatasetSchema {
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    pub fn render(&self) -> String {
        let blocks: Vec<String> = self.tables.iter().map(TableDescriptor::render).collect();
        blocks.join("\n")
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    datasets: Vec<DatasetSchema>,
}

/// Read-only description of every table the model may reference, per dataset
#[derive(Debug, Clone, Serialize)]
pub struct SchemaCatalog {
    datasets: BTreeMap<DatasetId, DatasetSchema>,
}

impl SchemaCatalog {
    /// The catalog compiled into the binary
    pub fn builtin() -> Result<Self, AppError> {
        Self::from_json(DEFAULT_CATALOG)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Validation(format!("Failed to read schema catalog {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let file: CatalogFile = serde_json::from_str(raw)
            .map_err(|e| AppError::Validation(format!("Invalid schema catalog: {}", e)))?;
        Self::from_datasets(file.datasets)
    }

    pub fn from_datasets(datasets: Vec<DatasetSchema>) -> Result<Self, AppError> {
        let mut map = BTreeMap::new();
        for dataset in datasets {
            Self::validate_dataset(&dataset)?;
            let id = dataset.id;
            if map.insert(id, dataset).is_some() {
                return Err(AppError::Validation(format!(
                    "Schema catalog lists dataset '{}' more than once",
                    id.as_str()
                )));
            }
        }

        for id in DatasetId::ALL {
            if !map.contains_key(&id) {
                return Err(AppError::Validation(format!(
                    "Schema catalog is missing dataset '{}'",
                    id.as_str()
                )));
            }
        }

        Ok(Self { datasets: map })
    }

    fn validate_dataset(dataset: &DatasetSchema) -> Result<(), AppError> {
        // The router asks the model for this name and parses it back into an id
        if dataset.name != dataset.id.name() {
            return Err(AppError::Validation(format!(
                "Dataset '{}' must be named '{}', found '{}'",
                dataset.id.as_str(),
                dataset.id.name(),
                dataset.name
            )));
        }

        if dataset.tables.is_empty() {
            return Err(AppError::Validation(format!(
                "Dataset '{}' declares no tables",
                dataset.name
            )));
        }

        let mut tables = HashSet::new();
        for table in &dataset.tables {
            if !tables.insert(table.name.as_str()) {
                return Err(AppError::Validation(format!(
                    "Dataset '{}' declares table '{}' twice",
                    dataset.name, table.name
                )));
            }
            if table.columns.is_empty() {
                return Err(AppError::Validation(format!(
                    "Table '{}' in dataset '{}' has no columns",
                    table.name, dataset.name
                )));
            }
            let mut columns = HashSet::new();
            for column in &table.columns {
                if !columns.insert(column.name.as_str()) {
                    return Err(AppError::Validation(format!(
                        "Table '{}' declares column '{}' twice",
                        table.name, column.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn dataset(&self, id: DatasetId) -> &DatasetSchema {
        // Construction guarantees every DatasetId is present
        &self.datasets[&id]
    }

    pub fn datasets(&self) -> impl Iterator<Item = &DatasetSchema> {
        self.datasets.values()
    }

    /// Table names that exist only in `id` and not in the other dataset
    pub fn exclusive_tables(&self, id: DatasetId) -> Vec<&str> {
        let other: HashSet<&str> = self.dataset(id.other()).table_names().collect();
        self.dataset(id)
            .table_names()
            .filter(|name| !other.contains(name))
            .collect()
    }
}
