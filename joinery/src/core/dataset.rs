//! In-memory tabular datasets and dataset handles.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::scalar::Scalar;

/// One row of a dataset, keyed by column name.
///
/// Column order lives in [`TabularDataset::columns`], not in the row.
pub type Row = BTreeMap<String, Scalar>;

/// Logical column type of a dataset column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Boolean,
    Integer,
    Float,
    String,
    Timestamp,
    #[default]
    Unknown,
}

impl ColumnType {
    /// Infers a column type from a value.
    pub fn of(value: &Scalar) -> Self {
        match value {
            Scalar::Null => ColumnType::Unknown,
            Scalar::Bool(_) => ColumnType::Boolean,
            Scalar::Int(_) => ColumnType::Integer,
            Scalar::Float(_) => ColumnType::Float,
            Scalar::String(_) => ColumnType::String,
            Scalar::Timestamp(_) => ColumnType::Timestamp,
        }
    }
}

/// Schema entry for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub data_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    /// Returns a copy of this column under a different name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }
}

/// Single or composite primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    Single(String),
    Composite(Vec<String>),
}

impl PrimaryKey {
    /// Column names making up the key.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            PrimaryKey::Single(column) => vec![column.as_str()],
            PrimaryKey::Composite(columns) => columns.iter().map(String::as_str).collect(),
        }
    }

    /// Applies a column rename to every key column.
    pub fn map_columns(&self, rename: impl Fn(&str) -> String) -> Self {
        match self {
            PrimaryKey::Single(column) => PrimaryKey::Single(rename(column)),
            PrimaryKey::Composite(columns) => {
                PrimaryKey::Composite(columns.iter().map(|c| rename(c)).collect())
            }
        }
    }
}

/// A materialized table: schema plus rows.
///
/// Every row's keys are a subset of the column names.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabularDataset {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Row>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PrimaryKey>,
}

impl TabularDataset {
    pub fn new(columns: Vec<ColumnSpec>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows,
            primary_key: None,
        }
    }

    /// Builds a dataset from column names and positional row values.
    ///
    /// Column types are inferred from the first non-null value of each column.
    ///
    /// ```rust
    /// use joinery::core::{Scalar, TabularDataset};
    ///
    /// let ds = TabularDataset::from_values(
    ///     &["id", "name"],
    ///     vec![
    ///         vec![Scalar::Int(1), Scalar::from("Ada")],
    ///         vec![Scalar::Int(2), Scalar::from("Grace")],
    ///     ],
    /// );
    /// assert_eq!(ds.len(), 2);
    /// ```
    pub fn from_values(names: &[&str], values: Vec<Vec<Scalar>>) -> Self {
        let columns = names
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let data_type = values
                    .iter()
                    .filter_map(|row| row.get(idx))
                    .find(|v| !v.is_null())
                    .map(ColumnType::of)
                    .unwrap_or_default();
                ColumnSpec::new(*name, data_type)
            })
            .collect();

        let rows = values
            .into_iter()
            .map(|row| {
                names
                    .iter()
                    .zip(row)
                    .map(|(name, value)| (name.to_string(), value))
                    .collect()
            })
            .collect();

        Self::new(columns, rows)
    }

    /// Sets the primary key.
    pub fn with_primary_key(mut self, key: PrimaryKey) -> Self {
        self.primary_key = Some(key);
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in schema order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Value of a column in one row; missing cells read as null.
    pub fn value(&self, row: usize, column: &str) -> &Scalar {
        static NULL: Scalar = Scalar::Null;
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&NULL)
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, column: &str) -> Vec<Scalar> {
        self.rows
            .iter()
            .map(|r| r.get(column).cloned().unwrap_or_default())
            .collect()
    }
}

/// Field-level metadata supplied by the caller to steer profiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldHint {
    #[serde(default)]
    pub is_identifier: bool,
    #[serde(default)]
    pub is_reference: bool,
}

impl FieldHint {
    pub fn identifier() -> Self {
        Self {
            is_identifier: true,
            is_reference: false,
        }
    }

    pub fn reference() -> Self {
        Self {
            is_identifier: false,
            is_reference: true,
        }
    }
}

/// Field hints keyed by column name.
pub type FieldHints = HashMap<String, FieldHint>;

/// Where a field of a dataset came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldLineage {
    pub field: String,
    pub source_dataset: String,
    pub source_field: String,
}

/// Reference to a dataset whose bytes live in blob storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetHandle {
    /// Stable dataset id; the engine table name is derived from it.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub lineage: Vec<FieldLineage>,
}

impl DatasetHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            lineage: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_values_infers_types() {
        let ds = TabularDataset::from_values(
            &["id", "score", "label"],
            vec![
                vec![Scalar::Int(1), Scalar::Null, Scalar::from("a")],
                vec![Scalar::Int(2), Scalar::Float(0.5), Scalar::from("b")],
            ],
        );
        assert_eq!(ds.columns[0].data_type, ColumnType::Integer);
        assert_eq!(ds.columns[1].data_type, ColumnType::Float);
        assert_eq!(ds.columns[2].data_type, ColumnType::String);
        assert_eq!(ds.value(0, "score"), &Scalar::Null);
        assert_eq!(ds.value(9, "id"), &Scalar::Null);
    }

    #[test]
    fn test_dataset_json_shape() {
        let json = r#"{
            "columns": [{"name": "id", "type": "integer"}, {"name": "city"}],
            "rows": [{"id": 1, "city": "Oslo"}, {"id": 2}],
            "primaryKey": "id"
        }"#;
        let ds: TabularDataset = serde_json::from_str(json).unwrap();
        assert_eq!(ds.column_names(), vec!["id", "city"]);
        assert_eq!(ds.columns[1].data_type, ColumnType::Unknown);
        assert_eq!(ds.primary_key, Some(PrimaryKey::Single("id".to_string())));
        assert_eq!(ds.value(1, "city"), &Scalar::Null);
    }

    #[test]
    fn test_column_spec_serializes_name_and_type_only() {
        let spec = ColumnSpec::new("total", ColumnType::Float).renamed("total_right");
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            serde_json::json!({"name": "total_right", "type": "float"})
        );
    }

    #[test]
    fn test_primary_key_rename() {
        let key = PrimaryKey::Composite(vec!["a".to_string(), "b".to_string()]);
        let renamed = key.map_columns(|c| format!("{c}_left"));
        assert_eq!(renamed.columns(), vec!["a_left", "b_left"]);
    }
}
