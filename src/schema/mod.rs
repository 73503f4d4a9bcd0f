//! Declarative table schema.
//!
//! The schema is a YAML document describing the expected columns of the
//! ingested table and the role each column plays downstream:
//!
//! ```yaml
//! columns:
//!   - id: int
//!   - Gender: category
//!   - Age: int
//! numerical_columns: [Age]
//! categorical_columns: [Gender]
//! num_features: [Age]
//! mm_columns: []
//! drop_columns: id
//! target_column: Response
//! binary_mappings:
//!   Gender: { Female: 0, Male: 1 }
//! ```
//!
//! Documents are checked when loaded, so a stage never meets a schema that
//! references an undeclared column.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Int,
    Float,
    Bool,
    Category,
}

impl ColumnType {
    /// Parses the type names accepted in schema documents.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "int" | "int32" | "int64" | "integer" => Some(Self::Int),
            "float" | "float32" | "float64" | "double" => Some(Self::Float),
            "bool" | "boolean" => Some(Self::Bool),
            "category" | "str" | "string" | "object" => Some(Self::Category),
            _ => None,
        }
    }

    /// Arrow type used when reading the column.
    pub fn data_type(self) -> DataType {
        match self {
            Self::Int => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Bool => DataType::Boolean,
            Self::Category => DataType::Utf8,
        }
    }
}

/// A declared column and its type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub dtype: ColumnType,
}

/// Nullable Arrow schema with one field per declared column.
pub fn declared_arrow_schema(columns: &[ColumnSpec]) -> ArrowSchema {
    ArrowSchema::new(
        columns
            .iter()
            .map(|c| Field::new(&c.name, c.dtype.data_type(), true))
            .collect::<Vec<_>>(),
    )
}

/// Two-valued categorical column encoded as 0/1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinaryMapping {
    codes: BTreeMap<String, i64>,
}

impl BinaryMapping {
    /// Returns the code for a category, if mapped.
    pub fn encode(&self, value: &str) -> Option<i64> {
        self.codes.get(value).copied()
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.codes.keys().map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct RawSchema {
    columns: Vec<BTreeMap<String, String>>,
    numerical_columns: Vec<String>,
    categorical_columns: Vec<String>,
    num_features: Vec<String>,
    mm_columns: Vec<String>,
    drop_columns: String,
    target_column: String,
    #[serde(default)]
    binary_mappings: BTreeMap<String, BinaryMapping>,
}

/// Validated, read-only table schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    columns: Vec<ColumnSpec>,
    numerical_columns: Vec<String>,
    categorical_columns: Vec<String>,
    num_features: Vec<String>,
    mm_columns: Vec<String>,
    drop_column: String,
    target_column: String,
    binary_mappings: BTreeMap<String, BinaryMapping>,
}

impl Schema {
    /// Loads and validates a schema document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let schema = Self::from_yaml_str(&text)?;
        tracing::info!(
            path = %path.display(),
            columns = schema.column_count(),
            target = %schema.target_column,
            "Loaded schema"
        );
        Ok(schema)
    }

    /// Parses and validates a schema document.
    pub fn from_yaml_str(text: &str) -> Result<Self, SchemaError> {
        let raw: RawSchema = serde_yaml::from_str(text)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawSchema) -> Result<Self, SchemaError> {
        let mut columns = Vec::with_capacity(raw.columns.len());
        for (index, entry) in raw.columns.into_iter().enumerate() {
            if entry.len() != 1 {
                return Err(SchemaError::MalformedColumn { index });
            }
            if let Some((name, dtype)) = entry.into_iter().next() {
                let dtype = ColumnType::parse(&dtype).ok_or_else(|| SchemaError::UnsupportedType {
                    column: name.clone(),
                    dtype,
                })?;
                columns.push(ColumnSpec { name, dtype });
            }
        }

        let schema = Self {
            columns,
            numerical_columns: raw.numerical_columns,
            categorical_columns: raw.categorical_columns,
            num_features: raw.num_features,
            mm_columns: raw.mm_columns,
            drop_column: raw.drop_columns,
            target_column: raw.target_column,
            binary_mappings: raw.binary_mappings,
        };
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if self.columns.is_empty() {
            return Err(SchemaError::EmptyColumns);
        }

        let mut declared = HashSet::new();
        for column in &self.columns {
            if !declared.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateColumn(column.name.clone()));
            }
        }

        let roles: [(&str, &[String]); 4] = [
            ("numerical_columns", self.numerical_columns.as_slice()),
            ("categorical_columns", self.categorical_columns.as_slice()),
            ("num_features", self.num_features.as_slice()),
            ("mm_columns", self.mm_columns.as_slice()),
        ];
        for (role, names) in roles {
            for name in names {
                if !declared.contains(name.as_str()) {
                    return Err(SchemaError::UnknownColumn {
                        role: role.to_string(),
                        column: name.clone(),
                    });
                }
                if *name == self.drop_column {
                    return Err(SchemaError::DropColumnReferenced {
                        column: name.clone(),
                        role: role.to_string(),
                    });
                }
            }
        }

        for (column, role) in [
            (&self.drop_column, "drop_columns"),
            (&self.target_column, "target_column"),
        ] {
            if !declared.contains(column.as_str()) {
                return Err(SchemaError::UnknownColumn {
                    role: role.to_string(),
                    column: column.clone(),
                });
            }
        }

        if self.target_column == self.drop_column {
            return Err(SchemaError::DropColumnReferenced {
                column: self.drop_column.clone(),
                role: "target_column".to_string(),
            });
        }

        if let Some(column) = self
            .num_features
            .iter()
            .find(|name| self.mm_columns.contains(*name))
        {
            return Err(SchemaError::ConflictingScaling(column.clone()));
        }

        if self.num_features.contains(&self.target_column)
            || self.mm_columns.contains(&self.target_column)
        {
            return Err(SchemaError::ScaledTarget(self.target_column.clone()));
        }

        for (column, mapping) in &self.binary_mappings {
            if !declared.contains(column.as_str()) {
                return Err(SchemaError::UnknownColumn {
                    role: "binary_mappings".to_string(),
                    column: column.clone(),
                });
            }
            if *column == self.drop_column || *column == self.target_column {
                return Err(SchemaError::InvalidBinaryMapping {
                    column: column.clone(),
                    message: "identifier and target columns cannot be mapped".to_string(),
                });
            }
            let mut codes: Vec<i64> = mapping.codes.values().copied().collect();
            codes.sort_unstable();
            if codes != [0, 1] {
                return Err(SchemaError::InvalidBinaryMapping {
                    column: column.clone(),
                    message: format!("expected exactly the codes 0 and 1, found {:?}", codes),
                });
            }
        }

        Ok(())
    }

    /// Declared columns in order.
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Declared column types as an Arrow schema.
    pub fn arrow_schema(&self) -> ArrowSchema {
        declared_arrow_schema(&self.columns)
    }

    pub fn numerical_columns(&self) -> &[String] {
        &self.numerical_columns
    }

    pub fn categorical_columns(&self) -> &[String] {
        &self.categorical_columns
    }

    /// Columns standardized by the feature pipeline.
    pub fn num_features(&self) -> &[String] {
        &self.num_features
    }

    /// Columns min-max scaled by the feature pipeline.
    pub fn mm_columns(&self) -> &[String] {
        &self.mm_columns
    }

    /// Identifier column removed before transformation.
    pub fn drop_column(&self) -> &str {
        &self.drop_column
    }

    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    pub fn binary_mappings(&self) -> &BTreeMap<String, BinaryMapping> {
        &self.binary_mappings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
columns:
  - id: int
  - Gender: category
  - Age: int
  - Annual_Premium: float
  - Vehicle_Age: category
  - Response: int
numerical_columns: [Age, Annual_Premium, Response]
categorical_columns: [Gender, Vehicle_Age]
num_features: [Age]
mm_columns: [Annual_Premium]
drop_columns: id
target_column: Response
binary_mappings:
  Gender:
    Female: 0
    Male: 1
"#;

    #[test]
    fn test_parse_valid_schema() {
        let schema = Schema::from_yaml_str(VALID).unwrap();
        assert_eq!(schema.column_count(), 6);
        assert_eq!(
            schema.column_names().collect::<Vec<_>>(),
            vec!["id", "Gender", "Age", "Annual_Premium", "Vehicle_Age", "Response"]
        );
        assert_eq!(schema.columns()[3].dtype, ColumnType::Float);
        assert_eq!(schema.columns()[1].dtype, ColumnType::Category);
        assert_eq!(schema.num_features(), ["Age".to_string()]);
        assert_eq!(schema.mm_columns(), ["Annual_Premium".to_string()]);
        assert_eq!(schema.drop_column(), "id");
        assert_eq!(schema.target_column(), "Response");

        let gender = &schema.binary_mappings()["Gender"];
        assert_eq!(gender.encode("Male"), Some(1));
        assert_eq!(gender.encode("Female"), Some(0));
        assert_eq!(gender.encode("Other"), None);
    }

    #[test]
    fn test_missing_field_fails_fast() {
        let text = VALID.replace("target_column: Response\n", "");
        let err = Schema::from_yaml_str(&text).unwrap_err();
        assert!(matches!(err, SchemaError::Yaml(_)));
        assert!(err.to_string().contains("target_column"));
    }

    #[test]
    fn test_unknown_column_rejected() {
        let text = VALID.replace("num_features: [Age]", "num_features: [Age, Speed]");
        let err = Schema::from_yaml_str(&text).unwrap_err();
        match err {
            SchemaError::UnknownColumn { role, column } => {
                assert_eq!(role, "num_features");
                assert_eq!(column, "Speed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_drop_column_referenced_elsewhere() {
        let text = VALID.replace(
            "numerical_columns: [Age, Annual_Premium, Response]",
            "numerical_columns: [id, Age, Annual_Premium, Response]",
        );
        let err = Schema::from_yaml_str(&text).unwrap_err();
        assert!(matches!(err, SchemaError::DropColumnReferenced { .. }));
    }

    #[test]
    fn test_conflicting_scaling_rejected() {
        let text = VALID.replace("mm_columns: [Annual_Premium]", "mm_columns: [Age]");
        let err = Schema::from_yaml_str(&text).unwrap_err();
        assert!(matches!(err, SchemaError::ConflictingScaling(ref c) if c == "Age"));
    }

    #[test]
    fn test_scaled_target_rejected() {
        let text = VALID.replace("num_features: [Age]", "num_features: [Age, Response]");
        let err = Schema::from_yaml_str(&text).unwrap_err();
        assert!(matches!(err, SchemaError::ScaledTarget(_)));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let text = VALID.replace("  - Age: int\n", "  - Age: int\n  - Age: float\n");
        let err = Schema::from_yaml_str(&text).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateColumn(ref c) if c == "Age"));
    }

    #[test]
    fn test_malformed_column_entry() {
        let text = VALID.replace("  - Age: int\n", "  - Age: int\n    Extra: int\n");
        let err = Schema::from_yaml_str(&text).unwrap_err();
        assert!(matches!(err, SchemaError::MalformedColumn { index: 2 }));
    }

    #[test]
    fn test_binary_mapping_must_be_zero_one() {
        let text = VALID.replace("    Male: 1", "    Male: 2");
        let err = Schema::from_yaml_str(&text).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidBinaryMapping { .. }));
    }

    #[test]
    fn test_unsupported_dtype_rejected() {
        let text = VALID.replace("  - Age: int\n", "  - Age: timestamp\n");
        let err = Schema::from_yaml_str(&text).unwrap_err();
        match err {
            SchemaError::UnsupportedType { column, dtype } => {
                assert_eq!(column, "Age");
                assert_eq!(dtype, "timestamp");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_arrow_schema_uses_declared_types() {
        let schema = Schema::from_yaml_str(VALID).unwrap();
        let arrow = schema.arrow_schema();
        assert_eq!(arrow.fields().len(), 6);
        assert_eq!(arrow.field_with_name("Age").unwrap().data_type(), &DataType::Int64);
        assert_eq!(
            arrow.field_with_name("Annual_Premium").unwrap().data_type(),
            &DataType::Float64
        );
        assert_eq!(arrow.field_with_name("Gender").unwrap().data_type(), &DataType::Utf8);
        assert!(arrow.field_with_name("Age").unwrap().is_nullable());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Schema::load("/definitely/not/here/schema.yaml").unwrap_err();
        assert!(matches!(err, SchemaError::Io { .. }));
    }

    #[test]
    fn test_shipped_schema_is_valid() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/schema.yaml");
        let schema = Schema::load(path).unwrap();
        assert_eq!(schema.column_count(), 12);
        assert_eq!(schema.target_column(), "Response");
        assert_eq!(schema.drop_column(), "id");
    }
}
