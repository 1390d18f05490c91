//! Column declaration and the closed set of supported data types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Data type of a column's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Free text, never validated.
    String,
    /// Values equal to the format's true/false sentinels.
    Boolean,
    /// Whole numbers without leading zeros.
    Integer,
    /// Decimal numbers.
    Float,
    /// Calendar dates in the format's `date_format`.
    Date,
    /// Timestamps in the format's `datetime_format`.
    Datetime,
}

impl DataType {
    /// Every supported type, in declaration order.
    pub const ALL: [DataType; 6] = [
        DataType::String,
        DataType::Boolean,
        DataType::Integer,
        DataType::Float,
        DataType::Date,
        DataType::Datetime,
    ];

    /// Name used in configuration documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Boolean => "boolean",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::Date => "date",
            DataType::Datetime => "datetime",
        }
    }

    /// Returns true if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Float)
    }

    /// Returns true if this type is temporal.
    pub fn is_temporal(&self) -> bool {
        matches!(self, DataType::Date | DataType::Datetime)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown data type '{}'", s))
    }
}

/// A single column declared in the configuration schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Column {
    /// Column name, unique within the schema.
    #[serde(rename = "column_name", alias = "name")]
    pub name: String,
    /// Declared type of the column's values.
    pub data_type: DataType,
    /// Whether the null sentinel is accepted.
    pub nullable: bool,
}

impl Column {
    /// Create a new column declaration.
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
        }
    }
}
