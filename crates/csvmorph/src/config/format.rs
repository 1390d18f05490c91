//! Typed configuration model and its documented defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CsvMorphError, Result};
use crate::schema::Column;

use super::normalize::normalize;

/// Quoting rules for fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Enclosing {
    /// Quote character.
    pub characters: char,
    /// Quote every output field, not only those that need it.
    pub strict: bool,
}

impl Default for Enclosing {
    fn default() -> Self {
        Self {
            characters: '"',
            strict: true,
        }
    }
}

/// Conventions of one side (input or output) of a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CsvFormat {
    /// Field separator.
    pub separator: char,
    /// Whether the first line holds column names.
    pub header: bool,
    /// Literal text standing for a missing value.
    pub nulls_encoded_as: String,
    /// Literal text standing for boolean true.
    pub true_encoded_as: String,
    /// Literal text standing for boolean false.
    pub false_encoded_as: String,
    /// Charset label of the byte stream.
    pub encoding: String,
    /// Quoting rules.
    pub enclosing: Enclosing,
    /// Escape character inside quoted fields.
    pub escape: char,
    /// Pattern of `date` columns.
    pub date_format: String,
    /// Pattern of `datetime` columns.
    pub datetime_format: String,
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self {
            separator: ',',
            header: true,
            nulls_encoded_as: String::new(),
            true_encoded_as: "1".to_string(),
            false_encoded_as: "0".to_string(),
            encoding: "UTF-8".to_string(),
            enclosing: Enclosing::default(),
            escape: '\\',
            date_format: "YYYY-MM-DD".to_string(),
            datetime_format: "YYYY-MM-DDTHH:mm:ss.sssZ".to_string(),
        }
    }
}

impl CsvFormat {
    /// Field separator as the byte the CSV reader/writer expects.
    ///
    /// Validation guarantees these characters are ASCII.
    pub fn separator_byte(&self) -> u8 {
        self.separator as u8
    }

    /// Quote character as a byte.
    pub fn quote_byte(&self) -> u8 {
        self.enclosing.characters as u8
    }

    /// Escape character as a byte.
    pub fn escape_byte(&self) -> u8 {
        self.escape as u8
    }
}

/// A validated, fully defaulted configuration.
///
/// Built once at startup and shared read-only by every row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigurationFile {
    /// Ordered column declarations; also the output column order.
    pub schema: Vec<Column>,
    /// Conventions of the data being read.
    #[serde(default)]
    pub input: CsvFormat,
    /// Conventions of the data being written.
    #[serde(default)]
    pub output: CsvFormat,
}

impl ConfigurationFile {
    /// Create a configuration from already typed parts.
    pub fn new(schema: Vec<Column>, input: CsvFormat, output: CsvFormat) -> Self {
        Self {
            schema,
            input,
            output,
        }
    }

    /// Read, validate and default a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| CsvMorphError::Io {
            context: format!("configuration file '{}'", path.display()),
            source: e,
        })?;
        Self::from_json_str(&text)
    }

    /// Validate and default a JSON configuration held in memory.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(text)?;
        normalize(document)
    }

    /// Column names in schema order.
    pub fn column_names(&self) -> Vec<&str> {
        self.schema.iter().map(|c| c.name.as_str()).collect()
    }
}
