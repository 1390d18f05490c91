//! Error types for the csvmorph library.

use std::fmt;

use thiserror::Error;

use crate::schema::DataType;

/// A single rule broken by a configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON-pointer style location of the offending value (`/input/separator`).
    pub path: String,
    /// What the value should have been.
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{}: {}", path, self.message)
    }
}

fn list_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("\n  {}", v))
        .collect()
}

fn at_record(record: &Option<u64>) -> String {
    match record {
        Some(n) => format!(" (record {})", n),
        None => String::new(),
    }
}

/// Main error type for csvmorph operations.
#[derive(Debug, Error)]
pub enum CsvMorphError {
    /// Error reading or writing a file or stream.
    #[error("IO error for {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration document broke one or more schema rules.
    #[error("Invalid configuration:{}", list_violations(.violations))]
    Configuration { violations: Vec<Violation> },

    /// The configuration text is not valid JSON.
    #[error("Configuration is not valid JSON: {0}")]
    ConfigSyntax(#[from] serde_json::Error),

    /// A column name appears more than once in the schema.
    #[error("Duplicate column '{column}' in schema")]
    DuplicateColumn { column: String },

    /// A field or header name has no entry in the schema.
    #[error("Column '{column}' is not declared in the schema{}", at_record(.record))]
    ColumnNotInSchema {
        column: String,
        record: Option<u64>,
    },

    /// The input header does not mention a schema column.
    #[error("Column '{column}' is declared in the schema but missing from the input header")]
    MissingColumn { column: String },

    /// A raw value does not conform to its column's declared type.
    #[error("Invalid {expected} value '{value}' in column '{column}'{}", at_record(.record))]
    Type {
        column: String,
        value: String,
        expected: DataType,
        record: Option<u64>,
    },

    /// The null sentinel was found in a column that does not accept nulls.
    #[error("Null value in non-nullable column '{column}'{}", at_record(.record))]
    NotNullable {
        column: String,
        record: Option<u64>,
    },

    /// A date/datetime pattern could not be compiled.
    #[error("Invalid date pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// A record is wider or narrower than the bound columns.
    #[error("Record {record} has {found} fields, expected {expected}")]
    FieldCount {
        record: u64,
        expected: usize,
        found: usize,
    },

    /// The CSV tokenizer rejected the input.
    #[error("CSV read error: {0}")]
    Tokenize(#[source] csv::Error),

    /// The CSV writer failed to produce output.
    #[error("CSV write error: {0}")]
    Stringify(#[source] csv::Error),

    /// Bytes could not be decoded, or text could not be encoded, in a charset.
    #[error("Encoding error ({charset}){}: {message}", at_record(.record))]
    Encoding {
        charset: String,
        record: Option<u64>,
        message: String,
    },
}

impl CsvMorphError {
    /// Attach a 1-based data record number to a per-row error.
    ///
    /// Errors that already carry a record, or that are not tied to a row,
    /// are returned unchanged.
    pub fn at_record(self, n: u64) -> Self {
        match self {
            CsvMorphError::Type {
                column,
                value,
                expected,
                record: None,
            } => CsvMorphError::Type {
                column,
                value,
                expected,
                record: Some(n),
            },
            CsvMorphError::NotNullable {
                column,
                record: None,
            } => CsvMorphError::NotNullable {
                column,
                record: Some(n),
            },
            CsvMorphError::ColumnNotInSchema {
                column,
                record: None,
            } => CsvMorphError::ColumnNotInSchema {
                column,
                record: Some(n),
            },
            CsvMorphError::Encoding {
                charset,
                record: None,
                message,
            } => CsvMorphError::Encoding {
                charset,
                record: Some(n),
                message,
            },
            other => other,
        }
    }
}

/// Result type alias for csvmorph operations.
pub type Result<T> = std::result::Result<T, CsvMorphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_lists_every_violation() {
        let err = CsvMorphError::Configuration {
            violations: vec![
                Violation::new("/schema/0/data_type", "must be one of string, boolean"),
                Violation::new("/input/separator", "must be a single ASCII character"),
            ],
        };
        let message = err.to_string();
        assert!(message.contains("/schema/0/data_type: must be one of"));
        assert!(message.contains("/input/separator: must be a single ASCII character"));
        assert_eq!(message.lines().count(), 3);
    }

    #[test]
    fn test_at_record_fills_missing_position() {
        let err = CsvMorphError::NotNullable {
            column: "id".to_string(),
            record: None,
        }
        .at_record(7);
        assert!(matches!(err, CsvMorphError::NotNullable { record: Some(7), .. }));
        assert_eq!(err.to_string(), "Null value in non-nullable column 'id' (record 7)");
    }

    #[test]
    fn test_at_record_keeps_existing_position() {
        let err = CsvMorphError::NotNullable {
            column: "id".to_string(),
            record: Some(2),
        }
        .at_record(9);
        assert!(matches!(err, CsvMorphError::NotNullable { record: Some(2), .. }));
    }
}
