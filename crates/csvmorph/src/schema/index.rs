//! Name-to-column lookup built once from the schema.

use indexmap::IndexMap;

use crate::error::{CsvMorphError, Result};

use super::column::Column;

/// Read-only lookup from column name to its declaration.
///
/// Iteration order is schema order, which is also the output column order.
#[derive(Debug, Clone)]
pub struct SchemaIndex {
    columns: IndexMap<String, Column>,
}

impl SchemaIndex {
    /// Build the index, rejecting repeated column names.
    pub fn build(schema: &[Column]) -> Result<Self> {
        let mut columns = IndexMap::with_capacity(schema.len());

        for column in schema {
            if columns.contains_key(&column.name) {
                return Err(CsvMorphError::DuplicateColumn {
                    column: column.name.clone(),
                });
            }
            columns.insert(column.name.clone(), column.clone());
        }

        Ok(Self { columns })
    }

    /// Look up a column, failing when the name is not declared.
    pub fn lookup(&self, name: &str) -> Result<&Column> {
        self.columns
            .get(name)
            .ok_or_else(|| CsvMorphError::ColumnNotInSchema {
                column: name.to_string(),
                record: None,
            })
    }

    /// Get a column if it is declared.
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Check whether a name is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Column names in schema order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    /// Columns in schema order.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check whether the schema is empty.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
