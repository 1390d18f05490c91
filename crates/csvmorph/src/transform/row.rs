//! Rows and the stage that converts them field by field.

use indexmap::IndexMap;
use tracing::trace;

use crate::codec::ValueCodec;
use crate::error::Result;
use crate::schema::SchemaIndex;

/// One data record: column name to value, in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based position among data records (header excluded).
    record: u64,
    values: IndexMap<String, String>,
}

impl Row {
    /// Create an empty row.
    pub fn new(record: u64) -> Self {
        Self {
            record,
            values: IndexMap::new(),
        }
    }

    /// Create a row from name/value pairs, keeping their order.
    pub fn from_pairs<I, K, V>(record: u64, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            record,
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Get the record number.
    pub fn record(&self) -> u64 {
        self.record
    }

    /// Append or replace a field.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Get a field value by column name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|v| v.as_str())
    }

    /// Iterate fields in row order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Get the number of fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check whether the row has no fields.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Converts rows from the input representation to the output representation.
pub struct RowTransformer<'a> {
    index: &'a SchemaIndex,
    codec: &'a ValueCodec<'a>,
}

impl<'a> RowTransformer<'a> {
    /// Create a transformer over a schema index and a codec.
    pub fn new(index: &'a SchemaIndex, codec: &'a ValueCodec<'a>) -> Self {
        Self { index, codec }
    }

    /// Convert every field of a row, in the row's own order.
    ///
    /// Stops at the first field that fails; the error names the column and
    /// the row's record number.
    pub fn transform(&self, mut row: Row) -> Result<Row> {
        let record = row.record;

        for (name, value) in row.values.iter_mut() {
            let column = self.index.lookup(name).map_err(|e| e.at_record(record))?;
            *value = self
                .codec
                .convert(value, column)
                .map_err(|e| e.at_record(record))?;
        }

        trace!(record, fields = row.len(), "row transformed");
        Ok(row)
    }
}
