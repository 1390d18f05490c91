//! Configuration document: column schema plus input and output CSV formats.

mod format;
mod normalize;

pub use format::{ConfigurationFile, CsvFormat, Enclosing};
pub use normalize::{normalize, normalize_document, validate};
