//! csvmorph: schema-driven conversion of CSV data between conventions.
//!
//! A configuration declares the columns of a file (name, type, nullability)
//! and two CSV formats: how the input is written and how the output should be
//! written. Every field is parsed under the input format's rules (separators,
//! null and boolean sentinels, date patterns, charset) and rendered again
//! under the output format's rules.
//!
//! # Core Principles
//!
//! - **Typed**: every value is checked against its declared column type
//! - **Streaming**: rows flow one at a time, in order, from source to sink
//! - **Fail-fast**: the first invalid value stops the whole conversion
//!
//! # Example
//!
//! ```no_run
//! use csvmorph::{ConfigurationFile, Pipeline};
//!
//! let config = ConfigurationFile::load("config.json").unwrap();
//! let pipeline = Pipeline::new(&config).unwrap();
//! let stats = pipeline
//!     .run(std::io::stdin().lock(), std::io::stdout().lock())
//!     .unwrap();
//!
//! eprintln!("Converted {} records", stats.records);
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod schema;
pub mod transform;

pub use codec::{
    Charset, DatePattern, DecodingReader, EncodingWriter, Timestamp, TypedValue, ValueCodec,
};
pub use config::{ConfigurationFile, CsvFormat, Enclosing, normalize, normalize_document};
pub use error::{CsvMorphError, Result, Violation};
pub use pipeline::{Pipeline, PipelineStats, RecordReader, RecordWriter, convert};
pub use schema::{Column, DataType, SchemaIndex};
pub use transform::{Row, RowTransformer};
