//! Column schema declared by the configuration and its name lookup.

mod column;
mod index;

pub use column::{Column, DataType};
pub use index::SchemaIndex;
