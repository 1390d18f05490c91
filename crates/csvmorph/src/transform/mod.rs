//! Row transformation: applying the value codec to every field of a row.

mod row;

pub use row::{Row, RowTransformer};
