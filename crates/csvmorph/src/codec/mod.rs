//! Per-type parsing of input text and rendering of output text.

mod charset;
mod temporal;
mod transcode;
mod value;

pub use charset::Charset;
pub use temporal::{DatePattern, Timestamp};
pub use transcode::{DecodingReader, EncodingWriter};
pub use value::{TypedValue, ValueCodec};

pub(crate) use transcode::CharsetFault;
