//! Charset resolution and strict text encoding.

use std::borrow::Cow;
use std::fmt;

use encoding_rs::{Encoding, UTF_8};

use crate::error::{CsvMorphError, Result};

/// A resolved character set.
///
/// Any charset encoding_rs can both decode and encode is supported. The CSV
/// tokenizer and writer only ever see UTF-8; transcoding happens around them.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// Strict 7-bit ASCII; any byte or character above 0x7F is rejected.
    Ascii,
    /// A WHATWG encoding.
    Whatwg(&'static Encoding),
}

impl Charset {
    /// Resolve a charset label such as `UTF-8`, `latin1` or `ascii`.
    pub fn for_label(label: &str) -> Option<Self> {
        let trimmed = label.trim();
        if trimmed.eq_ignore_ascii_case("ascii") || trimmed.eq_ignore_ascii_case("us-ascii") {
            return Some(Charset::Ascii);
        }

        let encoding = Encoding::for_label(trimmed.as_bytes())?;
        // UTF-16 and "replacement" decode but have no encoder of their own
        if encoding.output_encoding() != encoding {
            return None;
        }
        Some(Charset::Whatwg(encoding))
    }

    /// Resolve a label or fail with an encoding error naming it.
    pub fn resolve(label: &str) -> Result<Self> {
        Self::for_label(label).ok_or_else(|| CsvMorphError::Encoding {
            charset: label.to_string(),
            record: None,
            message: "unsupported charset".to_string(),
        })
    }

    /// Canonical name of the charset.
    pub fn name(&self) -> &'static str {
        match self {
            Charset::Ascii => "US-ASCII",
            Charset::Whatwg(encoding) => encoding.name(),
        }
    }

    /// Encode text without substituting unmappable characters.
    pub fn encode<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>> {
        match self {
            Charset::Ascii => match text.chars().find(|c| !c.is_ascii()) {
                Some(c) => Err(self.error(format!("character '{}' is not ASCII", c))),
                None => Ok(Cow::Borrowed(text.as_bytes())),
            },
            Charset::Whatwg(encoding) if *encoding == UTF_8 => Ok(Cow::Borrowed(text.as_bytes())),
            Charset::Whatwg(encoding) => {
                let (bytes, _, had_errors) = encoding.encode(text);
                if had_errors {
                    let c = text
                        .chars()
                        .find(|c| {
                            let mut buf = [0u8; 4];
                            encoding.encode(c.encode_utf8(&mut buf)).2
                        })
                        .unwrap_or(char::REPLACEMENT_CHARACTER);
                    return Err(self.error(format!("character '{}' cannot be represented", c)));
                }
                Ok(bytes)
            }
        }
    }

    fn error(&self, message: String) -> CsvMorphError {
        CsvMorphError::Encoding {
            charset: self.name().to_string(),
            record: None,
            message,
        }
    }
}

impl fmt::Debug for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Charset({})", self.name())
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
