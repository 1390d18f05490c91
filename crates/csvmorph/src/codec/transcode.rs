//! Byte-stream transcoding around the CSV tokenizer and writer.
//!
//! The tokenizer reads, and the writer produces, UTF-8 only. Input bytes are
//! decoded as a whole stream before tokenizing and output is encoded one
//! finished record at a time, so separator, quote and escape bytes never
//! meet the trail bytes of a multi-byte charset such as Shift_JIS.

use std::error::Error;
use std::fmt;
use std::io::{self, BufWriter, Read, Write};

use encoding_rs::{Decoder, DecoderResult};

use crate::error::CsvMorphError;

use super::charset::Charset;

const CHUNK_SIZE: usize = 8 * 1024;

/// A charset failure carried through `io::Error` across the csv crate.
#[derive(Debug, Clone)]
pub(crate) struct CharsetFault {
    charset: String,
    message: String,
}

impl CharsetFault {
    pub(crate) fn to_error(&self, record: Option<u64>) -> CsvMorphError {
        CsvMorphError::Encoding {
            charset: self.charset.clone(),
            record,
            message: self.message.clone(),
        }
    }

    /// Find a charset failure wrapped in an I/O error.
    pub(crate) fn in_io(error: &io::Error) -> Option<&CharsetFault> {
        error
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<CharsetFault>())
    }

    /// Find a charset failure wrapped in a csv error.
    pub(crate) fn in_csv(error: &csv::Error) -> Option<&CharsetFault> {
        match error.kind() {
            csv::ErrorKind::Io(io) => Self::in_io(io),
            _ => None,
        }
    }

    fn into_io(self) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, self)
    }
}

impl fmt::Display for CharsetFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.charset, self.message)
    }
}

impl Error for CharsetFault {}

impl From<CsvMorphError> for CharsetFault {
    fn from(error: CsvMorphError) -> Self {
        match error {
            CsvMorphError::Encoding {
                charset, message, ..
            } => CharsetFault { charset, message },
            other => CharsetFault {
                charset: String::new(),
                message: other.to_string(),
            },
        }
    }
}

/// Read adapter turning bytes in some charset into UTF-8.
///
/// Malformed input is an error, never a replacement character. A byte order
/// mark matching the charset is dropped.
pub struct DecodingReader<R> {
    inner: R,
    charset: Charset,
    decoder: Option<Decoder>,
    raw: Box<[u8]>,
    raw_start: usize,
    raw_end: usize,
    decoded: Box<[u8]>,
    decoded_start: usize,
    decoded_end: usize,
    consumed: u64,
    eof: bool,
    finished: bool,
    fault: Option<CharsetFault>,
}

impl<R: Read> DecodingReader<R> {
    pub fn new(inner: R, charset: Charset) -> Self {
        let decoder = match charset {
            Charset::Ascii => None,
            Charset::Whatwg(encoding) => Some(encoding.new_decoder_with_bom_removal()),
        };
        Self {
            inner,
            charset,
            decoder,
            raw: vec![0; CHUNK_SIZE].into_boxed_slice(),
            raw_start: 0,
            raw_end: 0,
            decoded: vec![0; CHUNK_SIZE].into_boxed_slice(),
            decoded_start: 0,
            decoded_end: 0,
            consumed: 0,
            eof: false,
            finished: false,
            fault: None,
        }
    }

    /// Decode the next chunk of raw input into the output buffer.
    fn fill(&mut self) -> io::Result<()> {
        if self.raw_start == self.raw_end && !self.eof {
            let n = loop {
                match self.inner.read(&mut self.raw) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            };
            self.raw_start = 0;
            self.raw_end = n;
            self.eof = n == 0;
        }

        let src = &self.raw[self.raw_start..self.raw_end];
        let (read, written, drained, malformed) = match &mut self.decoder {
            None => {
                let valid = src.iter().position(|b| !b.is_ascii()).unwrap_or(src.len());
                self.decoded[..valid].copy_from_slice(&src[..valid]);
                let malformed = (valid < src.len()).then(|| {
                    format!(
                        "byte 0x{:02X} at offset {} is not ASCII",
                        src[valid],
                        self.consumed + valid as u64
                    )
                });
                (valid, valid, valid == src.len(), malformed)
            }
            Some(decoder) => {
                let (result, read, written) =
                    decoder.decode_to_utf8_without_replacement(src, &mut self.decoded, self.eof);
                let malformed = match result {
                    DecoderResult::Malformed(_, _) => Some(format!(
                        "malformed byte sequence before offset {}",
                        self.consumed + read as u64
                    )),
                    _ => None,
                };
                (
                    read,
                    written,
                    matches!(result, DecoderResult::InputEmpty),
                    malformed,
                )
            }
        };

        self.raw_start += read;
        self.consumed += read as u64;
        self.decoded_start = 0;
        self.decoded_end = written;

        if let Some(message) = malformed {
            // Text before the bad bytes is still handed out first
            self.fault = Some(CharsetFault {
                charset: self.charset.name().to_string(),
                message,
            });
            self.finished = true;
        } else if self.eof && drained {
            self.finished = true;
        }
        Ok(())
    }
}

impl<R: Read> Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.decoded_start < self.decoded_end {
                let n = buf.len().min(self.decoded_end - self.decoded_start);
                buf[..n].copy_from_slice(&self.decoded[self.decoded_start..self.decoded_start + n]);
                self.decoded_start += n;
                return Ok(n);
            }
            if let Some(fault) = self.fault.take() {
                return Err(fault.into_io());
            }
            if self.finished {
                return Ok(0);
            }
            self.fill()?;
        }
    }
}

/// Write adapter turning the CSV writer's UTF-8 into the output charset.
///
/// Text is held until [`Write::flush`], which the record writer calls after
/// every record, so an unmappable character fails its own record and never
/// leaves half a record in the sink.
pub struct EncodingWriter<W: Write> {
    inner: BufWriter<W>,
    charset: Charset,
    pending: Vec<u8>,
}

impl<W: Write> EncodingWriter<W> {
    pub fn new(inner: W, charset: Charset) -> Self {
        Self {
            inner: BufWriter::new(inner),
            charset,
            pending: Vec::new(),
        }
    }

    fn encode_pending(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let text = std::str::from_utf8(&self.pending)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let bytes = self
            .charset
            .encode(text)
            .map_err(|e| CharsetFault::from(e).into_io())?;
        self.inner.write_all(&bytes)?;
        self.pending.clear();
        Ok(())
    }

    /// Encode anything still held and hand back the sink, flushed.
    pub fn finish(mut self) -> io::Result<W> {
        self.encode_pending()?;
        self.inner.into_inner().map_err(|e| e.into_error())
    }
}

impl<W: Write> Write for EncodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    /// Encodes held text; the sink itself is only flushed by `finish`.
    fn flush(&mut self) -> io::Result<()> {
        self.encode_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8], label: &str) -> io::Result<String> {
        let charset = Charset::for_label(label).unwrap();
        let mut text = String::new();
        DecodingReader::new(bytes, charset).read_to_string(&mut text)?;
        Ok(text)
    }

    #[test]
    fn test_decode_latin1() {
        assert_eq!(decode_all(b"Charl\xE8s", "latin1").unwrap(), "Charlès");
    }

    #[test]
    fn test_decode_shift_jis_keeps_backslash_trail_byte() {
        assert_eq!(decode_all(b"\"\x95\x5C\",x\n", "shift_jis").unwrap(), "\"表\",x\n");
    }

    #[test]
    fn test_decode_strips_utf8_bom() {
        assert_eq!(decode_all(b"\xEF\xBB\xBFid,name\n", "utf-8").unwrap(), "id,name\n");
    }

    #[test]
    fn test_decode_rejects_malformed_utf8() {
        let err = decode_all(b"Charl\xE8s", "utf-8").unwrap_err();
        let fault = CharsetFault::in_io(&err).unwrap();
        assert!(fault.to_error(Some(1)).to_string().contains("UTF-8"));
    }

    #[test]
    fn test_decode_ascii_is_strict() {
        assert_eq!(decode_all(b"Peter", "ascii").unwrap(), "Peter");
        let err = decode_all("Charlès".as_bytes(), "ascii").unwrap_err();
        assert!(err.to_string().contains("offset 5"));
    }

    #[test]
    fn test_decode_across_chunk_boundary() {
        // A two-byte character split by the chunk edge
        let mut input = vec![b'a'; CHUNK_SIZE - 1];
        input.extend_from_slice("é\n".as_bytes());
        let text = decode_all(&input, "utf-8").unwrap();
        assert!(text.ends_with("aé\n"));
        assert_eq!(text.chars().count(), CHUNK_SIZE + 1);
    }

    #[test]
    fn test_encode_waits_for_flush() {
        let charset = Charset::for_label("shift_jis").unwrap();
        let mut writer = EncodingWriter::new(Vec::new(), charset);
        writer.write_all("\"表".as_bytes()).unwrap();
        writer.write_all("\",x\n".as_bytes()).unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.finish().unwrap(), b"\"\x95\x5C\",x\n".to_vec());
    }

    #[test]
    fn test_encode_unmappable_fails_on_flush() {
        let charset = Charset::for_label("latin1").unwrap();
        let mut writer = EncodingWriter::new(Vec::new(), charset);
        writer.write_all("ok\n".as_bytes()).unwrap();
        writer.flush().unwrap();
        writer.write_all("snowman ☃\n".as_bytes()).unwrap();

        let err = writer.flush().unwrap_err();
        assert!(CharsetFault::in_io(&err).is_some());
    }
}
