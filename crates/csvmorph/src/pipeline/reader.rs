//! Tokenizer stage: bytes in the input format to rows of decoded text.

use std::io::Read;

use csv::StringRecord;

use crate::codec::{Charset, CharsetFault, DecodingReader};
use crate::config::CsvFormat;
use crate::error::{CsvMorphError, Result};
use crate::schema::SchemaIndex;
use crate::transform::Row;

/// Reads records from a byte source and binds them to column names.
pub struct RecordReader<R: Read> {
    reader: csv::Reader<BlankLines<DecodingReader<R>>>,
    columns: Vec<String>,
    buffer: StringRecord,
    records: u64,
}

impl<R: Read> RecordReader<R> {
    /// Create a reader for the input format, resolving its charset.
    ///
    /// When the format has a header, the first record is consumed here and
    /// used to bind fields to schema columns.
    pub fn new(source: R, format: &CsvFormat, index: &SchemaIndex) -> Result<Self> {
        let charset = Charset::resolve(&format.encoding)?;
        Self::with_charset(source, format, charset, index)
    }

    /// Create a reader with an already resolved charset.
    pub fn with_charset(
        source: R,
        format: &CsvFormat,
        charset: Charset,
        index: &SchemaIndex,
    ) -> Result<Self> {
        let escape = (format.escape != format.enclosing.characters).then(|| format.escape_byte());

        let mut builder = csv::ReaderBuilder::new();
        builder
            .delimiter(format.separator_byte())
            .has_headers(false)
            .quote(format.quote_byte())
            .double_quote(true)
            .escape(escape)
            .flexible(true);

        let decoded = DecodingReader::new(source, charset);
        let mut reader = builder.from_reader(BlankLines::new(decoded, format, escape));

        let schema_names = || index.names().map(|s| s.to_string()).collect::<Vec<_>>();
        let columns = if format.header {
            let mut header = StringRecord::new();
            if reader
                .read_record(&mut header)
                .map_err(|e| read_error(e, None))?
            {
                let names = header.iter().map(|name| name.to_string()).collect();
                bind_columns(names, index)?
            } else {
                schema_names()
            }
        } else {
            schema_names()
        };

        Ok(Self {
            reader,
            columns,
            buffer: StringRecord::new(),
            records: 0,
        })
    }

    /// Column names in input field order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of data records read so far.
    pub fn records_read(&self) -> u64 {
        self.records
    }

    /// Read the next data record, or `None` at end of input.
    pub fn next_row(&mut self) -> Result<Option<Row>> {
        let record = self.records + 1;
        if !self
            .reader
            .read_record(&mut self.buffer)
            .map_err(|e| read_error(e, Some(record)))?
        {
            return Ok(None);
        }
        self.records = record;

        if self.buffer.len() != self.columns.len() {
            return Err(CsvMorphError::FieldCount {
                record,
                expected: self.columns.len(),
                found: self.buffer.len(),
            });
        }

        let mut row = Row::new(record);
        for (name, value) in self.columns.iter().zip(self.buffer.iter()) {
            row.insert(name.as_str(), value);
        }

        Ok(Some(row))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

fn read_error(error: csv::Error, record: Option<u64>) -> CsvMorphError {
    match CharsetFault::in_csv(&error) {
        Some(fault) => fault.to_error(record),
        None => CsvMorphError::Tokenize(error),
    }
}

/// Read adapter that keeps blank lines as records.
///
/// The csv tokenizer drops empty lines, but a one-column file writes an
/// empty value as exactly that. Each blank line outside a quoted field is
/// rewritten to an empty quoted field, which one-column schemas read as an
/// empty value and wider schemas reject as a short record.
struct BlankLines<R> {
    inner: R,
    scanner: LineScanner,
    chunk: Box<[u8]>,
    out: Vec<u8>,
    pos: usize,
}

impl<R: Read> BlankLines<R> {
    fn new(inner: R, format: &CsvFormat, escape: Option<u8>) -> Self {
        Self {
            inner,
            scanner: LineScanner {
                separator: format.separator_byte(),
                quote: format.quote_byte(),
                escape,
                in_quotes: false,
                escaped: false,
                just_closed: false,
                field_start: true,
                line_start: true,
                after_cr: false,
            },
            chunk: vec![0; 8 * 1024].into_boxed_slice(),
            out: Vec::new(),
            pos: 0,
        }
    }
}

impl<R: Read> Read for BlankLines<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos == self.out.len() {
            let n = self.inner.read(&mut self.chunk)?;
            if n == 0 {
                return Ok(0);
            }
            self.out.clear();
            self.pos = 0;
            for &b in &self.chunk[..n] {
                self.scanner.feed(b, &mut self.out);
            }
        }

        let n = buf.len().min(self.out.len() - self.pos);
        buf[..n].copy_from_slice(&self.out[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Tracks just enough quoting state to tell a blank line from a line
/// break inside a quoted field.
struct LineScanner {
    separator: u8,
    quote: u8,
    escape: Option<u8>,
    in_quotes: bool,
    escaped: bool,
    just_closed: bool,
    field_start: bool,
    line_start: bool,
    after_cr: bool,
}

impl LineScanner {
    fn feed(&mut self, b: u8, out: &mut Vec<u8>) {
        if self.in_quotes {
            if self.escaped {
                self.escaped = false;
            } else if Some(b) == self.escape {
                self.escaped = true;
            } else if b == self.quote {
                self.in_quotes = false;
                self.just_closed = true;
            }
            out.push(b);
            return;
        }

        if self.just_closed {
            self.just_closed = false;
            // A doubled quote reopens the field
            if b == self.quote {
                self.in_quotes = true;
                out.push(b);
                return;
            }
        }

        match b {
            b'\n' if self.after_cr => self.after_cr = false,
            b'\n' | b'\r' => {
                if self.line_start {
                    out.extend_from_slice(&[self.quote, self.quote]);
                }
                self.line_start = true;
                self.field_start = true;
                self.after_cr = b == b'\r';
            }
            _ => {
                if b == self.quote && self.field_start {
                    self.in_quotes = true;
                }
                self.field_start = b == self.separator;
                self.line_start = false;
                self.after_cr = false;
            }
        }
        out.push(b);
    }
}

/// Decide how header fields map to schema columns.
///
/// A header made only of schema names binds by name and must cover the
/// whole schema. A header with no schema names at all is skipped and fields
/// bind to schema names by position. Anything in between is an error.
fn bind_columns(header: Vec<String>, index: &SchemaIndex) -> Result<Vec<String>> {
    let known = header.iter().filter(|name| index.contains(name)).count();

    if known == 0 {
        return Ok(index.names().map(|s| s.to_string()).collect());
    }

    if let Some(unknown) = header.iter().find(|name| !index.contains(name)) {
        return Err(CsvMorphError::ColumnNotInSchema {
            column: unknown.clone(),
            record: None,
        });
    }

    for (i, name) in header.iter().enumerate() {
        if header[..i].contains(name) {
            return Err(CsvMorphError::DuplicateColumn {
                column: name.clone(),
            });
        }
    }

    if let Some(missing) = index.names().find(|name| !header.iter().any(|h| h.as_str() == *name)) {
        return Err(CsvMorphError::MissingColumn {
            column: missing.to_string(),
        });
    }

    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, DataType};

    fn index() -> SchemaIndex {
        SchemaIndex::build(&[
            Column::new("id", DataType::Integer, false),
            Column::new("name", DataType::String, true),
        ])
        .unwrap()
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_bind_by_name() {
        let bound = bind_columns(names(&["name", "id"]), &index()).unwrap();
        assert_eq!(bound, names(&["name", "id"]));
    }

    #[test]
    fn test_bind_positionally_when_header_is_foreign() {
        let bound = bind_columns(names(&["a", "b"]), &index()).unwrap();
        assert_eq!(bound, names(&["id", "name"]));
    }

    #[test]
    fn test_bind_rejects_mixed_header() {
        let err = bind_columns(names(&["id", "b"]), &index()).unwrap_err();
        assert!(matches!(err, CsvMorphError::ColumnNotInSchema { ref column, .. } if column == "b"));
    }

    #[test]
    fn test_bind_rejects_incomplete_header() {
        let err = bind_columns(names(&["id"]), &index()).unwrap_err();
        assert!(matches!(err, CsvMorphError::MissingColumn { ref column } if column == "name"));
    }

    #[test]
    fn test_bind_rejects_repeated_header() {
        let err = bind_columns(names(&["id", "name", "id"]), &index()).unwrap_err();
        assert!(matches!(err, CsvMorphError::DuplicateColumn { .. }));
    }

    #[test]
    fn test_read_with_header() {
        let data = "name,id\nAlice,1\n\"Bob, Jr.\",2\n";
        let mut reader =
            RecordReader::new(data.as_bytes(), &CsvFormat::default(), &index()).unwrap();

        assert_eq!(reader.columns(), &names(&["name", "id"])[..]);
        let first = reader.next_row().unwrap().unwrap();
        assert_eq!(first.record(), 1);
        assert_eq!(first.get("name"), Some("Alice"));
        let second = reader.next_row().unwrap().unwrap();
        assert_eq!(second.get("name"), Some("Bob, Jr."));
        assert!(reader.next_row().unwrap().is_none());
        assert_eq!(reader.records_read(), 2);
    }

    #[test]
    fn test_read_without_header() {
        let format = CsvFormat {
            header: false,
            separator: ';',
            ..CsvFormat::default()
        };
        let rows: Vec<Row> = RecordReader::new("7;Eve\n8;Mallory\n".as_bytes(), &format, &index())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("id"), Some("8"));
        assert_eq!(rows[1].get("name"), Some("Mallory"));
    }

    #[test]
    fn test_escaped_quote_inside_field() {
        let format = CsvFormat {
            header: false,
            ..CsvFormat::default()
        };
        let mut reader =
            RecordReader::new(r#"1,"say \"hi\"""#.as_bytes(), &format, &index()).unwrap();
        let row = reader.next_row().unwrap().unwrap();
        assert_eq!(row.get("name"), Some(r#"say "hi""#));
    }

    #[test]
    fn test_width_mismatch() {
        let format = CsvFormat {
            header: false,
            ..CsvFormat::default()
        };
        let mut reader = RecordReader::new("1,a\n2,b,extra\n".as_bytes(), &format, &index()).unwrap();
        assert!(reader.next_row().unwrap().is_some());
        let err = reader.next_row().unwrap_err();
        assert!(matches!(
            err,
            CsvMorphError::FieldCount { record: 2, expected: 2, found: 3 }
        ));
    }

    #[test]
    fn test_undecodable_bytes() {
        let format = CsvFormat {
            header: false,
            encoding: "ascii".to_string(),
            ..CsvFormat::default()
        };
        let mut reader =
            RecordReader::new("1,Charlès\n".as_bytes(), &format, &index()).unwrap();
        let err = reader.next_row().unwrap_err();
        assert!(matches!(err, CsvMorphError::Encoding { record: Some(1), .. }));
    }

    #[test]
    fn test_latin1_input_is_decoded() {
        let format = CsvFormat {
            header: false,
            encoding: "latin1".to_string(),
            ..CsvFormat::default()
        };
        let mut reader = RecordReader::new(&b"1,Charl\xE8s\n"[..], &format, &index()).unwrap();
        let row = reader.next_row().unwrap().unwrap();
        assert_eq!(row.get("name"), Some("Charlès"));
    }

    #[test]
    fn test_empty_input_with_header() {
        let mut reader = RecordReader::new("".as_bytes(), &CsvFormat::default(), &index()).unwrap();
        assert_eq!(reader.columns(), &names(&["id", "name"])[..]);
        assert!(reader.next_row().unwrap().is_none());
    }

    fn single_column() -> SchemaIndex {
        SchemaIndex::build(&[Column::new("Column1", DataType::Float, true)]).unwrap()
    }

    fn values(input: &[u8], format: &CsvFormat, index: &SchemaIndex) -> Result<Vec<String>> {
        RecordReader::new(input, format, index)?
            .map(|row| row.map(|r| r.iter().map(|(_, v)| v).collect::<Vec<_>>().join("|")))
            .collect()
    }

    #[test]
    fn test_blank_line_is_an_empty_value_in_one_column_files() {
        let format = CsvFormat {
            header: false,
            ..CsvFormat::default()
        };
        let rows = values(b"1.5\n\n2.5\n", &format, &single_column()).unwrap();
        assert_eq!(rows, vec!["1.5", "", "2.5"]);

        let rows = values(b"1.5\r\n\r\n2.5\r\n", &format, &single_column()).unwrap();
        assert_eq!(rows, vec!["1.5", "", "2.5"]);

        let rows = values(b"\n\n", &format, &single_column()).unwrap();
        assert_eq!(rows, vec!["", ""]);
    }

    #[test]
    fn test_blank_line_in_wider_file_is_a_short_record() {
        let format = CsvFormat {
            header: false,
            ..CsvFormat::default()
        };
        let err = values(b"1,a\n\n2,b\n", &format, &index()).unwrap_err();
        assert!(matches!(
            err,
            CsvMorphError::FieldCount { record: 2, expected: 2, found: 1 }
        ));
    }

    #[test]
    fn test_line_breaks_inside_quotes_are_kept() {
        let format = CsvFormat {
            header: false,
            ..CsvFormat::default()
        };
        let rows = values(b"1,\"two\n\nlines\"\n2,\"say \"\"hi\"\"\n\"\n", &format, &index()).unwrap();
        assert_eq!(rows, vec!["1|two\n\nlines", "2|say \"hi\"\n"]);
    }

    #[test]
    fn test_utf8_bom_does_not_hide_header_names() {
        let reader = RecordReader::new(
            &b"\xEF\xBB\xBFid,name\n1,Alice\n"[..],
            &CsvFormat::default(),
            &index(),
        )
        .unwrap();
        assert_eq!(reader.columns(), &names(&["id", "name"])[..]);
    }

    #[test]
    fn test_shift_jis_trail_byte_is_not_an_escape() {
        let format = CsvFormat {
            header: false,
            encoding: "Shift_JIS".to_string(),
            ..CsvFormat::default()
        };
        let schema = SchemaIndex::build(&[
            Column::new("a", DataType::String, false),
            Column::new("b", DataType::String, false),
        ])
        .unwrap();
        let rows = values(b"\"\x95\x5C\",x\n", &format, &schema).unwrap();
        assert_eq!(rows, vec!["表|x"]);
    }
}
