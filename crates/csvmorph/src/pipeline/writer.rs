//! Re-tokenizer stage: rows to CSV bytes in the output format.

use std::io::{self, Write};

use csv::{QuoteStyle, Terminator};

use crate::codec::{Charset, CharsetFault, EncodingWriter};
use crate::config::CsvFormat;
use crate::error::{CsvMorphError, Result};
use crate::schema::SchemaIndex;
use crate::transform::Row;

/// Writes rows in schema order, quoted and encoded for the output format.
///
/// Quoting happens on UTF-8 text; each finished record is then encoded into
/// the output charset before it reaches the sink.
pub struct RecordWriter<W: Write> {
    writer: csv::Writer<EncodingWriter<W>>,
    columns: Vec<String>,
}

impl<W: Write> RecordWriter<W> {
    /// Create a writer for the output format, resolving its charset.
    pub fn new(sink: W, format: &CsvFormat, index: &SchemaIndex) -> Result<Self> {
        let charset = Charset::resolve(&format.encoding)?;
        Ok(Self::with_charset(sink, format, charset, index))
    }

    /// Create a writer with an already resolved charset.
    pub fn with_charset(
        sink: W,
        format: &CsvFormat,
        charset: Charset,
        index: &SchemaIndex,
    ) -> Self {
        let quote_style = if format.enclosing.strict {
            QuoteStyle::Always
        } else {
            QuoteStyle::Necessary
        };

        let mut builder = csv::WriterBuilder::new();
        builder
            .delimiter(format.separator_byte())
            .has_headers(false)
            .quote(format.quote_byte())
            .quote_style(quote_style)
            .terminator(Terminator::Any(b'\n'));
        if format.escape == format.enclosing.characters {
            builder.double_quote(true);
        } else {
            builder.double_quote(false).escape(format.escape_byte());
        }

        Self {
            writer: builder.from_writer(EncodingWriter::new(sink, charset)),
            columns: index.names().map(|s| s.to_string()).collect(),
        }
    }

    /// Write the column names as a header line.
    pub fn write_header(&mut self) -> Result<()> {
        self.writer
            .write_record(&self.columns)
            .map_err(CsvMorphError::Stringify)?;
        self.end_record(None)
    }

    /// Write one row, taking its fields in schema order.
    pub fn write_row(&mut self, row: &Row) -> Result<()> {
        let record = row.record();
        let fields = self
            .columns
            .iter()
            .map(|name| {
                row.get(name).ok_or_else(|| CsvMorphError::MissingColumn {
                    column: name.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.writer
            .write_record(&fields)
            .map_err(CsvMorphError::Stringify)?;
        self.end_record(Some(record))
    }

    /// Push the finished record through the charset encoder.
    fn end_record(&mut self, record: Option<u64>) -> Result<()> {
        self.writer.flush().map_err(|e| sink_error(e, record))
    }

    /// Flush buffered output and hand back the sink.
    pub fn finish(self) -> Result<W> {
        let encoder = self.writer.into_inner().map_err(|e| {
            let error = e.error();
            sink_error(io::Error::new(error.kind(), error.to_string()), None)
        })?;
        encoder.finish().map_err(|e| sink_error(e, None))
    }
}

fn sink_error(error: io::Error, record: Option<u64>) -> CsvMorphError {
    match CharsetFault::in_io(&error) {
        Some(fault) => fault.to_error(record),
        None => CsvMorphError::Io {
            context: "output sink".to_string(),
            source: error,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Enclosing;
    use crate::schema::{Column, DataType};

    fn index() -> SchemaIndex {
        SchemaIndex::build(&[
            Column::new("Column1", DataType::Float, true),
            Column::new("Column2", DataType::String, true),
        ])
        .unwrap()
    }

    fn write(format: &CsvFormat, rows: &[Row], header: bool) -> Result<String> {
        let mut writer = RecordWriter::new(Vec::new(), format, &index())?;
        if header {
            writer.write_header()?;
        }
        for row in rows {
            writer.write_row(row)?;
        }
        Ok(String::from_utf8(writer.finish()?).unwrap())
    }

    #[test]
    fn test_strict_quotes_every_field() {
        let rows = [Row::from_pairs(1, [("Column1", "2.65"), ("Column2", "Peter")])];
        let out = write(&CsvFormat::default(), &rows, true).unwrap();
        assert_eq!(out, "\"Column1\",\"Column2\"\n\"2.65\",\"Peter\"\n");
    }

    #[test]
    fn test_relaxed_quotes_only_when_needed() {
        let format = CsvFormat {
            separator: '\t',
            enclosing: Enclosing {
                characters: '\'',
                strict: false,
            },
            ..CsvFormat::default()
        };
        let rows = [Row::from_pairs(1, [("Column1", "1"), ("Column2", "tab\there")])];
        let out = write(&format, &rows, false).unwrap();
        assert_eq!(out, "1\t'tab\there'\n");
    }

    #[test]
    fn test_schema_order_wins_over_row_order() {
        let rows = [Row::from_pairs(1, [("Column2", "b"), ("Column1", "a")])];
        let format = CsvFormat {
            enclosing: Enclosing {
                strict: false,
                ..Enclosing::default()
            },
            ..CsvFormat::default()
        };
        assert_eq!(write(&format, &rows, false).unwrap(), "a,b\n");
    }

    #[test]
    fn test_escape_character_for_quotes() {
        let rows = [Row::from_pairs(1, [("Column1", "1"), ("Column2", "say \"hi\"")])];
        let out = write(&CsvFormat::default(), &rows, false).unwrap();
        assert_eq!(out, "\"1\",\"say \\\"hi\\\"\"\n");

        let doubled = CsvFormat {
            escape: '"',
            ..CsvFormat::default()
        };
        let out = write(&doubled, &rows, false).unwrap();
        assert_eq!(out, "\"1\",\"say \"\"hi\"\"\"\n");
    }

    #[test]
    fn test_unrepresentable_character() {
        let format = CsvFormat {
            encoding: "ascii".to_string(),
            ..CsvFormat::default()
        };
        let rows = [Row::from_pairs(3, [("Column1", "1"), ("Column2", "Charlès")])];
        let err = write(&format, &rows, false).unwrap_err();
        assert!(matches!(err, CsvMorphError::Encoding { record: Some(3), .. }));
    }

    #[test]
    fn test_latin1_output() {
        let format = CsvFormat {
            encoding: "latin1".to_string(),
            ..CsvFormat::default()
        };
        let mut writer = RecordWriter::new(Vec::new(), &format, &index()).unwrap();
        writer
            .write_row(&Row::from_pairs(1, [("Column1", "1"), ("Column2", "è")]))
            .unwrap();
        assert_eq!(writer.finish().unwrap(), b"\"1\",\"\xE8\"\n".to_vec());
    }

    #[test]
    fn test_missing_field() {
        let rows = [Row::from_pairs(1, [("Column1", "1")])];
        let err = write(&CsvFormat::default(), &rows, false).unwrap_err();
        assert!(matches!(err, CsvMorphError::MissingColumn { ref column } if column == "Column2"));
    }

    #[test]
    fn test_shift_jis_output_is_encoded_after_quoting() {
        let format = CsvFormat {
            encoding: "Shift_JIS".to_string(),
            ..CsvFormat::default()
        };
        let mut writer = RecordWriter::new(Vec::new(), &format, &index()).unwrap();
        writer
            .write_row(&Row::from_pairs(1, [("Column1", "1"), ("Column2", "表")]))
            .unwrap();
        assert_eq!(writer.finish().unwrap(), b"\"1\",\"\x95\x5C\"\n".to_vec());
    }

    #[test]
    fn test_rows_before_a_failure_reach_the_sink() {
        let format = CsvFormat {
            encoding: "ascii".to_string(),
            ..CsvFormat::default()
        };
        let mut out = Vec::new();
        {
            let mut writer = RecordWriter::new(&mut out, &format, &index()).unwrap();
            writer
                .write_row(&Row::from_pairs(1, [("Column1", "1"), ("Column2", "Peter")]))
                .unwrap();
            let err = writer
                .write_row(&Row::from_pairs(2, [("Column1", "2"), ("Column2", "Charlès")]))
                .unwrap_err();
            assert!(matches!(err, CsvMorphError::Encoding { record: Some(2), .. }));
        }
        assert_eq!(String::from_utf8(out).unwrap(), "\"1\",\"Peter\"\n");
    }
}
