//! Streaming conversion: tokenizer, row transform and writer chained together.
//!
//! The chain is pull-driven. Each record is read, transformed and handed to
//! the writer before the next one is read, so at most one record is in flight
//! between stages, output order equals input order, and a slow sink stalls
//! the reader. The first error from any stage ends the run; records already
//! handed to the writer stay written.

mod reader;
mod writer;

use std::io::{Read, Write};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::codec::{Charset, ValueCodec};
use crate::config::ConfigurationFile;
use crate::error::Result;
use crate::schema::SchemaIndex;
use crate::transform::RowTransformer;

pub use reader::RecordReader;
pub use writer::RecordWriter;

/// Summary of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Data records converted (header excluded).
    pub records: u64,
    /// Whether a header line was written.
    pub header_written: bool,
}

/// A conversion pipeline bound to one configuration.
pub struct Pipeline<'a> {
    config: &'a ConfigurationFile,
    index: SchemaIndex,
    codec: ValueCodec<'a>,
    input_charset: Charset,
    output_charset: Charset,
}

impl<'a> Pipeline<'a> {
    /// Prepare a pipeline, checking everything that can fail before any I/O.
    pub fn new(config: &'a ConfigurationFile) -> Result<Self> {
        let index = SchemaIndex::build(&config.schema)?;
        let codec = ValueCodec::new(&config.input, &config.output)?;
        let input_charset = Charset::resolve(&config.input.encoding)?;
        let output_charset = Charset::resolve(&config.output.encoding)?;

        debug!(
            columns = index.len(),
            input_separator = %config.input.separator,
            output_separator = %config.output.separator,
            %input_charset,
            %output_charset,
            "pipeline prepared"
        );

        Ok(Self {
            config,
            index,
            codec,
            input_charset,
            output_charset,
        })
    }

    /// The configuration this pipeline runs with.
    pub fn config(&self) -> &ConfigurationFile {
        self.config
    }

    /// Stream every record from `source` to `sink`.
    pub fn run<R: Read, W: Write>(&self, source: R, sink: W) -> Result<PipelineStats> {
        let result = self.drive(source, sink);
        match &result {
            Ok(stats) => info!(records = stats.records, "conversion finished"),
            Err(e) => warn!(error = %e, "conversion aborted"),
        }
        result
    }

    fn drive<R: Read, W: Write>(&self, source: R, sink: W) -> Result<PipelineStats> {
        let transformer = RowTransformer::new(&self.index, &self.codec);
        let reader = RecordReader::with_charset(
            source,
            &self.config.input,
            self.input_charset,
            &self.index,
        )?;
        let mut writer = RecordWriter::with_charset(
            sink,
            &self.config.output,
            self.output_charset,
            &self.index,
        );

        let header_written = self.config.output.header;
        if header_written {
            writer.write_header()?;
        }

        let mut records = 0;
        // Dropping the writer on error flushes the rows it already accepted
        for row in reader {
            let row = transformer.transform(row?)?;
            writer.write_row(&row)?;
            records += 1;
        }

        writer.finish()?;
        Ok(PipelineStats {
            records,
            header_written,
        })
    }
}

/// Convert `source` into `sink` with a one-off pipeline.
pub fn convert<R: Read, W: Write>(
    config: &ConfigurationFile,
    source: R,
    sink: W,
) -> Result<PipelineStats> {
    Pipeline::new(config)?.run(source, sink)
}
