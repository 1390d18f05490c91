//! Typed values and the codec translating them between formats.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::CsvFormat;
use crate::error::{CsvMorphError, Result};
use crate::schema::{Column, DataType};

use super::temporal::{DatePattern, Timestamp};

// =============================================================================
// NUMERIC GRAMMARS
// =============================================================================

static INTEGER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[+-]?[1-9]\d*|0)$").unwrap());

static FLOAT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[+-]?(\d*\.)?\d+$").unwrap());

/// A field value after parsing under the input format.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// The input null sentinel on a nullable column.
    Null,
    String(String),
    Boolean(bool),
    /// Canonical decimal digits: no leading `+`, no width limit.
    Integer(String),
    Float(f64),
    Date(NaiveDate),
    Datetime(Timestamp),
}

/// Parses raw text under the input format and renders it under the output format.
///
/// Date patterns are compiled once here rather than per value.
#[derive(Debug, Clone)]
pub struct ValueCodec<'a> {
    input: &'a CsvFormat,
    output: &'a CsvFormat,
    input_date: DatePattern,
    input_datetime: DatePattern,
    output_date: DatePattern,
    output_datetime: DatePattern,
}

impl<'a> ValueCodec<'a> {
    /// Build a codec for one input/output format pair.
    ///
    /// Fails if a date pattern does not compile, or if an input pattern
    /// cannot identify a calendar day.
    pub fn new(input: &'a CsvFormat, output: &'a CsvFormat) -> Result<Self> {
        let input_date = DatePattern::compile(&input.date_format)?;
        let input_datetime = DatePattern::compile(&input.datetime_format)?;
        input_date.require_date()?;
        input_datetime.require_date()?;

        Ok(Self {
            input,
            output,
            input_date,
            input_datetime,
            output_date: DatePattern::compile(&output.date_format)?,
            output_datetime: DatePattern::compile(&output.datetime_format)?,
        })
    }

    /// Parse a raw field for the given column.
    ///
    /// The null sentinel is checked first: on a nullable column it yields
    /// [`TypedValue::Null`] without any type check, otherwise it is an error.
    pub fn parse(&self, raw: &str, column: &Column) -> Result<TypedValue> {
        if raw == self.input.nulls_encoded_as {
            return if column.nullable {
                Ok(TypedValue::Null)
            } else {
                Err(CsvMorphError::NotNullable {
                    column: column.name.clone(),
                    record: None,
                })
            };
        }

        let invalid = || CsvMorphError::Type {
            column: column.name.clone(),
            value: raw.to_string(),
            expected: column.data_type,
            record: None,
        };

        match column.data_type {
            DataType::String => Ok(TypedValue::String(raw.to_string())),
            DataType::Boolean => {
                if raw == self.input.true_encoded_as {
                    Ok(TypedValue::Boolean(true))
                } else if raw == self.input.false_encoded_as {
                    Ok(TypedValue::Boolean(false))
                } else {
                    Err(invalid())
                }
            }
            DataType::Integer => {
                if !INTEGER_PATTERN.is_match(raw) {
                    return Err(invalid());
                }
                let digits = raw.strip_prefix('+').unwrap_or(raw);
                Ok(TypedValue::Integer(digits.to_string()))
            }
            DataType::Float => {
                if !FLOAT_PATTERN.is_match(raw) {
                    return Err(invalid());
                }
                match raw.parse::<f64>() {
                    Ok(x) if x.is_finite() => Ok(TypedValue::Float(x)),
                    _ => Err(invalid()),
                }
            }
            DataType::Date => self
                .input_date
                .parse(raw)
                .map(|ts| TypedValue::Date(ts.datetime.date()))
                .ok_or_else(invalid),
            DataType::Datetime => self
                .input_datetime
                .parse(raw)
                .map(TypedValue::Datetime)
                .ok_or_else(invalid),
        }
    }

    /// Render a typed value as output text.
    pub fn render(&self, value: &TypedValue) -> String {
        match value {
            TypedValue::Null => self.output.nulls_encoded_as.clone(),
            TypedValue::String(s) => s.clone(),
            TypedValue::Boolean(true) => self.output.true_encoded_as.clone(),
            TypedValue::Boolean(false) => self.output.false_encoded_as.clone(),
            TypedValue::Integer(digits) => digits.clone(),
            TypedValue::Float(x) => x.to_string(),
            TypedValue::Date(date) => self.output_date.format(&Timestamp::from_date(*date)),
            TypedValue::Datetime(ts) => self.output_datetime.format(ts),
        }
    }

    /// Parse then render a single field.
    pub fn convert(&self, raw: &str, column: &Column) -> Result<String> {
        self.parse(raw, column).map(|value| self.render(&value))
    }
}
