//! Strict date/time patterns with moment-style tokens.
//!
//! A pattern such as `YYYY-MM-DDTHH:mm:ss.SSSZ` is compiled once into a
//! token list and an anchored regex. Parsing requires the whole text to match
//! the regex (so digit widths and literals are enforced) and the captured
//! fields to form a real calendar date and clock time. Formatting walks the
//! same tokens over a parsed [`Timestamp`].

use std::fmt::Write as _;

use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;

use crate::error::{CsvMorphError, Result};

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Token spellings, longest first so that `YYYY` wins over `YY`.
const TOKENS: &[(&str, Token)] = &[
    ("YYYY", Token::Year4),
    ("MMMM", Token::MonthName),
    ("SSS", Token::Fraction(3)),
    ("sss", Token::Fraction(3)),
    ("MMM", Token::MonthAbbr),
    ("YY", Token::Year2),
    ("MM", Token::Month { padded: true }),
    ("DD", Token::Day { padded: true }),
    ("HH", Token::Hour24 { padded: true }),
    ("hh", Token::Hour12 { padded: true }),
    ("mm", Token::Minute { padded: true }),
    ("ss", Token::Second { padded: true }),
    ("SS", Token::Fraction(2)),
    ("ZZ", Token::Offset { colon: false }),
    ("M", Token::Month { padded: false }),
    ("D", Token::Day { padded: false }),
    ("H", Token::Hour24 { padded: false }),
    ("h", Token::Hour12 { padded: false }),
    ("m", Token::Minute { padded: false }),
    ("s", Token::Second { padded: false }),
    ("S", Token::Fraction(1)),
    ("A", Token::Meridiem { upper: true }),
    ("a", Token::Meridiem { upper: false }),
    ("Z", Token::Offset { colon: true }),
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    Year4,
    Year2,
    MonthName,
    MonthAbbr,
    Month { padded: bool },
    Day { padded: bool },
    Hour24 { padded: bool },
    Hour12 { padded: bool },
    Meridiem { upper: bool },
    Minute { padded: bool },
    Second { padded: bool },
    /// Fractional seconds with 1, 2 or 3 digits.
    Fraction(u8),
    Offset { colon: bool },
}

impl Token {
    fn regex(&self) -> String {
        let digits = |padded: bool| if padded { r"(\d{2})" } else { r"(\d{1,2})" };
        match self {
            Token::Literal(text) => regex::escape(text),
            Token::Year4 => r"(\d{4})".to_string(),
            Token::Year2 => r"(\d{2})".to_string(),
            Token::MonthName => format!("({})", MONTH_NAMES.join("|")),
            Token::MonthAbbr => format!("({})", MONTH_ABBREVIATIONS.join("|")),
            Token::Month { padded }
            | Token::Day { padded }
            | Token::Hour24 { padded }
            | Token::Hour12 { padded }
            | Token::Minute { padded }
            | Token::Second { padded } => digits(*padded).to_string(),
            Token::Meridiem { upper: true } => "(AM|PM)".to_string(),
            Token::Meridiem { upper: false } => "(am|pm)".to_string(),
            Token::Fraction(n) => format!(r"(\d{{{}}})", n),
            Token::Offset { .. } => r"(Z|[+-]\d{2}(?::?\d{2})?)".to_string(),
        }
    }

    fn is_literal(&self) -> bool {
        matches!(self, Token::Literal(_))
    }
}

/// A point in time as read from a CSV field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    /// Wall-clock date and time as written.
    pub datetime: NaiveDateTime,
    /// UTC offset, when the pattern carried one.
    pub offset: Option<FixedOffset>,
}

impl Timestamp {
    /// A timestamp at midnight of the given date, without offset.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            datetime: date.and_time(NaiveTime::MIN),
            offset: None,
        }
    }
}

/// Fields captured while parsing, before calendar validation.
#[derive(Debug, Default)]
struct Fields {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
    hour24: Option<u32>,
    hour12: Option<u32>,
    pm: Option<bool>,
    minute: Option<u32>,
    second: Option<u32>,
    millis: Option<u32>,
    offset: Option<i32>,
}

/// Store a field, rejecting a second capture that disagrees with the first.
fn set<T: PartialEq + Copy>(slot: &mut Option<T>, value: T) -> Option<()> {
    match *slot {
        Some(existing) if existing != value => None,
        _ => {
            *slot = Some(value);
            Some(())
        }
    }
}

/// A compiled date/time pattern.
#[derive(Debug, Clone)]
pub struct DatePattern {
    source: String,
    tokens: Vec<Token>,
    regex: Regex,
}

impl DatePattern {
    /// Compile a moment-style pattern.
    pub fn compile(pattern: &str) -> Result<Self> {
        let tokens = tokenize(pattern)?;
        if tokens.is_empty() {
            return Err(CsvMorphError::Pattern {
                pattern: pattern.to_string(),
                message: "pattern is empty".to_string(),
            });
        }

        let mut source = String::from("^");
        for token in &tokens {
            source.push_str(&token.regex());
        }
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| CsvMorphError::Pattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            source: pattern.to_string(),
            tokens,
            regex,
        })
    }

    /// The pattern text this was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Fail unless the pattern names a year, a month and a day.
    ///
    /// Required for patterns used to parse input.
    pub fn require_date(&self) -> Result<()> {
        let has = |pred: fn(&Token) -> bool| self.tokens.iter().any(pred);
        let year = has(|t| matches!(t, Token::Year4 | Token::Year2));
        let month = has(|t| matches!(t, Token::Month { .. } | Token::MonthName | Token::MonthAbbr));
        let day = has(|t| matches!(t, Token::Day { .. }));

        if year && month && day {
            Ok(())
        } else {
            Err(CsvMorphError::Pattern {
                pattern: self.source.clone(),
                message: "a parsing pattern needs year, month and day tokens".to_string(),
            })
        }
    }

    /// Parse text that must match the pattern exactly.
    pub fn parse(&self, text: &str) -> Option<Timestamp> {
        let captures = self.regex.captures(text)?;
        let mut fields = Fields::default();
        let mut group = 0;

        for token in &self.tokens {
            if token.is_literal() {
                continue;
            }
            group += 1;
            let value = captures.get(group)?.as_str();

            match token {
                Token::Literal(_) => {}
                Token::Year4 => set(&mut fields.year, value.parse().ok()?)?,
                Token::Year2 => {
                    let yy: i32 = value.parse().ok()?;
                    set(&mut fields.year, if yy < 69 { 2000 + yy } else { 1900 + yy })?
                }
                Token::MonthName => {
                    let month = MONTH_NAMES.iter().position(|m| *m == value)? as u32 + 1;
                    set(&mut fields.month, month)?
                }
                Token::MonthAbbr => {
                    let month = MONTH_ABBREVIATIONS.iter().position(|m| *m == value)? as u32 + 1;
                    set(&mut fields.month, month)?
                }
                Token::Month { .. } => set(&mut fields.month, value.parse().ok()?)?,
                Token::Day { .. } => set(&mut fields.day, value.parse().ok()?)?,
                Token::Hour24 { .. } => set(&mut fields.hour24, value.parse().ok()?)?,
                Token::Hour12 { .. } => set(&mut fields.hour12, value.parse().ok()?)?,
                Token::Meridiem { .. } => {
                    set(&mut fields.pm, value.eq_ignore_ascii_case("pm"))?
                }
                Token::Minute { .. } => set(&mut fields.minute, value.parse().ok()?)?,
                Token::Second { .. } => set(&mut fields.second, value.parse().ok()?)?,
                Token::Fraction(digits) => {
                    let raw: u32 = value.parse().ok()?;
                    let millis = raw * 10u32.pow(3 - u32::from(*digits));
                    set(&mut fields.millis, millis)?
                }
                Token::Offset { .. } => set(&mut fields.offset, parse_offset(value)?)?,
            }
        }

        resolve(fields)
    }

    /// Render a timestamp with this pattern.
    ///
    /// Offset tokens render `+00:00` when the timestamp has no offset.
    pub fn format(&self, timestamp: &Timestamp) -> String {
        let dt = &timestamp.datetime;
        let mut out = String::with_capacity(self.source.len() + 8);

        for token in &self.tokens {
            // Writing to a String cannot fail
            let _ = match token {
                Token::Literal(text) => {
                    out.push_str(text);
                    Ok(())
                }
                Token::Year4 => write!(out, "{:04}", dt.year()),
                Token::Year2 => write!(out, "{:02}", dt.year().rem_euclid(100)),
                Token::MonthName => {
                    out.push_str(MONTH_NAMES[dt.month0() as usize]);
                    Ok(())
                }
                Token::MonthAbbr => {
                    out.push_str(MONTH_ABBREVIATIONS[dt.month0() as usize]);
                    Ok(())
                }
                Token::Month { padded } => write_number(&mut out, dt.month(), *padded),
                Token::Day { padded } => write_number(&mut out, dt.day(), *padded),
                Token::Hour24 { padded } => write_number(&mut out, dt.hour(), *padded),
                Token::Hour12 { padded } => write_number(&mut out, dt.hour12().1, *padded),
                Token::Meridiem { upper } => {
                    let pm = dt.hour12().0;
                    out.push_str(match (pm, upper) {
                        (true, true) => "PM",
                        (false, true) => "AM",
                        (true, false) => "pm",
                        (false, false) => "am",
                    });
                    Ok(())
                }
                Token::Minute { padded } => write_number(&mut out, dt.minute(), *padded),
                Token::Second { padded } => write_number(&mut out, dt.second(), *padded),
                Token::Fraction(digits) => {
                    // Leap-second nanoseconds exceed 999ms
                    let millis = (dt.nanosecond() / 1_000_000).min(999);
                    match digits {
                        1 => write!(out, "{}", millis / 100),
                        2 => write!(out, "{:02}", millis / 10),
                        _ => write!(out, "{:03}", millis),
                    }
                }
                Token::Offset { colon } => {
                    let seconds = timestamp.offset.map_or(0, |o| o.local_minus_utc());
                    let sign = if seconds < 0 { '-' } else { '+' };
                    let minutes = seconds.abs() / 60;
                    let separator = if *colon { ":" } else { "" };
                    write!(out, "{}{:02}{}{:02}", sign, minutes / 60, separator, minutes % 60)
                }
            };
        }

        out
    }
}

fn write_number(out: &mut String, value: u32, padded: bool) -> std::fmt::Result {
    if padded {
        write!(out, "{:02}", value)
    } else {
        write!(out, "{}", value)
    }
}

/// Split a pattern into tokens; `[...]` spans are literal.
fn tokenize(pattern: &str) -> Result<Vec<Token>> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut rest = pattern;

    let push_literal = |tokens: &mut Vec<Token>, text: &str| {
        if let Some(Token::Literal(prev)) = tokens.last_mut() {
            prev.push_str(text);
        } else {
            tokens.push(Token::Literal(text.to_string()));
        }
    };

    while !rest.is_empty() {
        if let Some(bracketed) = rest.strip_prefix('[') {
            let end = bracketed.find(']').ok_or_else(|| CsvMorphError::Pattern {
                pattern: pattern.to_string(),
                message: "unterminated '[' literal".to_string(),
            })?;
            push_literal(&mut tokens, &bracketed[..end]);
            rest = &bracketed[end + 1..];
            continue;
        }

        if let Some((spelling, token)) = TOKENS.iter().find(|(s, _)| rest.starts_with(s)) {
            tokens.push(token.clone());
            rest = &rest[spelling.len()..];
            continue;
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            push_literal(&mut tokens, &rest[..c.len_utf8()]);
        }
        rest = chars.as_str();
    }

    // An empty bracket pair leaves an empty literal behind
    tokens.retain(|t| !matches!(t, Token::Literal(s) if s.is_empty()));
    Ok(tokens)
}

fn parse_offset(value: &str) -> Option<i32> {
    if value == "Z" {
        return Some(0);
    }
    let sign = if value.starts_with('-') { -1 } else { 1 };
    let digits: String = value[1..].chars().filter(|c| *c != ':').collect();
    let hours: i32 = digits.get(..2)?.parse().ok()?;
    let minutes: i32 = match digits.get(2..) {
        Some("") | None => 0,
        Some(m) => m.parse().ok()?,
    };
    if minutes > 59 {
        return None;
    }
    Some(sign * (hours * 3600 + minutes * 60))
}

fn resolve(fields: Fields) -> Option<Timestamp> {
    let year = fields.year.unwrap_or(1970);
    let date = NaiveDate::from_ymd_opt(year, fields.month.unwrap_or(1), fields.day.unwrap_or(1))?;

    let hour = match (fields.hour24, fields.hour12) {
        (Some(h24), Some(h12)) => {
            // Both clocks given: they must agree
            if h24 % 12 != h12 % 12 {
                return None;
            }
            h24
        }
        (Some(h24), None) => h24,
        (None, Some(h12)) => {
            if !(1..=12).contains(&h12) {
                return None;
            }
            (h12 % 12) + if fields.pm.unwrap_or(false) { 12 } else { 0 }
        }
        (None, None) => 0,
    };

    let time = NaiveTime::from_hms_milli_opt(
        hour,
        fields.minute.unwrap_or(0),
        fields.second.unwrap_or(0),
        fields.millis.unwrap_or(0),
    )?;

    let offset = match fields.offset {
        Some(seconds) => Some(FixedOffset::east_opt(seconds)?),
        None => None,
    };

    Some(Timestamp {
        datetime: date.and_time(time),
        offset,
    })
}
