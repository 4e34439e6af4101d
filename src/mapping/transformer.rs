//! Property transformers: bidirectional conversion between the domain value
//! of a field and the value stored in the index.
//!
//! A transformer is the outer layer of the conversion chain. On the way in
//! it sees the raw domain value before the analyzer does; on the way out it
//! runs after the analyzer. Values a transformer does not understand pass
//! through unchanged.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

use super::property::Property;
use crate::model::FieldValue;

pub trait PropertyTransformer: Send + Sync + fmt::Debug {
    fn to_index(&self, property: &Property, value: FieldValue) -> FieldValue;

    fn from_index(&self, property: &Property, value: FieldValue) -> FieldValue;
}

/// Leaves values untouched. Properties without a transformer share one
/// instance of it.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransformer;

impl PropertyTransformer for IdentityTransformer {
    fn to_index(&self, _property: &Property, value: FieldValue) -> FieldValue {
        value
    }

    fn from_index(&self, _property: &Property, value: FieldValue) -> FieldValue {
        value
    }
}

/// Formats dates with the property's `format` declaration and parses them
/// back.
///
/// Understands the backend's date format syntax: `||`-separated
/// alternatives where each one is a named format (`epoch_millis`,
/// `epoch_second`, `date`, `basic_date`, `date_time`,
/// `strict_date_optional_time`) or a pattern such as `yyyy-MM-dd HH:mm:ss`.
/// The first alternative is used when formatting; all of them are tried when
/// parsing. Without a `format` declaration dates travel as RFC 3339.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTransformer;

impl PropertyTransformer for DateTransformer {
    fn to_index(&self, property: &Property, value: FieldValue) -> FieldValue {
        let FieldValue::Date(date) = value else {
            return value;
        };
        let formats = DateFormat::parse_all(property.format());
        match formats.first() {
            Some(format) => format.render(&date),
            None => DateFormat::Rfc3339.render(&date),
        }
    }

    fn from_index(&self, property: &Property, value: FieldValue) -> FieldValue {
        if !matches!(value, FieldValue::Str(_) | FieldValue::Int(_)) {
            return value;
        }
        let mut formats = DateFormat::parse_all(property.format());
        if formats.is_empty() {
            formats.push(DateFormat::Rfc3339);
        }
        formats
            .iter()
            .find_map(|format| format.read(&value))
            .map_or(value, FieldValue::Date)
    }
}

/// One alternative of a date format declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DateFormat {
    Rfc3339,
    EpochMillis,
    EpochSecond,
    /// chrono `strftime` pattern translated from the backend syntax.
    Pattern(String),
}

impl DateFormat {
    pub(crate) fn parse_all(declaration: Option<&str>) -> Vec<Self> {
        declaration
            .map(|d| {
                d.split("||")
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(Self::parse)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn parse(format: &str) -> Self {
        match format {
            "epoch_millis" => Self::EpochMillis,
            "epoch_second" => Self::EpochSecond,
            "date_time" | "strict_date_time" | "date_optional_time"
            | "strict_date_optional_time" => Self::Rfc3339,
            "date" | "strict_date" => Self::Pattern("%Y-%m-%d".into()),
            "basic_date" => Self::Pattern("%Y%m%d".into()),
            "date_hour_minute_second" | "strict_date_hour_minute_second" => {
                Self::Pattern("%Y-%m-%dT%H:%M:%S".into())
            }
            pattern => Self::Pattern(translate_pattern(pattern)),
        }
    }

    fn render(&self, date: &DateTime<Utc>) -> FieldValue {
        match self {
            Self::Rfc3339 => FieldValue::Str(date.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::EpochMillis => FieldValue::Int(date.timestamp_millis()),
            Self::EpochSecond => FieldValue::Int(date.timestamp()),
            Self::Pattern(pattern) => FieldValue::Str(date.format(pattern).to_string()),
        }
    }

    fn read(&self, value: &FieldValue) -> Option<DateTime<Utc>> {
        match (self, value) {
            (Self::EpochMillis, FieldValue::Int(ms)) => Utc.timestamp_millis_opt(*ms).single(),
            (Self::EpochSecond, FieldValue::Int(s)) => Utc.timestamp_opt(*s, 0).single(),
            (Self::EpochMillis, FieldValue::Str(s)) => s
                .parse::<i64>()
                .ok()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            (Self::EpochSecond, FieldValue::Str(s)) => s
                .parse::<i64>()
                .ok()
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
            (Self::Rfc3339, FieldValue::Str(s)) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|d| d.with_timezone(&Utc)),
            (Self::Pattern(pattern), FieldValue::Str(s)) => parse_with_pattern(s, pattern),
            _ => None,
        }
    }
}

fn parse_with_pattern(text: &str, pattern: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_str(text, pattern) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, pattern) {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, pattern)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Translate a backend (Joda style) date pattern into a chrono pattern.
///
/// Text between single quotes is literal; `''` is a literal quote.
pub(crate) fn translate_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }

        if !c.is_ascii_alphabetic() {
            push_literal(&mut out, c);
            i += 1;
            continue;
        }

        let run = chars[i..].iter().take_while(|&&x| x == c).count();
        let spec = match (c, run) {
            ('y' | 'u', 2) => "%y",
            ('y' | 'u', _) => "%Y",
            ('M', 1 | 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', _) => "%d",
            ('H', _) => "%H",
            ('h', _) => "%I",
            ('m', _) => "%M",
            ('s', _) => "%S",
            ('S', 1..=3) => "%3f",
            ('S', 4..=6) => "%6f",
            ('S', _) => "%9f",
            ('a', _) => "%p",
            ('E', 1..=3) => "%a",
            ('E', _) => "%A",
            ('Z', 1) | ('X', 1 | 2) => "%z",
            ('Z', _) | ('X', _) => "%:z",
            _ => "",
        };
        if spec.is_empty() {
            for _ in 0..run {
                push_literal(&mut out, c);
            }
        } else {
            out.push_str(spec);
        }
        i += run;
    }

    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

/// Read the `format` entry of a raw declaration.
pub(crate) fn declared_format(declaration: &serde_json::Map<String, Value>) -> Option<&str> {
    declaration.get("format").and_then(Value::as_str)
}
