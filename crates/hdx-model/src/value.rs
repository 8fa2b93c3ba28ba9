//! Cell values carried by ingested rows.
//!
//! Upstream decoders (CSV, spreadsheets, JSON APIs) hand the engine loosely
//! typed values. [`CellValue`] is the single representation the core works
//! with, so nothing downstream has to branch on where a row came from.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single field value in a [`Row`](crate::Row) or an aggregated output map.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Missing value.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Calendar date already decoded upstream.
    Date(NaiveDate),
    Text(String),
}

impl CellValue {
    /// Returns true for `Null` and for blank text.
    pub fn is_null(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Returns the text content when this is a text value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Renders the value the way it would appear in a spreadsheet cell.
    ///
    /// `Null` renders as an empty string and floats drop trailing zeros.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(value) => value.to_string(),
            Self::Int(value) => value.to_string(),
            Self::Float(value) => format_numeric(*value),
            Self::Date(value) => value.format("%Y-%m-%d").to_string(),
            Self::Text(value) => value.clone(),
        }
    }

    /// Interprets the value as a number where that is possible.
    ///
    /// Text is trimmed, thousands separators are removed and a trailing `%`
    /// divides by 100. Booleans, dates and unparseable text yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) if value.is_finite() => Some(*value),
            Self::Text(text) => parse_numeric_text(text),
            _ => None,
        }
    }

    /// Compares the rendered value with `expected`, ignoring surrounding whitespace.
    pub fn matches_text(&self, expected: &str) -> bool {
        self.to_text().trim() == expected.trim()
    }

    /// Wraps a number, keeping integral values as `Int`.
    pub fn from_number(value: f64) -> Self {
        if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            Self::Int(value as i64)
        } else {
            Self::Float(value)
        }
    }
}

fn parse_numeric_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let (body, percent) = match trimmed.strip_suffix('%') {
        Some(body) => (body.trim_end(), true),
        None => (trimmed, false),
    };
    let cleaned: String = body.chars().filter(|ch| *ch != ',').collect();
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if percent { value / 100.0 } else { value })
}

/// Formats a floating-point number as a string without trailing zeros.
///
/// # Examples
///
/// ```
/// use hdx_model::format_numeric;
///
/// assert_eq!(format_numeric(1.0), "1");
/// assert_eq!(format_numeric(1.5), "1.5");
/// assert_eq!(format_numeric(0.0), "0");
/// ```
pub fn format_numeric(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
