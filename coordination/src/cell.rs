//! Cell values as they come out of the row store.
//!
//! Spreadsheet cells are loosely typed: the same column can hold a boolean,
//! a number, or text depending on who wrote it. `Cell` keeps that shape and
//! the accessors here are the only place that interprets it.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A single stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Self::Empty
        } else {
            Self::Text(value)
        }
    }

    /// Whether the cell holds nothing (empty, or whitespace-only text).
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Render the cell as text; empty cells become `""`.
    pub fn as_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) if n.fract() == 0.0 && n.is_finite() => format!("{}", *n as i64),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    /// Text content, or `None` when the cell is blank.
    pub fn as_opt_text(&self) -> Option<String> {
        if self.is_blank() {
            None
        } else {
            Some(self.as_text().trim().to_string())
        }
    }

    /// Parse a non-negative counter with `parseInt`-like leniency:
    /// leading digits of text are used, anything else counts as zero.
    pub fn as_count(&self) -> u32 {
        match self {
            Self::Number(n) if n.is_finite() && *n >= 0.0 => n.trunc().min(u32::MAX as f64) as u32,
            Self::Text(s) => {
                let digits: String = s.trim().chars().take_while(char::is_ascii_digit).collect();
                digits.parse().unwrap_or(0)
            }
            _ => 0,
        }
    }

    /// Parse a wall-clock timestamp.
    ///
    /// Accepts RFC 3339 text, `YYYY-MM-DD HH:MM:SS` text (read as UTC), and
    /// numbers as epoch milliseconds.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Number(ms) if ms.is_finite() && *ms > 0.0 => {
                Utc.timestamp_millis_opt(*ms as i64).single()
            }
            Self::Text(s) => {
                let s = s.trim();
                DateTime::parse_from_rfc3339(s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok()
                    .or_else(|| {
                        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                            .ok()
                            .map(|naive| naive.and_utc())
                    })
            }
            _ => None,
        }
    }

    pub fn timestamp(at: DateTime<Utc>) -> Self {
        Self::Text(at.to_rfc3339())
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u32> for Cell {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_text())
    }
}
