//! Tri-state flag parsing for loosely typed boolean columns.
//!
//! Upstream writers store flags as real booleans, as assorted spellings of
//! "true"/"yes", or as the number 1. All interpretation of those columns goes
//! through [`parse_flag`]; nothing else in the crate compares flag strings.

use serde::{Deserialize, Serialize};

use crate::cell::Cell;

/// A boolean column value that may not have been written yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    Yes,
    No,
    /// Nothing stored. Whether that means yes or no is the caller's policy.
    #[default]
    Unset,
}

impl Flag {
    pub fn is_yes(self) -> bool {
        self == Self::Yes
    }

    /// Absence counts as consent: `Unset` behaves like `Yes`.
    pub fn or_yes(self) -> bool {
        matches!(self, Self::Yes | Self::Unset)
    }
}

impl From<bool> for Flag {
    fn from(value: bool) -> Self {
        if value {
            Self::Yes
        } else {
            Self::No
        }
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yes => write!(f, "yes"),
            Self::No => write!(f, "no"),
            Self::Unset => write!(f, "unset"),
        }
    }
}

const TRUTHY: &[&str] = &["true", "TRUE", "yes", "YES", "Yes"];

/// Interpret a stored cell as a flag.
///
/// `Yes` for boolean `true`, the number `1`, or one of the exact spellings
/// `true`, `TRUE`, `yes`, `YES`, `Yes`. `Unset` for empty cells. Everything
/// else, including unrecognized text, is `No`.
pub fn parse_flag(cell: &Cell) -> Flag {
    match cell {
        Cell::Empty => Flag::Unset,
        Cell::Bool(b) => Flag::from(*b),
        Cell::Number(n) => Flag::from(*n == 1.0),
        Cell::Text(s) if s.is_empty() => Flag::Unset,
        Cell::Text(s) => Flag::from(TRUTHY.contains(&s.as_str())),
    }
}

/// Cell to write back for a resolved flag. `Unset` clears the cell.
pub fn flag_cell(flag: Flag) -> Cell {
    match flag {
        Flag::Yes => Cell::Bool(true),
        Flag::No => Cell::Bool(false),
        Flag::Unset => Cell::Empty,
    }
}
