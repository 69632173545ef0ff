//! Sheet-scoped cell addresses.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::coord::{A1ParseError, Coord};

/// Fully-resolved cell address: sheet name plus grid coordinate.
///
/// Equality is structural: two addresses naming the same sheet and cell are
/// the same key, wherever they came from.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CellAddr {
    pub sheet: String,
    pub coord: Coord,
}

impl CellAddr {
    pub fn new(sheet: impl Into<String>, coord: Coord) -> Self {
        CellAddr {
            sheet: sheet.into(),
            coord,
        }
    }

    /// Parse `Sheet1!B5`, `'Sheet A'!B5`, or bare `B5` (resolved against
    /// `default_sheet`). Quotes around the sheet name are stripped.
    pub fn parse(text: &str, default_sheet: &str) -> Result<Self, A1ParseError> {
        match split_sheet_prefix(text) {
            Some((sheet, cell)) => Ok(CellAddr::new(sheet, Coord::parse_a1(cell)?)),
            None => Ok(CellAddr::new(default_sheet, Coord::parse_a1(text)?)),
        }
    }
}

impl fmt::Display for CellAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if sheet_needs_quoting(&self.sheet) {
            write!(f, "'{}'!{}", self.sheet.replace('\'', "''"), self.coord)
        } else {
            write!(f, "{}!{}", self.sheet, self.coord)
        }
    }
}

/// Split a `Sheet!Cell` string at the separating `!`, honouring quoted sheet
/// names. Returns `None` when there is no sheet qualifier.
pub fn split_sheet_prefix(text: &str) -> Option<(String, &str)> {
    if let Some(rest) = text.strip_prefix('\'') {
        // Quoted sheet name; '' is an escaped quote.
        let mut sheet = String::new();
        let mut chars = rest.char_indices();
        while let Some((_, ch)) = chars.next() {
            if ch != '\'' {
                sheet.push(ch);
                continue;
            }
            match chars.next() {
                Some((_, '\'')) => sheet.push('\''),
                Some((j, '!')) => return Some((sheet, &rest[j + 1..])),
                _ => return None,
            }
        }
        None
    } else {
        let bang = text.find('!')?;
        Some((text[..bang].to_string(), &text[bang + 1..]))
    }
}

/// Whether a sheet name must be quoted in formula text.
pub fn sheet_needs_quoting(sheet: &str) -> bool {
    sheet.is_empty()
        || sheet
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
        || sheet.chars().next().is_some_and(|c| c.is_ascii_digit())
}
