//! Parsed formula references.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::addr::{sheet_needs_quoting, CellAddr};
use crate::coord::Coord;

/// The shape of a reference: one cell, or an inclusive rectangular range.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RefKind {
    Cell(Coord),
    Range(Coord, Coord),
}

impl RefKind {
    /// Number of cells covered (1 for a single cell).
    pub fn cell_count(self) -> u64 {
        match self {
            RefKind::Cell(_) => 1,
            RefKind::Range(start, end) => {
                let h = (end.row - start.row + 1) as u64;
                let w = (end.col - start.col + 1) as u64;
                h * w
            }
        }
    }
}

/// A reference extracted from a formula, resolved against its home sheet.
///
/// `workbook` is `Some` for external references (`[Book2.xlsx]Sheet!A1`);
/// those are surfaced as drill-down boundaries and never resolved further.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CellRef {
    pub sheet: String,
    pub kind: RefKind,
    pub workbook: Option<String>,
    pub cross_sheet: bool,
}

impl CellRef {
    pub fn cell(sheet: impl Into<String>, coord: Coord) -> Self {
        CellRef {
            sheet: sheet.into(),
            kind: RefKind::Cell(coord),
            workbook: None,
            cross_sheet: false,
        }
    }

    pub fn range(sheet: impl Into<String>, start: Coord, end: Coord) -> Self {
        CellRef {
            sheet: sheet.into(),
            kind: RefKind::Range(start, end),
            workbook: None,
            cross_sheet: false,
        }
    }

    pub fn is_external(&self) -> bool {
        self.workbook.is_some()
    }

    pub fn is_range(&self) -> bool {
        matches!(self.kind, RefKind::Range(..))
    }

    /// The address of a single-cell reference, if it is one.
    pub fn addr(&self) -> Option<CellAddr> {
        match self.kind {
            RefKind::Cell(coord) => Some(CellAddr::new(self.sheet.clone(), coord)),
            RefKind::Range(..) => None,
        }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quoted = sheet_needs_quoting(&self.sheet);
        match &self.workbook {
            Some(book) if quoted => write!(f, "'[{book}]{}'!", self.sheet.replace('\'', "''"))?,
            Some(book) => write!(f, "[{book}]{}!", self.sheet)?,
            None if quoted => write!(f, "'{}'!", self.sheet.replace('\'', "''"))?,
            None => write!(f, "{}!", self.sheet)?,
        }
        match self.kind {
            RefKind::Cell(coord) => write!(f, "{coord}"),
            RefKind::Range(start, end) => write!(f, "{start}:{end}"),
        }
    }
}
