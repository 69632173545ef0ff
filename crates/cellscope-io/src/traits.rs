//! The workbook accessor seam.

use cellscope_common::{CellValue, Coord};

/// What a backend hands back for one populated cell: the cached calculated
/// value and the formula text, either of which may be absent.
#[derive(Clone, Debug, PartialEq)]
pub struct CellSnapshot {
    pub value: CellValue,
    pub formula: Option<String>,
}

impl CellSnapshot {
    pub fn from_value(value: CellValue) -> Self {
        CellSnapshot {
            value,
            formula: None,
        }
    }

    pub fn from_formula(formula: impl Into<String>) -> Self {
        CellSnapshot {
            value: CellValue::Empty,
            formula: Some(formula.into()),
        }
    }

    pub fn new(value: CellValue, formula: impl Into<String>) -> Self {
        CellSnapshot {
            value,
            formula: Some(formula.into()),
        }
    }
}

/// Read access to an open workbook.
///
/// Contract: `cell` returns `Ok(None)` for an ordinarily absent cell and
/// errors only for a sheet the workbook does not have or for true I/O
/// failure. Callers take `&mut self` because backends may populate per-sheet
/// caches on first access; serialization of concurrent readers is the
/// caller's concern (one session holds one reader behind one lock).
pub trait WorkbookReader: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    fn sheet_names(&mut self) -> Result<Vec<String>, Self::Error>;

    fn cell(&mut self, sheet: &str, coord: Coord) -> Result<Option<CellSnapshot>, Self::Error>;

    /// (rows, cols) of the used area, `None` for an empty sheet.
    fn sheet_bounds(&mut self, sheet: &str) -> Result<Option<(u32, u32)>, Self::Error>;

    fn cell_exists(&mut self, sheet: &str, coord: Coord) -> Result<bool, Self::Error> {
        Ok(self.cell(sheet, coord)?.is_some())
    }
}
