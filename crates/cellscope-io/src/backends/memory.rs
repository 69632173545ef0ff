//! In-memory workbook backend.
//!
//! Backs the engine's test suites and any caller that already has cell data
//! in hand. Sheets are registered in insertion order.

use rustc_hash::FxHashMap;

use cellscope_common::{CellValue, Coord};

use crate::error::IoError;
use crate::traits::{CellSnapshot, WorkbookReader};

#[derive(Debug, Default)]
pub struct MemoryWorkbook {
    sheets: Vec<String>,
    cells: FxHashMap<(usize, Coord), CellSnapshot>,
}

impl MemoryWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sheet (idempotent) and return its slot.
    pub fn add_sheet(&mut self, name: &str) -> usize {
        if let Some(idx) = self.sheets.iter().position(|s| s == name) {
            return idx;
        }
        self.sheets.push(name.to_string());
        self.sheets.len() - 1
    }

    /// Store a plain value. Addresses are `A1`-style; like the other
    /// builders this panics on malformed input, since it only ever runs on
    /// literal fixture data.
    pub fn set_value(&mut self, sheet: &str, address: &str, value: CellValue) -> &mut Self {
        let snapshot = CellSnapshot::from_value(value);
        self.put(sheet, address, snapshot)
    }

    /// Store a formula cell together with its cached value, the way an XLSX
    /// file carries both.
    pub fn set_formula(
        &mut self,
        sheet: &str,
        address: &str,
        formula: &str,
        cached: CellValue,
    ) -> &mut Self {
        let snapshot = CellSnapshot::new(cached, formula);
        self.put(sheet, address, snapshot)
    }

    fn put(&mut self, sheet: &str, address: &str, snapshot: CellSnapshot) -> &mut Self {
        let idx = self.add_sheet(sheet);
        let coord = Coord::parse_a1(address).expect("valid test address");
        self.cells.insert((idx, coord), snapshot);
        self
    }

    fn sheet_index(&self, sheet: &str) -> Result<usize, IoError> {
        self.sheets
            .iter()
            .position(|s| s == sheet)
            .ok_or_else(|| IoError::SheetNotFound {
                sheet: sheet.to_string(),
            })
    }
}

impl WorkbookReader for MemoryWorkbook {
    type Error = IoError;

    fn sheet_names(&mut self) -> Result<Vec<String>, Self::Error> {
        Ok(self.sheets.clone())
    }

    fn cell(&mut self, sheet: &str, coord: Coord) -> Result<Option<CellSnapshot>, Self::Error> {
        let idx = self.sheet_index(sheet)?;
        Ok(self.cells.get(&(idx, coord)).cloned())
    }

    fn sheet_bounds(&mut self, sheet: &str) -> Result<Option<(u32, u32)>, Self::Error> {
        let idx = self.sheet_index(sheet)?;
        let mut bounds = None;
        for ((s, coord), _) in self.cells.iter() {
            if *s != idx {
                continue;
            }
            let (rows, cols) = bounds.unwrap_or((0, 0));
            bounds = Some((rows.max(coord.row), cols.max(coord.col)));
        }
        Ok(bounds)
    }
}
