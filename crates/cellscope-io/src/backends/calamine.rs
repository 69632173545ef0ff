#![cfg(feature = "calamine")]

//! XLSX backend over calamine.
//!
//! Calamine reads a sheet at a time, so the adapter materializes each sheet
//! into a cell map on first access and serves random-access reads from that
//! cache for the rest of the workbook's life.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use rustc_hash::FxHashMap;

use cellscope_common::{CellValue, Coord};

use crate::error::IoError;
use crate::traits::{CellSnapshot, WorkbookReader};

struct SheetCache {
    cells: FxHashMap<Coord, CellSnapshot>,
    bounds: Option<(u32, u32)>,
}

pub struct XlsxWorkbook {
    workbook: Xlsx<BufReader<File>>,
    names: Vec<String>,
    cache: FxHashMap<String, SheetCache>,
}

impl XlsxWorkbook {
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, IoError> {
        let workbook: Xlsx<BufReader<File>> =
            open_workbook(&path).map_err(|e: calamine::XlsxError| IoError::Open(e.to_string()))?;
        let names = workbook.sheet_names().to_vec();
        tracing::debug!(
            path = %path.as_ref().display(),
            sheets = names.len(),
            "opened xlsx workbook"
        );
        Ok(Self {
            workbook,
            names,
            cache: FxHashMap::default(),
        })
    }

    fn convert_value(data: &Data) -> CellValue {
        match data {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Int(*i),
            Data::Bool(b) => CellValue::Boolean(*b),
            Data::Error(e) => CellValue::Error(error_code(e).to_string()),
            // Excel serial number; the engine only needs the numeric view.
            Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
            Data::DateTimeIso(s) => CellValue::Text(s.clone()),
            Data::DurationIso(s) => CellValue::Text(s.clone()),
        }
    }

    fn build_cache(values: &Range<Data>, formulas: Option<&Range<String>>) -> SheetCache {
        let mut cells = FxHashMap::default();

        let (vr, vc) = values.start().unwrap_or_default();
        for (row, col, data) in values.used_cells() {
            let value = match data {
                Data::Empty => continue,
                Data::String(s) if s.is_empty() => continue,
                other => Self::convert_value(other),
            };
            // Calamine positions are 0-based relative to the range start.
            let Ok(coord) = Coord::try_new((row as u32) + vr + 1, (col as u32) + vc + 1) else {
                continue;
            };
            cells.insert(
                coord,
                CellSnapshot {
                    value,
                    formula: None,
                },
            );
        }

        if let Some(range) = formulas {
            let (fr, fc) = range.start().unwrap_or_default();
            for (row, col, formula) in range.used_cells() {
                if formula.is_empty() {
                    continue;
                }
                let Ok(coord) = Coord::try_new((row as u32) + fr + 1, (col as u32) + fc + 1)
                else {
                    continue;
                };
                let with_eq = if formula.starts_with('=') {
                    formula.clone()
                } else {
                    format!("={formula}")
                };
                cells
                    .entry(coord)
                    .and_modify(|snapshot| snapshot.formula = Some(with_eq.clone()))
                    .or_insert_with(|| CellSnapshot {
                        value: CellValue::Empty,
                        formula: Some(with_eq),
                    });
            }
        }

        let bounds = if values.is_empty() {
            None
        } else {
            Some((values.height() as u32, values.width() as u32))
        };
        SheetCache { cells, bounds }
    }

    fn ensure_loaded(&mut self, sheet: &str) -> Result<&SheetCache, IoError> {
        if !self.names.iter().any(|n| n == sheet) {
            return Err(IoError::SheetNotFound {
                sheet: sheet.to_string(),
            });
        }
        if !self.cache.contains_key(sheet) {
            let values = self
                .workbook
                .worksheet_range(sheet)
                .map_err(IoError::from_backend)?;
            let formulas = self.workbook.worksheet_formula(sheet).ok();
            let cache = Self::build_cache(&values, formulas.as_ref());
            tracing::debug!(
                sheet,
                cells = cache.cells.len(),
                "materialized sheet cache"
            );
            self.cache.insert(sheet.to_string(), cache);
        }
        Ok(&self.cache[sheet])
    }
}

impl WorkbookReader for XlsxWorkbook {
    type Error = IoError;

    fn sheet_names(&mut self) -> Result<Vec<String>, Self::Error> {
        Ok(self.names.clone())
    }

    fn cell(&mut self, sheet: &str, coord: Coord) -> Result<Option<CellSnapshot>, Self::Error> {
        let cache = self.ensure_loaded(sheet)?;
        Ok(cache.cells.get(&coord).cloned())
    }

    fn sheet_bounds(&mut self, sheet: &str) -> Result<Option<(u32, u32)>, Self::Error> {
        let cache = self.ensure_loaded(sheet)?;
        Ok(cache.bounds)
    }
}

fn error_code(e: &calamine::CellErrorType) -> &'static str {
    match e {
        calamine::CellErrorType::Div0 => "#DIV/0!",
        calamine::CellErrorType::NA => "#N/A",
        calamine::CellErrorType::Name => "#NAME?",
        calamine::CellErrorType::Null => "#NULL!",
        calamine::CellErrorType::Num => "#NUM!",
        calamine::CellErrorType::Ref => "#REF!",
        _ => "#VALUE!",
    }
}
