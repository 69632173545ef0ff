//! Layered cell naming.
//!
//! A display name comes from a fixed precedence chain, evaluated top-down per
//! mode. Sources are an explicit enum so the precedence rule is testable on
//! its own; resolution itself never fails: missing data degrades to the raw
//! reference string.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use cellscope_common::{letters_to_column, CellAddr, CellRef, Coord};
use cellscope_io::WorkbookReader;

/// Which naming strategy the caller wants.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameMode {
    /// Manual composition of context text and row/column labels.
    Component,
    /// Externally-supplied suggested names with manual-edit override.
    Generated,
}

/// Where a resolved name came from, highest precedence first per mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NameSource {
    Manual,
    ManualEdit,
    Ai,
    Component,
    ComponentFallback,
    Fallback,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiStatus {
    Success,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AiSuggestion {
    pub text: String,
    pub confidence: f64,
    pub status: AiStatus,
}

/// Per-sheet naming configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetNamingConfig {
    /// 1-based column whose cell in a node's row supplies the row label.
    pub label_column: Option<u32>,
    /// 1-based row whose cell in a node's column supplies the column label.
    pub label_row: Option<u32>,
}

/// Per-cell naming state, created lazily the first time configuration, AI
/// output, or resolution touches the cell.
#[derive(Clone, Debug, Default)]
pub struct CellNameOverride {
    pub context_text: Option<String>,
    pub manual_name: Option<String>,
    pub is_manually_edited: bool,
    pub ai: Option<AiSuggestion>,
    row_value_label: Option<String>,
    column_value_label: Option<String>,
    /// Distinguishes "labels computed, nothing there" from "not computed yet".
    labels_cached: bool,
}

/// A resolved display name.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedName {
    pub name: String,
    pub source: NameSource,
    /// Present only for `source == Ai`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// The pieces a component name was joined from, in join order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
}

impl ResolvedName {
    fn fallback(reference: &CellRef) -> Self {
        ResolvedName {
            name: reference.to_string(),
            source: NameSource::Fallback,
            confidence: None,
            components: Vec::new(),
        }
    }
}

/// All naming state for one session.
#[derive(Debug, Default)]
pub struct NamingState {
    configs: FxHashMap<String, SheetNamingConfig>,
    overrides: FxHashMap<CellAddr, CellNameOverride>,
}

impl NamingState {
    pub fn sheet_config(&self, sheet: &str) -> SheetNamingConfig {
        self.configs.get(sheet).copied().unwrap_or_default()
    }

    pub fn configs(&self) -> impl Iterator<Item = (&String, &SheetNamingConfig)> {
        self.configs.iter()
    }

    /// Set the label column for a sheet and drop every cached label derived
    /// from that sheet's previous configuration. Already-visible nodes pick
    /// the new labels up on their next resolution; no re-expansion needed.
    pub fn set_label_column(&mut self, sheet: &str, column: u32) {
        self.configs
            .entry(sheet.to_string())
            .or_default()
            .label_column = Some(column);
        self.invalidate_sheet_labels(sheet);
    }

    pub fn set_label_row(&mut self, sheet: &str, row: u32) {
        self.configs.entry(sheet.to_string()).or_default().label_row = Some(row);
        self.invalidate_sheet_labels(sheet);
    }

    fn invalidate_sheet_labels(&mut self, sheet: &str) {
        for (addr, entry) in self.overrides.iter_mut() {
            if addr.sheet == sheet {
                entry.row_value_label = None;
                entry.column_value_label = None;
                entry.labels_cached = false;
            }
        }
    }

    /// Scoped to exactly one cell; siblings keep their cached labels.
    pub fn set_context_text(&mut self, addr: CellAddr, text: &str) {
        let entry = self.overrides.entry(addr).or_default();
        entry.context_text = if text.trim().is_empty() {
            None
        } else {
            Some(text.trim().to_string())
        };
    }

    /// A manual name is terminal in component mode and, via the edit flag,
    /// wins generated mode too.
    pub fn set_manual_name(&mut self, addr: CellAddr, name: &str) {
        let entry = self.overrides.entry(addr).or_default();
        entry.manual_name = Some(name.trim().to_string());
        entry.is_manually_edited = true;
    }

    pub fn record_ai_suggestion(&mut self, addr: CellAddr, suggestion: AiSuggestion) {
        self.overrides.entry(addr).or_default().ai = Some(suggestion);
    }

    /// Cells of a sheet that already carry an AI suggestion or a manual edit.
    pub fn ai_processed_cells(&self, sheet: &str) -> Vec<String> {
        let mut cells: Vec<String> = self
            .overrides
            .iter()
            .filter(|(addr, entry)| {
                addr.sheet == sheet && (entry.ai.is_some() || entry.is_manually_edited)
            })
            .map(|(addr, _)| addr.to_string())
            .collect();
        cells.sort();
        cells
    }

    /// Resolve a display name. Reader failures while fetching labels degrade
    /// to "no label"; this function never errors.
    pub fn resolve<B: WorkbookReader>(
        &mut self,
        reader: &mut B,
        sheets: &[String],
        reference: &CellRef,
        mode: NameMode,
    ) -> ResolvedName {
        let Some(addr) = (!reference.is_external())
            .then(|| reference.addr())
            .flatten()
        else {
            // Ranges and external references only ever fall back.
            return ResolvedName::fallback(reference);
        };

        self.ensure_labels(reader, sheets, &addr);
        let untouched = CellNameOverride::default();
        let entry = self.overrides.get(&addr).unwrap_or(&untouched);

        match mode {
            NameMode::Component => component_name(entry, reference),
            NameMode::Generated => {
                if entry.is_manually_edited {
                    if let Some(name) = &entry.manual_name {
                        return ResolvedName {
                            name: name.clone(),
                            source: NameSource::ManualEdit,
                            confidence: None,
                            components: Vec::new(),
                        };
                    }
                }
                if let Some(ai) = &entry.ai {
                    if ai.status == AiStatus::Success {
                        return ResolvedName {
                            name: ai.text.clone(),
                            source: NameSource::Ai,
                            confidence: Some(ai.confidence),
                            components: Vec::new(),
                        };
                    }
                }
                let mut resolved = component_name(entry, reference);
                if resolved.source == NameSource::Component {
                    resolved.source = NameSource::ComponentFallback;
                }
                resolved
            }
        }
    }

    /// Compute and cache the row/column value labels for one cell, once per
    /// configuration epoch.
    fn ensure_labels<B: WorkbookReader>(
        &mut self,
        reader: &mut B,
        sheets: &[String],
        addr: &CellAddr,
    ) {
        let config = self.sheet_config(&addr.sheet);
        if config.label_column.is_none() && config.label_row.is_none() {
            return;
        }
        let cached = self
            .overrides
            .get(addr)
            .map(|e| e.labels_cached)
            .unwrap_or(false);
        if cached {
            return;
        }

        let row_label = config
            .label_column
            .and_then(|col| read_label(reader, sheets, &addr.sheet, addr.coord.row, col));
        let column_label = config
            .label_row
            .and_then(|row| read_label(reader, sheets, &addr.sheet, row, addr.coord.col));

        let entry = self.overrides.entry(addr.clone()).or_default();
        entry.row_value_label = row_label;
        entry.column_value_label = column_label;
        entry.labels_cached = true;
    }
}

fn component_name(entry: &CellNameOverride, reference: &CellRef) -> ResolvedName {
    if let Some(name) = &entry.manual_name {
        return ResolvedName {
            name: name.clone(),
            source: NameSource::Manual,
            confidence: None,
            components: Vec::new(),
        };
    }
    let components: Vec<String> = [
        entry.context_text.as_deref(),
        entry.row_value_label.as_deref(),
        entry.column_value_label.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::to_string)
    .collect();
    if components.is_empty() {
        return ResolvedName::fallback(reference);
    }
    ResolvedName {
        name: components.join(" "),
        source: NameSource::Component,
        confidence: None,
        components,
    }
}

fn read_label<B: WorkbookReader>(
    reader: &mut B,
    sheets: &[String],
    sheet: &str,
    row: u32,
    col: u32,
) -> Option<String> {
    if !sheets.iter().any(|s| s == sheet) {
        return None;
    }
    let coord = Coord::try_new(row, col).ok()?;
    match reader.cell(sheet, coord) {
        Ok(Some(snapshot)) => snapshot.value.label_text(),
        Ok(None) => None,
        Err(_) => None,
    }
}

/// Parse a column letter for configuration input.
pub fn parse_label_column(letters: &str) -> Option<u32> {
    letters_to_column(letters.trim())
}
