//! The operations surface consumed by the transport layer.
//!
//! Every call resolves its session, takes that session's mutex, and works on
//! the session-scoped state; there is no ambient configuration anywhere.
//! Nodes returned to callers are decorated with display names resolved in
//! generated mode, which falls through to component names and the raw
//! reference when nothing richer exists.

use std::collections::BTreeMap;

use serde::Serialize;

use cellscope_common::{split_sheet_prefix, CellAddr, CellValue, Coord};
use cellscope_io::WorkbookReader;
use cellscope_parse::{classify, Complexity};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::naming::{
    parse_label_column, AiStatus, AiSuggestion, NameMode, NamingState, ResolvedName,
    SheetNamingConfig,
};
use crate::session::{SessionId, SessionInner, SessionMeta, SessionStore};
use crate::tree::{DependencyTree, NodeMarker, PathId};

/// Basic cell facts plus advisory complexity, for the cell the user is
/// looking at before any drill-down.
#[derive(Clone, Debug, Serialize)]
pub struct CellInfo {
    pub sheet: String,
    pub address: String,
    pub value: Option<f64>,
    pub formula: Option<String>,
    pub can_drill_down: bool,
    pub complexity: Complexity,
    pub has_external_refs: bool,
    pub has_cross_sheet_refs: bool,
}

/// One dependency node as callers see it.
#[derive(Clone, Debug, Serialize)]
pub struct NodeView {
    pub path_id: PathId,
    pub cell_reference: String,
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    pub is_leaf: bool,
    pub can_expand: bool,
    pub expanded: bool,
    pub depth: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<NodeMarker>,
    pub name: ResolvedName,
}

/// First-level drill-down of a user-chosen root.
#[derive(Clone, Debug, Serialize)]
pub struct DrillDown {
    pub source_cell: String,
    pub source_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_formula: Option<String>,
    pub dependencies: Vec<NodeView>,
}

/// One populated cell of a row, for the label-column chooser.
#[derive(Clone, Debug, Serialize)]
pub struct RowValue {
    pub column: String,
    pub value: String,
}

pub struct Analyzer<B: WorkbookReader> {
    store: SessionStore<B>,
    config: EngineConfig,
}

impl<B: WorkbookReader> Default for Analyzer<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: WorkbookReader> Analyzer<B> {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Analyzer {
            store: SessionStore::new(),
            config,
        }
    }

    /* ─────────────────────────── sessions ─────────────────────────── */

    pub fn open_session(&self, reader: B) -> EngineResult<SessionId> {
        let id = self.store.open(reader)?;
        tracing::info!(session = %id, "session opened");
        Ok(id)
    }

    pub fn close_session(&self, id: SessionId) -> EngineResult<()> {
        self.store.close(id)?;
        tracing::info!(session = %id, "session closed");
        Ok(())
    }

    pub fn session_meta(&self, id: SessionId) -> EngineResult<SessionMeta> {
        Ok(self.store.get(id)?.meta.clone())
    }

    pub fn sheet_names(&self, id: SessionId) -> EngineResult<Vec<String>> {
        let session = self.store.get(id)?;
        let inner = session.inner.lock();
        Ok(inner.sheets.clone())
    }

    /* ─────────────────────────── analysis ─────────────────────────── */

    pub fn inspect(&self, id: SessionId, sheet: &str, address: &str) -> EngineResult<CellInfo> {
        let session = self.store.get(id)?;
        let mut guard = session.inner.lock();
        let inner = &mut *guard;
        require_sheet(&inner.sheets, sheet)?;
        let coord = parse_address(address)?;

        let snapshot = inner
            .reader
            .cell(sheet, coord)
            .map_err(|e| EngineError::WorkbookUnreadable(e.to_string()))?;
        let (value, formula) = match snapshot {
            Some(s) => (s.value.as_number(), s.formula),
            None => (None, None),
        };

        let info = match &formula {
            Some(text) => {
                let report = classify(text, sheet);
                CellInfo {
                    sheet: sheet.to_string(),
                    address: coord.to_string(),
                    value,
                    formula: formula.clone(),
                    can_drill_down: report.can_drill_down,
                    complexity: report.complexity,
                    has_external_refs: report.has_external,
                    has_cross_sheet_refs: report.has_cross_sheet,
                }
            }
            None => CellInfo {
                sheet: sheet.to_string(),
                address: coord.to_string(),
                value,
                formula: None,
                can_drill_down: false,
                complexity: Complexity::Simple,
                has_external_refs: false,
                has_cross_sheet_refs: false,
            },
        };
        Ok(info)
    }

    /// First-level expansion of a user-chosen root. Re-drilling the same cell
    /// rebuilds its subtree from scratch.
    pub fn drill_down(&self, id: SessionId, sheet: &str, address: &str) -> EngineResult<DrillDown> {
        let session = self.store.get(id)?;
        let mut guard = session.inner.lock();
        let inner = &mut *guard;
        require_sheet(&inner.sheets, sheet)?;
        let coord = parse_address(address)?;
        let addr = CellAddr::new(sheet, coord);

        let SessionInner {
            reader,
            sheets,
            naming,
            tree,
        } = inner;
        let sheets = sheets.as_slice();
        let (root_id, child_ids) = tree.drill_down(reader, sheets, &self.config, &addr)?;
        tracing::debug!(session = %id, cell = %addr, children = child_ids.len(), "drill-down");

        let root = tree.node(root_id).ok_or(EngineError::NodeNotFound)?;
        let (source_value, source_formula) = (root.value, root.formula.clone());
        let dependencies = child_ids
            .iter()
            .filter_map(|&child| node_view(tree, naming, reader, sheets, child))
            .collect();

        Ok(DrillDown {
            source_cell: addr.to_string(),
            source_value,
            source_formula,
            dependencies,
        })
    }

    /// Expand one already-visible node. The sheet/address pair must match the
    /// node the path id names, which guards against a stale UI expanding a
    /// node from a rebuilt tree.
    pub fn expand(
        &self,
        id: SessionId,
        sheet: &str,
        address: &str,
        path_id: PathId,
    ) -> EngineResult<Vec<NodeView>> {
        let session = self.store.get(id)?;
        let mut guard = session.inner.lock();
        let inner = &mut *guard;
        require_sheet(&inner.sheets, sheet)?;
        let coord = parse_address(address)?;
        let addr = CellAddr::new(sheet, coord);

        let SessionInner {
            reader,
            sheets,
            naming,
            tree,
        } = inner;
        let sheets = sheets.as_slice();
        let node = tree.node(path_id).ok_or(EngineError::NodeNotFound)?;
        if node.addr().as_ref() != Some(&addr) {
            return Err(EngineError::NodeNotFound);
        }

        let child_ids = tree.expand(reader, sheets, &self.config, path_id)?;
        tracing::debug!(session = %id, cell = %addr, children = child_ids.len(), "expand");
        Ok(child_ids
            .iter()
            .filter_map(|&child| node_view(tree, naming, reader, sheets, child))
            .collect())
    }

    /// Reversible and non-destructive; the children stay materialized.
    pub fn collapse(&self, id: SessionId, path_id: PathId) -> EngineResult<()> {
        let session = self.store.get(id)?;
        let mut guard = session.inner.lock();
        guard.tree.collapse(path_id)
    }

    /* ─────────────────────────── naming ───────────────────────────── */

    pub fn configure_sheet_label_column(
        &self,
        id: SessionId,
        sheet: &str,
        column: &str,
    ) -> EngineResult<()> {
        let session = self.store.get(id)?;
        let mut guard = session.inner.lock();
        let inner = &mut *guard;
        require_sheet(&inner.sheets, sheet)?;
        let col = parse_label_column(column).ok_or_else(|| {
            EngineError::InvalidConfiguration(format!("'{column}' is not a column"))
        })?;
        let bounds = sheet_bounds(&mut inner.reader, sheet)?;
        match bounds {
            Some((_, cols)) if col <= cols => {}
            _ => {
                return Err(EngineError::InvalidConfiguration(format!(
                    "column {column} is outside the used area of '{sheet}'"
                )));
            }
        }
        inner.naming.set_label_column(sheet, col);
        tracing::info!(session = %id, sheet, column = col, "label column configured");
        Ok(())
    }

    pub fn configure_sheet_label_row(
        &self,
        id: SessionId,
        sheet: &str,
        row: u32,
    ) -> EngineResult<()> {
        let session = self.store.get(id)?;
        let mut guard = session.inner.lock();
        let inner = &mut *guard;
        require_sheet(&inner.sheets, sheet)?;
        let bounds = sheet_bounds(&mut inner.reader, sheet)?;
        match bounds {
            Some((rows, _)) if row >= 1 && row <= rows => {}
            _ => {
                return Err(EngineError::InvalidConfiguration(format!(
                    "row {row} is outside the used area of '{sheet}'"
                )));
            }
        }
        inner.naming.set_label_row(sheet, row);
        tracing::info!(session = %id, sheet, row, "label row configured");
        Ok(())
    }

    pub fn naming_config(
        &self,
        id: SessionId,
    ) -> EngineResult<BTreeMap<String, SheetNamingConfig>> {
        let session = self.store.get(id)?;
        let guard = session.inner.lock();
        Ok(guard
            .naming
            .configs()
            .map(|(sheet, config)| (sheet.clone(), *config))
            .collect())
    }

    pub fn set_context_text(
        &self,
        id: SessionId,
        sheet: &str,
        address: &str,
        text: &str,
    ) -> EngineResult<()> {
        let session = self.store.get(id)?;
        let mut guard = session.inner.lock();
        let inner = &mut *guard;
        let addr = require_cell(inner, sheet, address)?;
        inner.naming.set_context_text(addr, text);
        Ok(())
    }

    pub fn set_manual_name(
        &self,
        id: SessionId,
        sheet: &str,
        address: &str,
        name: &str,
    ) -> EngineResult<()> {
        let session = self.store.get(id)?;
        let mut guard = session.inner.lock();
        let inner = &mut *guard;
        let addr = require_cell(inner, sheet, address)?;
        inner.naming.set_manual_name(addr, name);
        Ok(())
    }

    /// Bulk re-resolution, typically after a configuration change. Input
    /// strings that do not parse as sheet-qualified cell addresses resolve to
    /// themselves at the fallback tier, since resolution never fails.
    pub fn resolve_names(
        &self,
        id: SessionId,
        references: &[String],
        mode: NameMode,
    ) -> EngineResult<BTreeMap<String, ResolvedName>> {
        let session = self.store.get(id)?;
        let mut guard = session.inner.lock();
        let SessionInner {
            reader,
            sheets,
            naming,
            ..
        } = &mut *guard;
        let sheets = sheets.as_slice();

        let mut out = BTreeMap::new();
        for raw in references {
            let resolved = match parse_qualified(raw) {
                Some(addr) => {
                    let reference = cellscope_common::CellRef::cell(addr.sheet, addr.coord);
                    naming.resolve(reader, sheets, &reference, mode)
                }
                None => ResolvedName {
                    name: raw.clone(),
                    source: crate::naming::NameSource::Fallback,
                    confidence: None,
                    components: Vec::new(),
                },
            };
            out.insert(raw.clone(), resolved);
        }
        Ok(out)
    }

    /// Ingestion point for externally-computed AI names; the AI call itself
    /// lives outside the engine.
    pub fn record_ai_suggestion(
        &self,
        id: SessionId,
        cell_ref: &str,
        suggestion: &str,
        confidence: f64,
        status: AiStatus,
    ) -> EngineResult<()> {
        let session = self.store.get(id)?;
        let mut guard = session.inner.lock();
        let addr = parse_qualified(cell_ref).ok_or_else(|| EngineError::InvalidAddress {
            address: cell_ref.to_string(),
        })?;
        require_sheet(&guard.sheets, &addr.sheet)?;
        guard.naming.record_ai_suggestion(
            addr,
            AiSuggestion {
                text: suggestion.to_string(),
                confidence,
                status,
            },
        );
        Ok(())
    }

    pub fn ai_processed_cells(&self, id: SessionId, sheet: &str) -> EngineResult<Vec<String>> {
        let session = self.store.get(id)?;
        let guard = session.inner.lock();
        require_sheet(&guard.sheets, sheet)?;
        Ok(guard.naming.ai_processed_cells(sheet))
    }

    /// Populated cells of one row, for picking a label column in the UI.
    pub fn row_values(&self, id: SessionId, sheet: &str, row: u32) -> EngineResult<Vec<RowValue>> {
        let session = self.store.get(id)?;
        let mut guard = session.inner.lock();
        let inner = &mut *guard;
        require_sheet(&inner.sheets, sheet)?;
        if row == 0 {
            return Err(EngineError::InvalidAddress {
                address: format!("row {row}"),
            });
        }

        let Some((rows, cols)) = sheet_bounds(&mut inner.reader, sheet)? else {
            return Ok(Vec::new());
        };
        if row > rows {
            return Ok(Vec::new());
        }

        let mut values = Vec::new();
        for col in 1..=cols {
            if values.len() >= self.config.row_values_cap {
                break;
            }
            let snapshot = inner
                .reader
                .cell(sheet, Coord::new(row, col))
                .map_err(|e| EngineError::WorkbookUnreadable(e.to_string()))?;
            let Some(snapshot) = snapshot else { continue };
            if matches!(snapshot.value, CellValue::Empty) {
                continue;
            }
            values.push(RowValue {
                column: cellscope_common::column_to_letters(col),
                value: snapshot.value.to_string(),
            });
        }
        Ok(values)
    }
}

/* ───────────────────────────── helpers ────────────────────────────── */

fn node_view<B: WorkbookReader>(
    tree: &DependencyTree,
    naming: &mut NamingState,
    reader: &mut B,
    sheets: &[String],
    id: PathId,
) -> Option<NodeView> {
    let node = tree.node(id)?;
    let name = naming.resolve(reader, sheets, &node.reference, NameMode::Generated);
    Some(NodeView {
        path_id: node.path_id,
        cell_reference: node.reference.to_string(),
        value: node.value,
        formula: node.formula.clone(),
        is_leaf: node.is_leaf,
        can_expand: node.can_expand,
        expanded: node.expanded,
        depth: node.depth,
        marker: node.marker,
        name,
    })
}

/// Per-cell overrides only attach to cells the workbook actually has;
/// naming something that is not there is a caller mistake, not "no data".
fn require_cell<B: WorkbookReader>(
    inner: &mut SessionInner<B>,
    sheet: &str,
    address: &str,
) -> EngineResult<CellAddr> {
    require_sheet(&inner.sheets, sheet)?;
    let coord = parse_address(address)?;
    let exists = inner
        .reader
        .cell_exists(sheet, coord)
        .map_err(|e| EngineError::WorkbookUnreadable(e.to_string()))?;
    if !exists {
        return Err(EngineError::CellNotFound {
            sheet: sheet.to_string(),
            address: coord.to_string(),
        });
    }
    Ok(CellAddr::new(sheet, coord))
}

fn require_sheet(sheets: &[String], sheet: &str) -> EngineResult<()> {
    if sheets.iter().any(|s| s == sheet) {
        Ok(())
    } else {
        Err(EngineError::SheetNotFound {
            sheet: sheet.to_string(),
        })
    }
}

fn parse_address(address: &str) -> EngineResult<Coord> {
    Coord::parse_a1(address.trim()).map_err(|_| EngineError::InvalidAddress {
        address: address.to_string(),
    })
}

/// Parse a sheet-qualified cell reference string (`Sheet1!B5`, `'P&L'!A1`).
fn parse_qualified(text: &str) -> Option<CellAddr> {
    let (sheet, cell) = split_sheet_prefix(text.trim())?;
    let coord = Coord::parse_a1(cell).ok()?;
    Some(CellAddr::new(sheet, coord))
}

fn sheet_bounds<B: WorkbookReader>(
    reader: &mut B,
    sheet: &str,
) -> EngineResult<Option<(u32, u32)>> {
    reader
        .sheet_bounds(sheet)
        .map_err(|e| EngineError::WorkbookUnreadable(e.to_string()))
}
