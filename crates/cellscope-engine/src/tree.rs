//! Path-scoped dependency trees.
//!
//! A spreadsheet's dependencies form a graph, but the drill-down UI needs
//! independent expand/collapse state for every occurrence of a cell, so the
//! tree is stored as a flat arena keyed by derived path identifiers: the same
//! physical cell reached down two branches gets two ids and two fully
//! independent nodes. Children are held as id lists; a parent link supports
//! the ancestor walk the cycle guard needs.

use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize, Serializer};

use cellscope_common::{CellAddr, CellRef, Coord, RefKind};
use cellscope_io::{CellSnapshot, WorkbookReader};
use cellscope_parse::extract_references;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// Identity of one node occurrence, derived from the full ancestor chain.
///
/// Serialized as a hex string: path ids ride through JSON untouched, and a
/// 64-bit integer would not survive a JavaScript round-trip.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PathId(u64);

impl PathId {
    const ROOT_PARENT: PathId = PathId(0);

    /// FNV-1a over the parent id, the cell, and the sibling slot. Two
    /// expansion paths reaching the same cell therefore never share an id.
    fn derive(parent: PathId, sheet: &str, coord: Coord, sibling: usize) -> PathId {
        const FNV_OFFSET: u64 = 0xcbf29ce484222325;
        const FNV_PRIME: u64 = 0x100000001b3;
        let mut hash = FNV_OFFSET;
        let mut eat = |bytes: &[u8]| {
            for b in bytes {
                hash ^= u64::from(*b);
                hash = hash.wrapping_mul(FNV_PRIME);
            }
        };
        eat(&parent.0.to_le_bytes());
        eat(sheet.as_bytes());
        eat(&coord.row.to_le_bytes());
        eat(&coord.col.to_le_bytes());
        eat(&(sibling as u64).to_le_bytes());
        PathId(hash)
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for PathId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16).map(PathId)
    }
}

impl Serialize for PathId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PathId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Why a node is a deliberate expansion boundary.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeMarker {
    /// The cell already appears in this node's ancestor chain.
    Cycle,
    /// Reference into another workbook; never resolved.
    External,
    /// Range larger than the enumeration cap, collapsed to one node.
    RangeSummary,
}

/// One occurrence of a cell in one expansion path.
#[derive(Clone, Debug)]
pub struct DepNode {
    pub path_id: PathId,
    pub parent: Option<PathId>,
    pub reference: CellRef,
    pub value: Option<f64>,
    pub formula: Option<String>,
    pub is_leaf: bool,
    pub can_expand: bool,
    pub expanded: bool,
    pub children: Vec<PathId>,
    /// 1-based distance from the drill-down root; the root itself is 0.
    pub depth: u32,
    pub marker: Option<NodeMarker>,
}

impl DepNode {
    /// The single-cell address of this node, when it has one.
    pub fn addr(&self) -> Option<CellAddr> {
        if self.reference.is_external() {
            return None;
        }
        self.reference.addr()
    }
}

/// Arena of all materialized nodes for one session.
#[derive(Debug, Default)]
pub struct DependencyTree {
    nodes: FxHashMap<PathId, DepNode>,
    roots: FxHashMap<CellAddr, PathId>,
}

impl DependencyTree {
    pub fn node(&self, id: PathId) -> Option<&DepNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: PathId) -> Option<&mut DepNode> {
        self.nodes.get_mut(&id)
    }

    /// Drill into `addr`: (re)build the root node and its first level.
    /// Returns the root id and the first-level child ids. A repeat drill of
    /// the same cell discards the previous subtree for that root.
    pub fn drill_down<B: WorkbookReader>(
        &mut self,
        reader: &mut B,
        sheets: &[String],
        config: &EngineConfig,
        addr: &CellAddr,
    ) -> EngineResult<(PathId, Vec<PathId>)> {
        let snapshot = read_cell(reader, sheets, &addr.sheet, addr.coord)?;
        let (value, formula) = split_snapshot(snapshot);

        let root_id = PathId::derive(PathId::ROOT_PARENT, &addr.sheet, addr.coord, 0);
        let mut root = DepNode {
            path_id: root_id,
            parent: None,
            reference: CellRef::cell(addr.sheet.clone(), addr.coord),
            value,
            formula: formula.clone(),
            is_leaf: formula.is_none(),
            can_expand: false,
            expanded: false,
            children: Vec::new(),
            depth: 0,
            marker: None,
        };

        let children = match &formula {
            Some(text) => self.build_children(
                reader,
                sheets,
                config,
                root_id,
                &addr.sheet,
                0,
                text,
                &[addr.clone()],
            )?,
            None => Vec::new(),
        };

        // All reads succeeded; only now replace whatever was there before.
        if let Some(old_root) = self.roots.remove(addr) {
            self.remove_subtree(old_root);
        }
        let child_ids: Vec<PathId> = children.iter().map(|n| n.path_id).collect();
        root.children = child_ids.clone();
        root.expanded = !child_ids.is_empty();
        self.nodes.insert(root_id, root);
        for child in children {
            self.nodes.insert(child.path_id, child);
        }
        self.roots.insert(addr.clone(), root_id);
        Ok((root_id, child_ids))
    }

    /// Expand one already-materialized node. Children fetched earlier are
    /// reused without touching the reader; a failed build leaves the node
    /// exactly as it was.
    pub fn expand<B: WorkbookReader>(
        &mut self,
        reader: &mut B,
        sheets: &[String],
        config: &EngineConfig,
        id: PathId,
    ) -> EngineResult<Vec<PathId>> {
        let node = self.nodes.get(&id).ok_or(EngineError::NodeNotFound)?;
        if !node.can_expand {
            return Ok(Vec::new());
        }
        if !node.children.is_empty() {
            let ids = node.children.clone();
            self.nodes
                .get_mut(&id)
                .expect("node just looked up")
                .expanded = true;
            return Ok(ids);
        }

        let formula = match node.formula.clone() {
            Some(f) => f,
            None => return Ok(Vec::new()),
        };
        let sheet = node.reference.sheet.clone();
        let depth = node.depth;
        let ancestors = self.ancestor_addrs(id);

        let children =
            self.build_children(reader, sheets, config, id, &sheet, depth, &formula, &ancestors)?;

        let child_ids: Vec<PathId> = children.iter().map(|n| n.path_id).collect();
        for child in children {
            self.nodes.insert(child.path_id, child);
        }
        let node = self.nodes.get_mut(&id).expect("node just looked up");
        node.children = child_ids.clone();
        node.expanded = true;
        Ok(child_ids)
    }

    /// Collapse is non-destructive: children stay in the arena for instant
    /// re-expansion.
    pub fn collapse(&mut self, id: PathId) -> EngineResult<()> {
        let node = self.nodes.get_mut(&id).ok_or(EngineError::NodeNotFound)?;
        node.expanded = false;
        Ok(())
    }

    /// Single-cell addresses along the path from `id` up to its root,
    /// including `id` itself.
    fn ancestor_addrs(&self, id: PathId) -> Vec<CellAddr> {
        let mut out = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(node) = self.nodes.get(&current) else {
                break;
            };
            if let Some(addr) = node.addr() {
                out.push(addr);
            }
            cursor = node.parent;
        }
        out
    }

    fn remove_subtree(&mut self, id: PathId) {
        if let Some(node) = self.nodes.remove(&id) {
            for child in node.children {
                self.remove_subtree(child);
            }
        }
    }

    /// Materialize the child nodes one formula produces, in extraction order.
    /// Pure with respect to the arena: nothing is attached here, so a
    /// mid-build failure cannot leave a half-expanded node behind.
    #[allow(clippy::too_many_arguments)]
    fn build_children<B: WorkbookReader>(
        &self,
        reader: &mut B,
        sheets: &[String],
        config: &EngineConfig,
        parent_id: PathId,
        parent_sheet: &str,
        parent_depth: u32,
        formula: &str,
        ancestors: &[CellAddr],
    ) -> EngineResult<Vec<DepNode>> {
        let references = extract_references(formula, parent_sheet);
        let child_depth = parent_depth + 1;
        let mut children = Vec::new();
        let mut sibling = 0usize;

        for reference in references {
            if reference.is_external() {
                // Deliberate boundary: another workbook, value unobtainable
                // through this handle.
                children.push(boundary_node(
                    PathId::derive(parent_id, &reference.sheet, ref_anchor(&reference), sibling),
                    parent_id,
                    reference,
                    child_depth,
                    NodeMarker::External,
                ));
                sibling += 1;
                continue;
            }

            match reference.kind {
                RefKind::Range(start, end) => {
                    if reference.kind.cell_count() > config.range_enumeration_cap {
                        children.push(boundary_node(
                            PathId::derive(parent_id, &reference.sheet, start, sibling),
                            parent_id,
                            reference,
                            child_depth,
                            NodeMarker::RangeSummary,
                        ));
                        sibling += 1;
                        continue;
                    }
                    // Enumerate row-major; cells the workbook never populated
                    // are skipped rather than shown as empty leaves.
                    for row in start.row..=end.row {
                        for col in start.col..=end.col {
                            let coord = Coord::new(row, col);
                            let snapshot =
                                read_cell(reader, sheets, &reference.sheet, coord)?;
                            if snapshot.is_none() {
                                continue;
                            }
                            let mut cell_ref = CellRef::cell(reference.sheet.clone(), coord);
                            cell_ref.cross_sheet = reference.cross_sheet;
                            children.push(self.cell_node(
                                config,
                                parent_id,
                                cell_ref,
                                snapshot,
                                child_depth,
                                sibling,
                                ancestors,
                            ));
                            sibling += 1;
                        }
                    }
                }
                RefKind::Cell(coord) => {
                    let snapshot = read_cell(reader, sheets, &reference.sheet, coord)?;
                    children.push(self.cell_node(
                        config,
                        parent_id,
                        reference,
                        snapshot,
                        child_depth,
                        sibling,
                        ancestors,
                    ));
                    sibling += 1;
                }
            }
        }
        Ok(children)
    }

    #[allow(clippy::too_many_arguments)]
    fn cell_node(
        &self,
        config: &EngineConfig,
        parent_id: PathId,
        reference: CellRef,
        snapshot: Option<CellSnapshot>,
        depth: u32,
        sibling: usize,
        ancestors: &[CellAddr],
    ) -> DepNode {
        let coord = match reference.kind {
            RefKind::Cell(coord) => coord,
            RefKind::Range(start, _) => start,
        };
        let path_id = PathId::derive(parent_id, &reference.sheet, coord, sibling);
        let (value, formula) = split_snapshot(snapshot);

        let addr = CellAddr::new(reference.sheet.clone(), coord);
        if ancestors.contains(&addr) {
            return DepNode {
                path_id,
                parent: Some(parent_id),
                reference,
                value,
                formula,
                is_leaf: true,
                can_expand: false,
                expanded: false,
                children: Vec::new(),
                depth,
                marker: Some(NodeMarker::Cycle),
            };
        }

        let is_leaf = formula.is_none();
        let can_expand = formula.is_some() && depth < config.max_depth;
        DepNode {
            path_id,
            parent: Some(parent_id),
            reference,
            value,
            formula,
            is_leaf,
            can_expand,
            expanded: false,
            children: Vec::new(),
            depth,
            marker: None,
        }
    }
}

fn boundary_node(
    path_id: PathId,
    parent_id: PathId,
    reference: CellRef,
    depth: u32,
    marker: NodeMarker,
) -> DepNode {
    DepNode {
        path_id,
        parent: Some(parent_id),
        reference,
        value: None,
        formula: None,
        is_leaf: true,
        can_expand: false,
        expanded: false,
        children: Vec::new(),
        depth,
        marker: Some(marker),
    }
}

fn ref_anchor(reference: &CellRef) -> Coord {
    match reference.kind {
        RefKind::Cell(coord) => coord,
        RefKind::Range(start, _) => start,
    }
}

fn split_snapshot(snapshot: Option<CellSnapshot>) -> (Option<f64>, Option<String>) {
    match snapshot {
        Some(snapshot) => (snapshot.value.as_number(), snapshot.formula),
        None => (None, None),
    }
}

/// Read one cell. A sheet the workbook does not have is "no data" for a
/// dependency node, not a failure; real reader errors mean the workbook
/// handle is gone.
fn read_cell<B: WorkbookReader>(
    reader: &mut B,
    sheets: &[String],
    sheet: &str,
    coord: Coord,
) -> EngineResult<Option<CellSnapshot>> {
    if !sheets.iter().any(|s| s == sheet) {
        return Ok(None);
    }
    reader
        .cell(sheet, coord)
        .map_err(|e| EngineError::WorkbookUnreadable(e.to_string()))
}
