//! Progressive formula drill-down over an open workbook.
//!
//! The engine answers "why does this cell have this value": starting from a
//! user-chosen cell, each formula expands on demand into the cells it reads,
//! to unlimited depth, with per-path cycle guards and hard boundaries at
//! external workbooks. A layered naming system turns raw references into
//! human-readable labels from manual overrides, AI suggestions, and
//! configured row/column label sources. All state is scoped to explicit
//! sessions; nothing is global.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod naming;
pub mod session;
pub mod tree;

pub use analyzer::{Analyzer, CellInfo, DrillDown, NodeView, RowValue};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use naming::{
    AiStatus, AiSuggestion, NameMode, NameSource, NamingState, ResolvedName, SheetNamingConfig,
};
pub use session::{Session, SessionId, SessionMeta, SessionStore};
pub use tree::{DepNode, DependencyTree, NodeMarker, PathId};

// Re-export the building blocks callers wire together.
pub use cellscope_common::{CellAddr, CellRef, CellValue, Coord, RefKind};
pub use cellscope_io::{CellSnapshot, IoError, MemoryWorkbook, WorkbookReader};
pub use cellscope_parse::{classify, extract_references, Complexity, ComplexityReport};
