//! Engine error taxonomy.
//!
//! Only conditions a caller must react to are errors. Cycles, external
//! references, and oversized ranges are deliberate expansion boundaries and
//! travel as node markers instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("session not found")]
    SessionNotFound,

    #[error("sheet '{sheet}' not found in workbook")]
    SheetNotFound { sheet: String },

    #[error("cell {address} not found on sheet '{sheet}'")]
    CellNotFound { sheet: String, address: String },

    #[error("invalid cell address '{address}'")]
    InvalidAddress { address: String },

    #[error("no node with that path id in the current tree")]
    NodeNotFound,

    /// Fatal for the session: the underlying workbook handle failed.
    #[error("workbook unreadable: {0}")]
    WorkbookUnreadable(String),

    /// Rejected without any state change.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
