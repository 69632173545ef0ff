//! Accessor-boundary errors.
//!
//! Ordinary absent cells are `Ok(None)` at the trait level; an `IoError`
//! means the workbook itself could not be served.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("workbook could not be opened: {0}")]
    Open(String),

    #[error("sheet '{sheet}' not found in workbook")]
    SheetNotFound { sheet: String },

    #[error("backend failure: {0}")]
    Backend(String),
}

impl IoError {
    pub fn from_backend<E: std::fmt::Display>(err: E) -> Self {
        IoError::Backend(err.to_string())
    }
}
