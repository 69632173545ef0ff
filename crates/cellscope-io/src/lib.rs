pub mod backends;
pub mod error;
pub mod traits;

#[cfg(feature = "calamine")]
pub use backends::XlsxWorkbook;
pub use backends::MemoryWorkbook;
pub use error::IoError;
pub use traits::{CellSnapshot, WorkbookReader};

// Re-export for convenience
pub use cellscope_common::{CellValue, Coord};
