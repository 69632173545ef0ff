#[cfg(feature = "calamine")]
pub mod calamine;
pub mod memory;

#[cfg(feature = "calamine")]
pub use calamine::XlsxWorkbook;
pub use memory::MemoryWorkbook;
