//! Report extraction: table parsing, role classification, typed extractors,
//! and the per-document assembler.

use thiserror::Error;

pub mod assemble;
pub mod classify;
pub mod extractors;
pub mod table;
pub mod value;

pub use assemble::assemble_report;
pub use classify::{classify, classify_with_position, TableRole};
pub use table::{parse_tables, RawTable};

pub const CRATE_NAME: &str = "qi-extract";

/// Table-level extraction failure. Recorded on the owning report's error
/// list by the assembler; never aborts the rest of the document.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("missing expected column: {0}")]
    MissingColumn(&'static str),
}
