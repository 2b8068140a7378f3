//! Error types for cell lookups.

use thiserror::Error;

/// Failures reported by a cell provider.
///
/// The three not-found variants are ordinary outcomes in a corpus of linked
/// workbooks and end up on the node's `error` field. `Workbook` covers
/// everything else (unreadable file, corrupt archive).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Sheet not found: {0}")]
    SheetNotFound(String),

    #[error("Cell not found: {0}")]
    CellNotFound(String),

    #[error("Workbook error: {0}")]
    Workbook(String),
}

impl LookupError {
    pub fn is_not_found(&self) -> bool {
        !matches!(self, LookupError::Workbook(_))
    }
}

pub type Result<T> = std::result::Result<T, LookupError>;
