//! Error types for bomgraph core.

use std::path::PathBuf;

use bomgraph_engine::error::LookupError;
use thiserror::Error;

/// Errors that can occur outside the resolution engine
#[derive(Error, Debug)]
pub enum BomError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error in {}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Sheet not found: {0}")]
    MissingSheet(String),

    #[error("Unexpected header in {sheet}: expected {expected}, found {found}")]
    Header {
        sheet: String,
        expected: String,
        found: String,
    },

    #[error("Parse error at row {row}: {message}")]
    Parse { row: usize, message: String },

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

pub type Result<T> = std::result::Result<T, BomError>;
