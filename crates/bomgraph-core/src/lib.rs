//! bomgraph-core - Workbook I/O, batch runs and reports around the engine.

pub mod batch;
pub mod config;
pub mod error;
pub mod report;
pub mod storage;

pub use batch::BatchRunner;
pub use config::Config;
pub use error::{BomError, Result};

pub use bomgraph_engine::engine::{CellAddress, Reference};
