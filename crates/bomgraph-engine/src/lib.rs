//! bomgraph_engine - Formula reference parsing and recursive BOM resolution.

pub mod engine;
pub mod error;
