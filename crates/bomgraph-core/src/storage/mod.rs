//! Workbook access and file formats around the engine.

pub mod batch;
pub mod index;
pub mod mapping;
pub mod results;
pub mod workbook;

pub use batch::{BatchRequest, read_batch_requests};
pub use index::FileIndex;
pub use mapping::ProductMapper;
pub use results::ResultStore;
pub use workbook::WorkbookProvider;
