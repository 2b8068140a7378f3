//! Summaries computed from resolved trees.

pub mod relationships;
pub mod summary;

pub use relationships::{ProductSummary, element_id, extract_relationships};
pub use summary::ClassificationSummary;
