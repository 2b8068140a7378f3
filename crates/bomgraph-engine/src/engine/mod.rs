//! Formula reference resolution.
//!
//! - [`CellAddress`], [`CellRef`] - Cell addressing and canonical ids
//! - [`FormulaCleaner`] - Normalize raw formula text
//! - [`ReferenceExtractor`] - Find cell references in a cleaned formula
//! - [`FormulaParser`] - Clean, extract and classify in one pass
//! - [`CellInfoExtractor`] - Build one node from a workbook cell
//! - [`Resolver`] - Recursive resolution with cycle, depth and cache checks

mod cell_info;
mod cell_ref;
mod clean;
mod cycle;
mod element;
mod extract;
mod parse;
mod reference;
mod resolve;

pub use cell_info::{
    CellInfoExtractor, CellInfoSource, CellProvider, Classifier, ExtractionStats, FileAlias,
    RawCell, same_file_name,
};
pub use cell_ref::{CellAddress, CellRef, canonical_id, is_valid_cell};
pub use clean::{CleanerOptions, DEFAULT_BASE_URLS, DEFAULT_FOLDERS, FormulaCleaner};
pub use cycle::{ChainGuard, ResolutionChain};
pub use element::{ELEMENT_H_THRESHOLD, h_reference_count, is_element};
pub use extract::{DEFAULT_SPECIAL_SHEETS, ExtractorOptions, ReferenceExtractor};
pub use parse::FormulaParser;
pub use reference::{
    CIRCULAR_ERROR, CellValue, Classification, FormulaInfo, MAX_DEPTH_ERROR, Reference,
};
pub use resolve::{DEFAULT_MAX_RECURSION_DEPTH, Resolver, ResolverOptions};
