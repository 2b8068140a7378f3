//! Per-cell formula parsing: clean, extract, detect.

use super::clean::{CleanerOptions, FormulaCleaner};
use super::element::{h_reference_count, is_element};
use super::extract::{ExtractorOptions, ReferenceExtractor};
use super::reference::FormulaInfo;

#[derive(Clone, Debug, Default)]
pub struct FormulaParser {
    cleaner: FormulaCleaner,
    extractor: ReferenceExtractor,
}

impl FormulaParser {
    pub fn new(cleaner: &CleanerOptions, extractor: &ExtractorOptions) -> Self {
        FormulaParser {
            cleaner: FormulaCleaner::new(cleaner.clone()),
            extractor: ReferenceExtractor::new(extractor),
        }
    }

    /// Parse the raw formula of a cell on `(file, sheet)`.
    ///
    /// A missing or empty formula is not an error: it yields no references
    /// and no updated formula.
    pub fn parse(&self, formula: Option<&str>, file: &str, sheet: &str) -> FormulaInfo {
        let cleaned = match self.cleaner.clean(formula) {
            Some(cleaned) if !cleaned.is_empty() => cleaned,
            _ => return FormulaInfo::default(),
        };

        let (references, updated) = self.extractor.extract_references(&cleaned, file, sheet);
        tracing::debug!(formula = %cleaned, updated = %updated, refs = references.len(), "parsed formula");

        FormulaInfo {
            is_element: is_element(&references),
            h_reference_count: h_reference_count(&references),
            references,
            cleaned_formula: Some(cleaned),
            updated_formula: Some(updated),
        }
    }
}
