//! Per-cell information extraction.
//!
//! [`CellInfoExtractor`] is the call site the resolver re-enters for every
//! reference: it reads the raw cell through a [`CellProvider`], runs the
//! formula parser, and classifies the node through a [`Classifier`].

use serde::Deserialize;

use super::cell_ref::CellAddress;
use super::parse::FormulaParser;
use super::reference::{CellValue, Reference};
use crate::error::{LookupError, Result};

/// A cell as stored in a workbook.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawCell {
    pub formula: Option<String>,
    pub value: Option<CellValue>,
}

/// Raw cell access (workbook I/O).
pub trait CellProvider {
    fn read_cell(&mut self, address: &CellAddress) -> Result<RawCell>;
}

/// Product and base-material classification.
pub trait Classifier {
    /// Product id registered for a canonical cell id, if any.
    fn product_id(&self, id: &str) -> Option<String>;

    /// True if `file` is the base-material workbook.
    fn is_base_material(&self, file: &str) -> bool;
}

/// What the resolver calls to obtain an unresolved node for an address.
pub trait CellInfoSource {
    fn cell_info(&mut self, address: &CellAddress, product_id: Option<&str>) -> Result<Reference>;
}

/// File names compared the way the corpus spells them: case and spaces ignored.
pub fn same_file_name(a: &str, b: &str) -> bool {
    let normalize = |s: &str| -> String {
        s.chars()
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect()
    };
    normalize(a) == normalize(b)
}

/// A workbook that was renamed after formulas pointing at it were written.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileAlias {
    pub from: String,
    pub file: String,
    #[serde(default)]
    pub sheet: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub cells: usize,
    pub formulas: usize,
    pub multiplications: usize,
    pub divisions: usize,
    pub lookup_errors: usize,
}

pub struct CellInfoExtractor<P, C> {
    provider: P,
    classifier: C,
    parser: FormulaParser,
    aliases: Vec<FileAlias>,
    stats: ExtractionStats,
}

impl<P: CellProvider, C: Classifier> CellInfoExtractor<P, C> {
    pub fn new(provider: P, classifier: C, parser: FormulaParser) -> Self {
        CellInfoExtractor {
            provider,
            classifier,
            parser,
            aliases: Vec::new(),
            stats: ExtractionStats::default(),
        }
    }

    pub fn with_aliases(mut self, aliases: Vec<FileAlias>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn stats(&self) -> &ExtractionStats {
        &self.stats
    }

    fn apply_alias(&self, address: &CellAddress) -> CellAddress {
        match self.aliases.iter().find(|a| a.from == address.file) {
            Some(alias) => {
                tracing::debug!(from = %alias.from, to = %alias.file, "applying file alias");
                CellAddress::new(
                    alias.file.clone(),
                    alias.sheet.clone().unwrap_or_else(|| address.sheet.clone()),
                    &address.cell,
                )
            }
            None => address.clone(),
        }
    }

    /// Build the unresolved node for `address`.
    ///
    /// Not-found lookups are recorded on the node and returned as `Ok`; only
    /// provider failures come back as `Err`. The parsed references are left on
    /// the node for the resolver to expand or discard.
    pub fn extract(&mut self, address: &CellAddress, product_id: Option<&str>) -> Result<Reference> {
        let address = self.apply_alias(address);
        let id = address.id();
        tracing::debug!(%id, "extracting cell info");

        let mut node = Reference::new(address.clone());
        node.product_id = product_id
            .map(str::to_string)
            .or_else(|| self.classifier.product_id(&id));
        node.is_product = node.product_id.is_some();
        node.is_base_material = self.classifier.is_base_material(&node.file);
        self.stats.cells += 1;

        let raw = match self.provider.read_cell(&address) {
            Ok(raw) => raw,
            Err(LookupError::FileNotFound(_)) if node.is_base_material => {
                tracing::debug!(%id, "base material workbook not indexed");
                return Ok(node);
            }
            Err(err) if err.is_not_found() => {
                self.stats.lookup_errors += 1;
                tracing::warn!(%id, error = %err, "cell lookup failed");
                node.error = Some(err.to_string());
                return Ok(node);
            }
            Err(err) => return Err(err),
        };
        node.formula = raw.formula;
        node.value = raw.value;

        let info = self
            .parser
            .parse(node.formula.as_deref(), &node.file, &node.sheet);
        // Reference spans, link paths included, are already canonical ids here.
        if let Some(updated) = info.updated_formula.as_deref() {
            self.stats.formulas += 1;
            node.is_multiplication = updated.contains('*');
            node.is_division = updated.contains('/');
            if node.is_multiplication {
                self.stats.multiplications += 1;
                tracing::warn!(%id, "multiplication found");
            }
            if node.is_division {
                self.stats.divisions += 1;
                tracing::warn!(%id, "division found");
            }
        }

        node.is_element = info.is_element;
        node.h_reference_count = info.h_reference_count;
        node.cleaned_formula = info.cleaned_formula;
        node.updated_formula = info.updated_formula;
        node.references = info.references;
        Ok(node)
    }
}

impl<P: CellProvider, C: Classifier> CellInfoSource for CellInfoExtractor<P, C> {
    fn cell_info(&mut self, address: &CellAddress, product_id: Option<&str>) -> Result<Reference> {
        self.extract(address, product_id)
    }
}
