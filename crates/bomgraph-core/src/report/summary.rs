//! Classification counts over resolved trees.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use bomgraph_engine::engine::{Classification, Reference};

/// Node counts by classification. Each distinct id is counted once, however
/// many trees it appears in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationSummary {
    pub products: usize,
    pub elements: usize,
    pub base_materials: usize,
    pub other: usize,
}

impl ClassificationSummary {
    pub fn from_trees(trees: &[Reference]) -> Self {
        let mut summary = ClassificationSummary::default();
        let mut seen: HashSet<&str> = HashSet::new();
        for tree in trees {
            tree.walk(&mut |node| {
                if !seen.insert(node.id.as_str()) {
                    return;
                }
                match node.classification() {
                    Classification::Product => summary.products += 1,
                    Classification::Element => summary.elements += 1,
                    Classification::BaseMaterial => summary.base_materials += 1,
                    Classification::Other => summary.other += 1,
                }
            });
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.products + self.elements + self.base_materials + self.other
    }
}

impl fmt::Display for ClassificationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Products: {}", self.products)?;
        writeln!(f, "Elements: {}", self.elements)?;
        writeln!(f, "Base Materials: {}", self.base_materials)?;
        write!(f, "Other/Intermediate: {}", self.other)
    }
}
