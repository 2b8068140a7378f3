//! Structural element detection.
//!
//! In this spreadsheet family a cut panel is computed from the four `H`
//! dimension cells of its sub-assembly sheet, so a formula that references at
//! least four `H` cells on one sheet is treated as a terminal element.

use std::collections::HashMap;

use super::reference::Reference;

pub const ELEMENT_H_THRESHOLD: usize = 4;

fn is_h_reference(reference: &Reference) -> bool {
    reference.cell.starts_with('H')
}

/// True if any sheet receives at least four `H` references.
pub fn is_element(references: &[Reference]) -> bool {
    let mut per_sheet: HashMap<&str, usize> = HashMap::new();
    for reference in references.iter().filter(|r| is_h_reference(r)) {
        let count = per_sheet.entry(reference.sheet.as_str()).or_default();
        *count += 1;
        if *count >= ELEMENT_H_THRESHOLD {
            return true;
        }
    }
    false
}

/// Number of `H` references across all sheets.
pub fn h_reference_count(references: &[Reference]) -> usize {
    references.iter().filter(|r| is_h_reference(r)).count()
}
