//! Resolution nodes.
//!
//! A [`Reference`] is created empty by the extractor, enriched by the cell info
//! lookup and finalized by the resolver. Every field is always present so the
//! serialized tree has one stable shape; `references` is declared last so it
//! serializes last.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::cell_ref::{CellAddress, canonical_id};

pub const MAX_DEPTH_ERROR: &str = "Max Recursion Depth Error";
pub const CIRCULAR_ERROR: &str = "Circular Error: Circular reference detected";

/// A computed cell value as cached by the spreadsheet engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl CellValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Node role in the bill of materials.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Classification {
    Product,
    Element,
    BaseMaterial,
    Other,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Classification::Product => "Product",
            Classification::Element => "Element",
            Classification::BaseMaterial => "Base Material",
            Classification::Other => "Other",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    pub file: String,
    pub sheet: String,
    pub cell: String,
    pub formula: Option<String>,
    pub cleaned_formula: Option<String>,
    pub updated_formula: Option<String>,
    pub value: Option<CellValue>,
    #[serde(rename = "isElement")]
    pub is_element: bool,
    #[serde(rename = "isBaseMaterial")]
    pub is_base_material: bool,
    #[serde(rename = "isProduct")]
    pub is_product: bool,
    #[serde(rename = "isMultiplication")]
    pub is_multiplication: bool,
    #[serde(rename = "isDivision")]
    pub is_division: bool,
    #[serde(rename = "hReferenceCount")]
    pub h_reference_count: usize,
    #[serde(rename = "productID")]
    pub product_id: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub references: Vec<Reference>,
}

impl Reference {
    /// An empty node for `address`: no formula, no value, no flags.
    pub fn new(address: CellAddress) -> Reference {
        Reference {
            id: address.id(),
            file: address.file,
            sheet: address.sheet,
            cell: address.cell,
            formula: None,
            cleaned_formula: None,
            updated_formula: None,
            value: None,
            is_element: false,
            is_base_material: false,
            is_product: false,
            is_multiplication: false,
            is_division: false,
            h_reference_count: 0,
            product_id: None,
            error: None,
            references: Vec::new(),
        }
    }

    pub fn address(&self) -> CellAddress {
        CellAddress {
            file: self.file.clone(),
            sheet: self.sheet.clone(),
            cell: self.cell.clone(),
        }
    }

    /// Recompute `id` from (file, sheet, cell).
    pub fn canonical_id(&self) -> String {
        canonical_id(&self.file, &self.sheet, &self.cell)
    }

    pub fn has_formula(&self) -> bool {
        self.formula.as_deref().is_some_and(|f| !f.is_empty())
    }

    /// A literal cell: a value is present but nothing computed it.
    pub fn is_literal(&self) -> bool {
        self.value.is_some() && !self.has_formula()
    }

    pub fn classification(&self) -> Classification {
        if self.is_product {
            Classification::Product
        } else if self.is_element {
            Classification::Element
        } else if self.is_base_material {
            Classification::BaseMaterial
        } else {
            Classification::Other
        }
    }

    /// Copy of this node without children.
    pub fn as_leaf(&self) -> Reference {
        Reference {
            references: Vec::new(),
            ..self.clone()
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Reference {
        self.error = Some(error.into());
        self.references.clear();
        self
    }

    /// Depth-first walk over this node and all descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Reference)) {
        visit(self);
        for child in &self.references {
            child.walk(visit);
        }
    }
}

/// Result of parsing one formula.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormulaInfo {
    pub is_element: bool,
    pub h_reference_count: usize,
    pub references: Vec<Reference>,
    pub cleaned_formula: Option<String>,
    pub updated_formula: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_reference_is_empty() {
        let r = Reference::new(CellAddress::new("test.xlsx", "My Sheet", "b2"));
        assert_eq!(r.id, "test.xlsx_MySheet_B2");
        assert_eq!(r.formula, None);
        assert!(!r.is_element);
        assert!(r.references.is_empty());
        assert_eq!(r.canonical_id(), r.id);
    }

    #[test]
    fn test_serialized_keys_keep_references_last() {
        let r = Reference::new(CellAddress::new("a.xlsx", "S", "A1"));
        let json = serde_json::to_string(&r).unwrap();
        let keys: Vec<&str> = json
            .trim_matches(|c| c == '{' || c == '}')
            .split(',')
            .filter_map(|kv| kv.split(':').next())
            .map(|k| k.trim_matches('"'))
            .collect();
        assert_eq!(
            keys,
            vec![
                "id",
                "file",
                "sheet",
                "cell",
                "formula",
                "cleaned_formula",
                "updated_formula",
                "value",
                "isElement",
                "isBaseMaterial",
                "isProduct",
                "isMultiplication",
                "isDivision",
                "hReferenceCount",
                "productID",
                "error",
                "references",
            ]
        );
    }

    #[test]
    fn test_values_serialize_untagged() {
        assert_eq!(serde_json::to_string(&CellValue::Number(2.5)).unwrap(), "2.5");
        assert_eq!(
            serde_json::to_string(&CellValue::Text("x".into())).unwrap(),
            "\"x\""
        );
        let back: CellValue = serde_json::from_str("true").unwrap();
        assert_eq!(back, CellValue::Bool(true));
    }

    #[test]
    fn test_literal_detection() {
        let mut r = Reference::new(CellAddress::new("a.xlsx", "S", "A1"));
        assert!(!r.is_literal());
        r.value = Some(CellValue::Number(3.0));
        assert!(r.is_literal());
        r.formula = Some("B1*2".into());
        assert!(!r.is_literal());
    }
}
