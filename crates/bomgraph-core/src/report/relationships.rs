//! Product relationship summary.
//!
//! For every resolved product: the products it is built from, and for each
//! of those the elements and base materials it uses. Descent stops at the
//! first product, element or base material on every path; intermediate nodes
//! are walked through.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use bomgraph_engine::engine::Reference;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub products: Vec<ProductEntry>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductEntry {
    #[serde(rename = "productID")]
    pub product_id: String,
    pub relationships: ProductRelationships,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRelationships {
    pub product_product: Vec<ChildProduct>,
    pub product_base_material: Vec<String>,
    pub product_element: Vec<ElementRef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChildProduct {
    #[serde(rename = "productID")]
    pub product_id: String,
    pub relationships: ChildRelationships,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildRelationships {
    pub product_element: Vec<ElementRef>,
    pub product_base_material: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRef {
    #[serde(rename = "elementID")]
    pub element_id: String,
}

/// `{sheet}_{cell}_{value}` with the value rounded to three decimals.
pub fn element_id(node: &Reference) -> String {
    let value = node.value.as_ref().and_then(|v| v.as_number()).unwrap_or(0.0);
    let rounded = (value * 1000.0).round() / 1000.0;
    format!("{}_{}_{:?}", node.sheet, node.cell, rounded)
}

#[derive(Default)]
struct Leaves<'a> {
    products: Vec<&'a Reference>,
    elements: Vec<ElementRef>,
    base_materials: Vec<String>,
}

fn collect_leaves<'a>(node: &'a Reference, leaves: &mut Leaves<'a>) {
    for child in &node.references {
        if child.is_product {
            leaves.products.push(child);
        } else if child.is_element {
            leaves.elements.push(ElementRef {
                element_id: element_id(child),
            });
        } else if child.is_base_material {
            leaves.base_materials.push(child.cell.clone());
        } else {
            collect_leaves(child, leaves);
        }
    }
}

pub fn extract_relationships(trees: &[Reference]) -> ProductSummary {
    // A nested product is a leaf in its parent's tree; its own top-level tree
    // carries its children.
    let expanded: HashMap<&str, &Reference> = trees
        .iter()
        .filter_map(|t| t.product_id.as_deref().map(|id| (id, t)))
        .collect();

    let mut order: Vec<String> = Vec::new();
    let mut entries: HashMap<String, ProductRelationships> = HashMap::new();

    for tree in trees {
        let Some(product_id) = tree.product_id.as_deref() else {
            tracing::debug!(id = %tree.id, "skipping tree without product id");
            continue;
        };
        let mut leaves = Leaves::default();
        collect_leaves(tree, &mut leaves);

        let entry = entries.entry(product_id.to_string()).or_insert_with(|| {
            order.push(product_id.to_string());
            ProductRelationships::default()
        });
        for child in leaves.products {
            let child_id = child.product_id.clone().unwrap_or_default();
            let source = expanded.get(child_id.as_str()).copied().unwrap_or(child);
            let mut child_leaves = Leaves::default();
            collect_leaves(source, &mut child_leaves);
            entry.product_product.push(ChildProduct {
                product_id: child_id,
                relationships: ChildRelationships {
                    product_element: child_leaves.elements,
                    product_base_material: child_leaves.base_materials,
                },
            });
        }
        entry.product_element.extend(leaves.elements);
        entry.product_base_material.extend(leaves.base_materials);
    }

    let products = order
        .into_iter()
        .filter_map(|product_id| {
            let relationships = entries.remove(&product_id)?;
            Some(ProductEntry {
                product_id,
                relationships,
            })
        })
        .collect();
    ProductSummary { products }
}
