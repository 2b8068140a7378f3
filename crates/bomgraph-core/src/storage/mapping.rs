//! Product id to cell identity table.
//!
//! Stored as a JSON object `{ "<product id>": "<canonical id>" }` and
//! generated from the "All Products" sheet of the product list workbook.

use calamine::{Reader, open_workbook_auto};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use bomgraph_engine::engine::{CellAddress, Classifier, same_file_name};

use super::batch::{cell_text, header_matches, header_text};
use crate::config::DEFAULT_BASE_MATERIAL_FILE;
use crate::error::{BomError, Result};

pub const PRODUCTS_SHEET: &str = "All Products";
pub const PRODUCTS_HEADER: &[&str] = &["Code", "Price Group", "Product_ID", "File", "Tab", "Cell"];

pub type ProductMapping = BTreeMap<String, String>;

#[derive(Clone, Debug)]
pub struct ProductMapper {
    products: ProductMapping,
    by_cell: HashMap<String, String>,
    base_material_file: String,
}

impl Default for ProductMapper {
    fn default() -> Self {
        ProductMapper::new(ProductMapping::new(), DEFAULT_BASE_MATERIAL_FILE)
    }
}

impl ProductMapper {
    pub fn new(products: ProductMapping, base_material_file: &str) -> Self {
        let mut by_cell: HashMap<String, String> = HashMap::new();
        for (product_id, cell_id) in &products {
            if let Some(existing) = by_cell.get(cell_id) {
                tracing::debug!(%cell_id, kept = %existing, skipped = %product_id, "cell mapped to several products");
                continue;
            }
            by_cell.insert(cell_id.clone(), product_id.clone());
        }
        ProductMapper {
            products,
            by_cell,
            base_material_file: base_material_file.to_string(),
        }
    }

    pub fn load(path: &Path, base_material_file: &str) -> Result<Self> {
        let file = File::open(path)?;
        let products: ProductMapping = serde_json::from_reader(std::io::BufReader::new(file))?;
        tracing::info!(path = %path.display(), products = products.len(), "loaded product mapping");
        Ok(ProductMapper::new(products, base_material_file))
    }

    pub fn products(&self) -> &ProductMapping {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl Classifier for ProductMapper {
    fn product_id(&self, id: &str) -> Option<String> {
        self.by_cell.get(id).cloned()
    }

    fn is_base_material(&self, file: &str) -> bool {
        same_file_name(file, &self.base_material_file)
    }
}

/// Build the mapping from the "All Products" sheet. Rows end at the first
/// blank row; `.xlsx` is appended to file names without it.
pub fn mapping_from_workbook(path: &Path) -> Result<ProductMapping> {
    let mut workbook = open_workbook_auto(path)?;
    if !workbook.sheet_names().iter().any(|s| s == PRODUCTS_SHEET) {
        return Err(BomError::MissingSheet(PRODUCTS_SHEET.to_string()));
    }
    let range = workbook.worksheet_range(PRODUCTS_SHEET)?;
    let mut rows = range.rows();
    let header = rows.next().unwrap_or(&[]);
    if !header_matches(header, PRODUCTS_HEADER) {
        return Err(BomError::Header {
            sheet: PRODUCTS_SHEET.to_string(),
            expected: PRODUCTS_HEADER.join(", "),
            found: header_text(header),
        });
    }

    let mut mapping = ProductMapping::new();
    for (i, row) in rows.enumerate() {
        let fields: Vec<String> = (0..PRODUCTS_HEADER.len())
            .map(|c| cell_text(row.get(c)))
            .collect();
        if fields.iter().all(String::is_empty) {
            break;
        }
        let row_number = i + 2;
        let [_, _, product_id, file, tab, cell] = &fields[..] else {
            continue;
        };
        if product_id.is_empty() || file.is_empty() || tab.is_empty() || cell.is_empty() {
            return Err(BomError::Parse {
                row: row_number,
                message: "Product_ID, File, Tab and Cell are required".to_string(),
            });
        }
        let mut file = file.clone();
        if !file.to_lowercase().ends_with(".xlsx") {
            file.push_str(".xlsx");
        }
        let id = CellAddress::new(file, tab.as_str(), cell).id();
        if mapping.insert(product_id.clone(), id).is_some() {
            tracing::warn!(%product_id, row = row_number, "duplicate product id, last row wins");
        }
    }
    tracing::info!(path = %path.display(), products = mapping.len(), "generated product mapping");
    Ok(mapping)
}

pub fn save_mapping(path: &Path, mapping: &ProductMapping) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, mapping)?;
    Ok(())
}
