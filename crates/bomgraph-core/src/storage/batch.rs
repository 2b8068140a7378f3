//! Control spreadsheet with the cells to resolve.
//!
//! The first sheet holds a header row and one request per row:
//!
//! ```text
//! Product_Id | File | Tab | Cell
//! ```
//!
//! The older three-column layout (`File | Tab | Cell`) is accepted too.
//! Reading stops at the first row with an empty file, tab or cell.

use calamine::{Data, Reader, open_workbook_auto};
use std::path::Path;

use bomgraph_engine::engine::CellAddress;

use crate::error::{BomError, Result};

pub const BATCH_HEADER: &[&str] = &["Product_Id", "File", "Tab", "Cell"];
pub const LEGACY_BATCH_HEADER: &[&str] = &["File", "Tab", "Cell"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchRequest {
    pub product_id: Option<String>,
    pub address: CellAddress,
}

impl BatchRequest {
    pub fn new(product_id: Option<&str>, file: &str, sheet: &str, cell: &str) -> Self {
        BatchRequest {
            product_id: product_id.map(str::to_string),
            address: CellAddress::new(file, sheet, cell),
        }
    }
}

/// Cell content as trimmed text. Whole floats print without a fraction so a
/// numeric product id reads the same as its typed form.
pub(crate) fn cell_text(data: Option<&Data>) -> String {
    match data {
        None | Some(Data::Empty) => String::new(),
        Some(Data::Float(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Some(other) => other.to_string().trim().to_string(),
    }
}

pub(crate) fn header_matches(row: &[Data], expected: &[&str]) -> bool {
    row.len() >= expected.len()
        && expected
            .iter()
            .enumerate()
            .all(|(i, name)| cell_text(row.get(i)) == *name)
}

pub(crate) fn header_text(row: &[Data]) -> String {
    row.iter()
        .map(|d| cell_text(Some(d)))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn read_batch_requests(path: &Path) -> Result<Vec<BatchRequest>> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| BomError::MissingSheet("<first sheet>".to_string()))?;
    let range = workbook.worksheet_range(&sheet)?;
    let mut rows = range.rows();

    let header = rows.next().unwrap_or(&[]);
    let offset = if header_matches(header, BATCH_HEADER) {
        1
    } else if header_matches(header, LEGACY_BATCH_HEADER) {
        0
    } else {
        return Err(BomError::Header {
            sheet,
            expected: BATCH_HEADER.join(", "),
            found: header_text(header),
        });
    };

    let mut requests = Vec::new();
    for row in rows {
        let product_id = if offset == 1 {
            Some(cell_text(row.first())).filter(|s| !s.is_empty())
        } else {
            None
        };
        let file = cell_text(row.get(offset));
        let tab = cell_text(row.get(offset + 1));
        let cell = cell_text(row.get(offset + 2));
        if file.is_empty() || tab.is_empty() || cell.is_empty() {
            break;
        }
        requests.push(BatchRequest {
            product_id,
            address: CellAddress::new(file, tab, &cell),
        });
    }
    tracing::info!(path = %path.display(), requests = requests.len(), "read batch file");
    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_xlsxwriter::Workbook;

    fn write_rows(path: &Path, rows: &[&[&str]]) {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, text) in row.iter().enumerate() {
                if !text.is_empty() {
                    sheet.write_string(r as u32, c as u16, *text).unwrap();
                }
            }
        }
        workbook.save(path).unwrap();
    }

    #[test]
    fn test_reads_until_first_incomplete_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.xlsx");
        write_rows(
            &path,
            &[
                BATCH_HEADER,
                &["P-1", "kast.xlsx", "OVERZICHT C494", "d5"],
                &["", "kast.xlsx", "OVERZICHT C79B", "D41"],
                &["P-3", "kast.xlsx", "", "D41"],
                &["P-4", "after.xlsx", "S", "A1"],
            ],
        );
        let requests = read_batch_requests(&path).unwrap();
        assert_eq!(
            requests,
            vec![
                BatchRequest::new(Some("P-1"), "kast.xlsx", "OVERZICHT C494", "D5"),
                BatchRequest::new(None, "kast.xlsx", "OVERZICHT C79B", "D41"),
            ]
        );
    }

    #[test]
    fn test_numeric_product_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (c, name) in BATCH_HEADER.iter().enumerate() {
            sheet.write_string(0, c as u16, *name).unwrap();
        }
        sheet.write_number(1, 0, 1042.0).unwrap();
        sheet.write_string(1, 1, "a.xlsx").unwrap();
        sheet.write_string(1, 2, "S").unwrap();
        sheet.write_string(1, 3, "B2").unwrap();
        workbook.save(&path).unwrap();

        let requests = read_batch_requests(&path).unwrap();
        assert_eq!(requests[0].product_id.as_deref(), Some("1042"));
    }

    #[test]
    fn test_legacy_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.xlsx");
        write_rows(&path, &[LEGACY_BATCH_HEADER, &["a.xlsx", "S", "A1"]]);
        let requests = read_batch_requests(&path).unwrap();
        assert_eq!(requests, vec![BatchRequest::new(None, "a.xlsx", "S", "A1")]);
    }

    #[test]
    fn test_wrong_header_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.xlsx");
        write_rows(&path, &[&["Name", "Sheet", "Cell"], &["a.xlsx", "S", "A1"]]);
        let err = read_batch_requests(&path).unwrap_err();
        assert!(matches!(err, BomError::Header { .. }));
        assert!(err.to_string().contains("Name, Sheet, Cell"));
    }
}
