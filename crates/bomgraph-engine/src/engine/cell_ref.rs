//! Cell addresses and A1-style cell tokens.
//!
//! A [`CellAddress`] names one cell anywhere in the corpus as a
//! `(file, sheet, cell)` triple. Its canonical id (`file_sheet_cell`, spaces
//! removed) is the node identity used for memoization, cycle detection and the
//! rewritten formulas produced by the extractor.
//!
//! Only the restricted grammar used by the spreadsheet family is accepted:
//! one or two uppercase column letters followed by one to three row digits.
//!
//! # Examples
//!
//! ```
//! use bomgraph_engine::engine::{CellAddress, CellRef, is_valid_cell};
//!
//! let addr = CellAddress::new("my book.xlsx", "Sheet 1", "b2");
//! assert_eq!(addr.cell, "B2");
//! assert_eq!(addr.id(), "mybook.xlsx_Sheet1_B2");
//!
//! assert!(is_valid_cell("ZZ999"));
//! assert!(!is_valid_cell("AAA1"));
//!
//! let pos = CellRef::from_str("B3").unwrap();
//! assert_eq!((pos.col, pos.row), (1, 2));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_COLUMN_LETTERS: usize = 2;
const MAX_ROW_DIGITS: usize = 3;

/// Returns true if `cell` matches `^[A-Z]{1,2}\d{1,3}$`.
///
/// The check is case-sensitive: lowercase tokens are not cell references.
pub fn is_valid_cell(cell: &str) -> bool {
    let letters = cell.bytes().take_while(|b| b.is_ascii_uppercase()).count();
    let digits = &cell.as_bytes()[letters..];
    (1..=MAX_COLUMN_LETTERS).contains(&letters)
        && (1..=MAX_ROW_DIGITS).contains(&digits.len())
        && digits.iter().all(|b| b.is_ascii_digit())
}

/// Canonical node identity: `"{file}_{sheet}_{cell}"` with every space removed.
pub fn canonical_id(file: &str, sheet: &str, cell: &str) -> String {
    let mut id = String::with_capacity(file.len() + sheet.len() + cell.len() + 2);
    for part in [file, "_", sheet, "_", cell] {
        id.extend(part.chars().filter(|c| *c != ' '));
    }
    id
}

/// A cell somewhere in the corpus.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CellAddress {
    pub file: String,
    pub sheet: String,
    pub cell: String,
}

impl CellAddress {
    /// Build an address; the cell token is uppercased and trimmed.
    pub fn new(file: impl Into<String>, sheet: impl Into<String>, cell: &str) -> CellAddress {
        CellAddress {
            file: file.into(),
            sheet: sheet.into(),
            cell: cell.trim().to_ascii_uppercase(),
        }
    }

    pub fn id(&self) -> String {
        canonical_id(&self.file, &self.sheet, &self.cell)
    }

    /// True when file, sheet and cell are all present.
    pub fn is_complete(&self) -> bool {
        !self.file.is_empty() && !self.sheet.is_empty() && !self.cell.is_empty()
    }

    /// Grid position of the cell, if the token is valid.
    pub fn position(&self) -> Option<CellRef> {
        if is_valid_cell(&self.cell) {
            CellRef::from_str(&self.cell)
        } else {
            None
        }
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]{}!{}", self.file, self.sheet, self.cell)
    }
}

/// A zero-indexed (row, col) position, used to index worksheet ranges.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(col: u32, row: u32) -> CellRef {
        CellRef { row, col }
    }

    /// Parse an A1 token (letters then digits, any case).
    /// Returns None if the input is malformed or overflows.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(name: &str) -> Option<CellRef> {
        let split = name.find(|c: char| c.is_ascii_digit())?;
        let (letters, numbers) = name.split_at(split);
        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        if !numbers.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        let mut col_acc = 0u32;
        for c in letters.to_ascii_uppercase().bytes() {
            let digit = u32::from(c - b'A') + 1;
            col_acc = col_acc.checked_mul(26)?.checked_add(digit)?;
        }
        let col = col_acc.checked_sub(1)?;
        let row = numbers.parse::<u32>().ok()?.checked_sub(1)?;

        Some(CellRef::new(col, row))
    }

    /// Convert column index to spreadsheet-style letters (0 -> A, 25 -> Z, 26 -> AA).
    pub fn col_to_letters(col: u32) -> String {
        let mut result = String::new();
        let mut n = u64::from(col) + 1;
        while n > 0 {
            n -= 1;
            result.insert(0, (b'A' + (n % 26) as u8) as char);
            n /= 26;
        }
        result
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", CellRef::col_to_letters(self.col), self.row + 1)
    }
}
