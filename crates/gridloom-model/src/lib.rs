//! Core in-memory data model for Gridloom spreadsheets.
//!
//! This crate is intentionally small: the round-trip engine in
//! `gridloom-xlsx` only needs stable, index-based sheet identity and enough
//! cell content for part regeneration. Styling, rich text, and formula
//! evaluation live behind other collaborators.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("sheet index {index} out of range (workbook has {len} sheets)")]
    SheetOutOfRange { index: usize, len: usize },
    #[error("duplicate sheet name: {0}")]
    DuplicateSheetName(String),
}

/// A zero-based cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Render as an A1-style reference (`CellRef::new(0, 0)` -> `"A1"`).
    pub fn to_a1(self) -> String {
        format!("{}{}", col_to_letters(self.col), self.row + 1)
    }

    /// Parse an A1-style reference (`"C10"` -> `CellRef::new(9, 2)`).
    ///
    /// Returns `None` for anything that is not uppercase letters followed by a
    /// 1-based row number.
    pub fn from_a1(s: &str) -> Option<Self> {
        let split = s.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = s.split_at(split);
        if letters.is_empty() || !letters.bytes().all(|b| b.is_ascii_uppercase()) {
            return None;
        }
        let mut col: u32 = 0;
        for b in letters.bytes() {
            col = col.checked_mul(26)?.checked_add((b - b'A' + 1) as u32)?;
        }
        let row: u32 = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(Self {
            row: row - 1,
            col: col - 1,
        })
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1())
    }
}

/// Convert a zero-based column index to A1 letters (`0` -> `A`, `26` -> `AA`).
pub fn col_to_letters(col: u32) -> String {
    let mut out = Vec::new();
    let mut n = col;
    loop {
        out.push(b'A' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    out.reverse();
    // Only ASCII uppercase letters are pushed above.
    String::from_utf8(out).expect("ascii")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Empty,
    Number(f64),
    Boolean(bool),
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

/// Workbook-level document metadata (docProps-adjacent fields).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbookProperties {
    pub title: Option<String>,
    pub author: Option<String>,
    pub company: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worksheet {
    pub name: String,
    cells: BTreeMap<CellRef, CellValue>,
}

impl Worksheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    pub fn set_value(&mut self, cell: CellRef, value: CellValue) {
        if value.is_empty() {
            self.cells.remove(&cell);
        } else {
            self.cells.insert(cell, value);
        }
    }

    pub fn value(&self, cell: CellRef) -> Option<&CellValue> {
        self.cells.get(&cell)
    }

    pub fn clear_cell(&mut self, cell: CellRef) {
        self.cells.remove(&cell);
    }

    /// Iterate populated cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (CellRef, &CellValue)> {
        self.cells.iter().map(|(r, v)| (*r, v))
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// An in-memory workbook: an ordered list of worksheets plus document metadata.
///
/// Sheet identity is positional. The round-trip engine tracks sheets by their
/// 0-based index at open time, so mutating operations that change ordering or
/// membership go through [`Workbook::remove_sheet`] / [`Workbook::move_sheet`]
/// and the caller records the change in its modification ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Worksheet>,
    pub properties: WorkbookProperties,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheet(&self, index: usize) -> Option<&Worksheet> {
        self.sheets.get(index)
    }

    pub fn sheet_mut(&mut self, index: usize) -> Option<&mut Worksheet> {
        self.sheets.get_mut(index)
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.iter().map(|s| s.name.as_str())
    }

    /// Append a sheet, rejecting duplicate names (Excel requires unique names).
    pub fn add_sheet(&mut self, name: impl Into<String>) -> Result<usize, ModelError> {
        let name = name.into();
        if self.sheets.iter().any(|s| s.name == name) {
            return Err(ModelError::DuplicateSheetName(name));
        }
        self.sheets.push(Worksheet::new(name));
        Ok(self.sheets.len() - 1)
    }

    pub fn remove_sheet(&mut self, index: usize) -> Result<Worksheet, ModelError> {
        if index >= self.sheets.len() {
            return Err(ModelError::SheetOutOfRange {
                index,
                len: self.sheets.len(),
            });
        }
        Ok(self.sheets.remove(index))
    }

    pub fn move_sheet(&mut self, from: usize, to: usize) -> Result<(), ModelError> {
        let len = self.sheets.len();
        if from >= len {
            return Err(ModelError::SheetOutOfRange { index: from, len });
        }
        if to >= len {
            return Err(ModelError::SheetOutOfRange { index: to, len });
        }
        let sheet = self.sheets.remove(from);
        self.sheets.insert(to, sheet);
        Ok(())
    }
}
