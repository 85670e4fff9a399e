//! Row store: the spreadsheet the escalation records live in.
//!
//! Rows are addressed by 0-based data-row index (the header row is kept
//! separately) and columns by 0-based index.

pub mod codec;
pub mod json_sheet;
pub mod layout;
pub mod memory;

use async_trait::async_trait;
use coordination::Cell;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use codec::{RecordError, RowCodec};
pub use json_sheet::JsonSheet;
pub use layout::ColumnLayout;
pub use memory::MemorySheet;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sheet I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("sheet file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("row {row} does not exist (sheet has {rows} data rows)")]
    RowOutOfRange { row: usize, rows: usize },
}

#[async_trait]
pub trait RowStore: Send + Sync {
    async fn header(&self) -> Result<Vec<Cell>, StoreError>;

    async fn set_header(&self, column: usize, name: &str) -> Result<(), StoreError>;

    /// Every data row, in persisted order.
    async fn read_rows(&self) -> Result<Vec<Vec<Cell>>, StoreError>;

    async fn read_cell(&self, row: usize, column: usize) -> Result<Cell, StoreError>;

    async fn write_cell(&self, row: usize, column: usize, value: Cell) -> Result<(), StoreError>;

    /// Append a data row and return its index.
    async fn append_row(&self, cells: Vec<Cell>) -> Result<usize, StoreError>;
}

/// Header plus data rows; the shared in-memory shape of every sheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    #[serde(default)]
    pub header: Vec<Cell>,
    #[serde(default)]
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(header: Vec<Cell>, rows: Vec<Vec<Cell>>) -> Self {
        Self { header, rows }
    }

    fn row(&self, row: usize) -> Result<&Vec<Cell>, StoreError> {
        self.rows.get(row).ok_or(StoreError::RowOutOfRange {
            row,
            rows: self.rows.len(),
        })
    }

    /// Cells past the end of a short row read as empty.
    pub fn cell(&self, row: usize, column: usize) -> Result<Cell, StoreError> {
        Ok(self.row(row)?.get(column).cloned().unwrap_or_default())
    }

    pub fn set_cell(&mut self, row: usize, column: usize, value: Cell) -> Result<(), StoreError> {
        let rows = self.rows.len();
        let cells = self
            .rows
            .get_mut(row)
            .ok_or(StoreError::RowOutOfRange { row, rows })?;
        set_padded(cells, column, value);
        Ok(())
    }

    pub fn set_header(&mut self, column: usize, name: &str) {
        set_padded(&mut self.header, column, Cell::text(name));
    }

    pub fn append(&mut self, cells: Vec<Cell>) -> usize {
        self.rows.push(cells);
        self.rows.len() - 1
    }
}

fn set_padded(cells: &mut Vec<Cell>, column: usize, value: Cell) {
    if cells.len() <= column {
        cells.resize(column + 1, Cell::Empty);
    }
    cells[column] = value;
}
