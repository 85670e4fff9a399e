use std::sync::Mutex;

use async_trait::async_trait;
use coordination::Cell;

use super::{RowStore, Sheet, StoreError};

/// Row store held in memory. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemorySheet {
    sheet: Mutex<Sheet>,
}

impl MemorySheet {
    pub fn new(header: Vec<Cell>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            sheet: Mutex::new(Sheet::new(header, rows)),
        }
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Sheet {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Sheet> {
        self.sheet.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RowStore for MemorySheet {
    async fn header(&self) -> Result<Vec<Cell>, StoreError> {
        Ok(self.lock().header.clone())
    }

    async fn set_header(&self, column: usize, name: &str) -> Result<(), StoreError> {
        self.lock().set_header(column, name);
        Ok(())
    }

    async fn read_rows(&self) -> Result<Vec<Vec<Cell>>, StoreError> {
        Ok(self.lock().rows.clone())
    }

    async fn read_cell(&self, row: usize, column: usize) -> Result<Cell, StoreError> {
        self.lock().cell(row, column)
    }

    async fn write_cell(&self, row: usize, column: usize, value: Cell) -> Result<(), StoreError> {
        self.lock().set_cell(row, column, value)
    }

    async fn append_row(&self, cells: Vec<Cell>) -> Result<usize, StoreError> {
        Ok(self.lock().append(cells))
    }
}
