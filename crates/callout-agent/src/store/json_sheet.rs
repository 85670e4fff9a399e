//! Row store persisted as a single JSON document on disk:
//! `{"header": [...], "rows": [[...], ...]}`.
//!
//! Every operation reloads the file so external edits are picked up between
//! ticks. Writes go to a sibling temp file first and are renamed into place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use coordination::Cell;
use tokio::sync::Mutex;
use tracing::debug;

use super::{RowStore, Sheet, StoreError};

pub struct JsonSheet {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonSheet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file reads as an empty sheet.
    async fn load(&self) -> Result<Sheet, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(Sheet::default()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "sheet file missing, starting empty");
                Ok(Sheet::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, sheet: &Sheet) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(sheet)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn update<T>(
        &self,
        f: impl FnOnce(&mut Sheet) -> Result<T, StoreError> + Send,
    ) -> Result<T, StoreError> {
        let _guard = self.guard.lock().await;
        let mut sheet = self.load().await?;
        let out = f(&mut sheet)?;
        self.save(&sheet).await?;
        Ok(out)
    }
}

#[async_trait]
impl RowStore for JsonSheet {
    async fn header(&self) -> Result<Vec<Cell>, StoreError> {
        let _guard = self.guard.lock().await;
        Ok(self.load().await?.header)
    }

    async fn set_header(&self, column: usize, name: &str) -> Result<(), StoreError> {
        self.update(|sheet| {
            sheet.set_header(column, name);
            Ok(())
        })
        .await
    }

    async fn read_rows(&self) -> Result<Vec<Vec<Cell>>, StoreError> {
        let _guard = self.guard.lock().await;
        Ok(self.load().await?.rows)
    }

    async fn read_cell(&self, row: usize, column: usize) -> Result<Cell, StoreError> {
        let _guard = self.guard.lock().await;
        self.load().await?.cell(row, column)
    }

    async fn write_cell(&self, row: usize, column: usize, value: Cell) -> Result<(), StoreError> {
        self.update(move |sheet| sheet.set_cell(row, column, value)).await
    }

    async fn append_row(&self, cells: Vec<Cell>) -> Result<usize, StoreError> {
        self.update(move |sheet| Ok(sheet.append(cells))).await
    }
}
