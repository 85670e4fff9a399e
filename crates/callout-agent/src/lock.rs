//! Advisory tick lock: one scheduler at a time per sheet.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

/// Held for the duration of a tick (or a `run` loop); removed on drop.
#[derive(Debug)]
pub struct TickLock {
    path: PathBuf,
}

impl TickLock {
    /// Take the lock at `path`, or `Ok(None)` if another process holds it.
    /// A lock file older than `stale_after` is treated as abandoned.
    pub fn acquire(path: &Path, stale_after: Duration) -> std::io::Result<Option<Self>> {
        match Self::create(path) {
            Ok(lock) => Ok(Some(lock)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if !is_stale(path, stale_after) {
                    debug!(path = %path.display(), "tick lock held elsewhere");
                    return Ok(None);
                }
                warn!(path = %path.display(), "removing stale tick lock");
                fs::remove_file(path)?;
                match Self::create(path) {
                    Ok(lock) => Ok(Some(lock)),
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    fn create(path: &Path) -> std::io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_stale(path: &Path, stale_after: Duration) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > stale_after)
}

impl Drop for TickLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove tick lock");
        }
    }
}
