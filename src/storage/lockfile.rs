//! Process Lock File Module
//!
//! Keeps two service processes from opening the same order database; sled
//! itself would fail with an opaque lock error on the second open.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// PID lock file inside the data directory, removed on drop.
#[derive(Debug)]
pub struct ProcessLock {
    lock_path: PathBuf,
    owned: bool,
}

impl ProcessLock {
    const LOCK_FILE_NAME: &'static str = ".cosmo-profile.lock";

    /// Acquire the lock for `data_dir`, creating the directory if needed.
    ///
    /// Fails if another live instance holds it. A lock left behind by a dead
    /// process is taken over.
    pub fn acquire<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let lock_path = data_dir.join(Self::LOCK_FILE_NAME);

        if lock_path.exists() {
            match Self::holder(&lock_path) {
                Ok(Some(pid)) => bail!(
                    "Another cosmo-profile instance is already using {} (PID: {})\n\
                     If no other instance is running, remove the stale lock file:\n    rm {}",
                    data_dir.display(),
                    pid,
                    lock_path.display()
                ),
                Ok(None) => {
                    tracing::info!(path = %lock_path.display(), "Removing stale lock file");
                    fs::remove_file(&lock_path).context("Failed to remove stale lock file")?;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Unreadable lock file, replacing it");
                    let _ = fs::remove_file(&lock_path);
                }
            }
        }

        let pid = std::process::id();
        fs::write(&lock_path, format!("{pid}\n"))
            .with_context(|| format!("Failed to create lock file: {}", lock_path.display()))?;

        tracing::debug!(pid, path = %lock_path.display(), "Acquired process lock");
        Ok(Self {
            lock_path,
            owned: true,
        })
    }

    /// PID of a live process holding the lock, `None` if the lock is stale.
    fn holder(lock_path: &Path) -> Result<Option<u32>> {
        let contents = fs::read_to_string(lock_path).context("Failed to read lock file")?;
        let pid: u32 = contents
            .trim()
            .parse()
            .context("Failed to parse PID from lock file")?;

        if pid != std::process::id() && Self::is_process_running(pid) {
            Ok(Some(pid))
        } else {
            Ok(None)
        }
    }

    #[cfg(unix)]
    fn is_process_running(pid: u32) -> bool {
        // A recycled PID belonging to another program does not count
        fs::read_to_string(format!("/proc/{pid}/cmdline"))
            .map(|cmdline| cmdline.contains("cosmo-profile") || cmdline.contains("cosmo_profile"))
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    fn is_process_running(_pid: u32) -> bool {
        true
    }

    /// Release the lock (called automatically on drop)
    pub fn release(&mut self) {
        if self.owned {
            if let Err(e) = fs::remove_file(&self.lock_path) {
                tracing::warn!(error = %e, "Failed to remove lock file");
            } else {
                tracing::debug!(path = %self.lock_path.display(), "Released process lock");
            }
            self.owned = false;
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        self.release();
    }
}
