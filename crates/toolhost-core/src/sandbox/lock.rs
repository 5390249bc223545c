use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Exclusive advisory lock serializing provisioning of one tool across
/// processes. Released on drop. The lock file itself is left in place;
/// stale ones are swept by the reclaimer.
#[derive(Debug)]
pub struct ProvisionLock {
    file: File,
}

impl ProvisionLock {
    /// Block (off the async executor) until the lock at `path` is held.
    pub async fn acquire(path: &Path) -> std::io::Result<Self> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::acquire_blocking(path))
            .await
            .map_err(std::io::Error::other)?
    }

    fn acquire_blocking(path: PathBuf) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for ProvisionLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
