use crate::config::{Layout, ToolhostConfig};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What a reclamation pass did. Removal failures are recorded, not raised.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReclaimReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    /// Provisioning lock files of tools that no longer exist.
    pub stale_locks: Vec<PathBuf>,
}

impl ReclaimReport {
    /// Number of directories removed.
    pub fn count(&self) -> usize {
        self.removed.len()
    }
}

/// Deletes sandbox and storage directories whose name matches no current tool.
pub struct Reclaimer {
    layout: Layout,
}

impl Reclaimer {
    pub fn new(config: &ToolhostConfig) -> Self {
        Self {
            layout: config.layout(),
        }
    }

    /// Remove every directory under the sandbox and storage roots whose name
    /// is not in `current`. Best effort: each removal is independent.
    pub async fn reclaim(&self, current: &HashSet<String>) -> ReclaimReport {
        info!("Checking for orphaned sandboxes and storage...");
        let mut report = ReclaimReport::default();

        self.sweep_dirs(&self.layout.sandboxes_dir, "sandbox", current, &mut report)
            .await;
        self.sweep_dirs(&self.layout.storage_dir, "storage", current, &mut report)
            .await;
        self.sweep_locks(current, &mut report).await;

        if report.count() == 0 {
            info!("No orphaned directories found");
        } else {
            info!("Reclaimed {} orphaned director(ies)", report.count());
        }
        report
    }

    async fn sweep_dirs(
        &self,
        root: &Path,
        kind: &str,
        current: &HashSet<String>,
        report: &mut ReclaimReport,
    ) {
        for (name, path) in list_entries(root, true).await {
            if current.contains(&name) {
                continue;
            }
            info!("Removing orphaned {} for '{}'", kind, name);
            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => report.removed.push(path),
                Err(e) => {
                    warn!("Failed to remove {:?}: {}", path, e);
                    report.failed.push((path, e.to_string()));
                }
            }
        }
    }

    async fn sweep_locks(&self, current: &HashSet<String>, report: &mut ReclaimReport) {
        for (file_name, path) in list_entries(&self.layout.locks_dir, false).await {
            let Some(tool) = file_name.strip_suffix(".lock") else {
                continue;
            };
            if current.contains(tool) {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => report.stale_locks.push(path),
                Err(e) => warn!("Failed to remove stale lock {:?}: {}", path, e),
            }
        }
    }
}

/// Directory (or, with `dirs == false`, file) entries directly under `root`.
/// A missing or unreadable root yields nothing.
async fn list_entries(root: &Path, dirs: bool) -> Vec<(String, PathBuf)> {
    let mut entries = Vec::new();
    let mut read = match tokio::fs::read_dir(root).await {
        Ok(r) => r,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return entries,
        Err(e) => {
            warn!("Cannot read {:?}: {}", root, e);
            return entries;
        }
    };

    loop {
        let entry = match read.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                warn!("Cannot read {:?}: {}", root, e);
                break;
            }
        };
        let is_dir = match entry.file_type().await {
            Ok(t) => t.is_dir(),
            Err(_) => continue,
        };
        if is_dir != dirs {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => entries.push((name, entry.path())),
            Err(raw) => warn!("Skipping non UTF-8 entry {:?}", raw),
        }
    }
    entries.sort();
    entries
}
