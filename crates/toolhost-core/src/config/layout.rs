use std::path::{Path, PathBuf};

/// On-disk layout shared by every component. Sandbox and storage directories
/// are named exactly after the tool; that name is the only join key between
/// them and the tool set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub tools_dir: PathBuf,
    pub sandboxes_dir: PathBuf,
    pub storage_dir: PathBuf,
    pub locks_dir: PathBuf,
}

impl Layout {
    /// `<root>/tools`, `<root>/sandboxes`, `<root>/storage`, `<root>/locks`.
    pub fn under(root: &Path) -> Self {
        Self {
            tools_dir: root.join("tools"),
            sandboxes_dir: root.join("sandboxes"),
            storage_dir: root.join("storage"),
            locks_dir: root.join("locks"),
        }
    }

    pub fn sandbox_path(&self, name: &str) -> PathBuf {
        self.sandboxes_dir.join(name)
    }

    pub fn storage_path(&self, name: &str) -> PathBuf {
        self.storage_dir.join(name)
    }

    /// Provisioning lock for `name`. Kept out of `sandboxes_dir`: tool names
    /// may contain dots, so `<name>.lock` there could be another tool's sandbox.
    pub fn lock_path(&self, name: &str) -> PathBuf {
        self.locks_dir.join(format!("{name}.lock"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_keyed_by_tool_name() {
        let layout = Layout::under(Path::new("/opt/toolhost"));
        assert_eq!(
            layout.sandbox_path("get_duration"),
            PathBuf::from("/opt/toolhost/sandboxes/get_duration")
        );
        assert_eq!(
            layout.storage_path("get_duration"),
            PathBuf::from("/opt/toolhost/storage/get_duration")
        );
        assert_eq!(
            layout.lock_path("get_duration"),
            PathBuf::from("/opt/toolhost/locks/get_duration.lock")
        );
    }

    #[test]
    fn lock_never_aliases_a_dotted_tool_sandbox() {
        let layout = Layout::under(Path::new("/opt/toolhost"));
        assert_ne!(layout.lock_path("foo"), layout.sandbox_path("foo.lock"));
        assert!(!layout.lock_path("foo").starts_with(&layout.sandboxes_dir));
    }
}
