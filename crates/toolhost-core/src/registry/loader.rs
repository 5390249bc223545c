use crate::config::RuntimeConfig;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// A file in the tools directory that qualifies as a tool entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub entry_point: PathBuf,
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("valid tool name pattern"))
}

/// Whether `name` may be used as a tool name and therefore as a directory name
/// under the sandbox and storage roots.
pub fn is_valid_name(name: &str) -> bool {
    name_pattern().is_match(name)
}

pub struct ToolLoader;

impl ToolLoader {
    /// List entry points in `tools_dir`, sorted by name. Creates the directory
    /// when it does not exist and returns nothing for it.
    pub fn scan(tools_dir: &Path, runtime: &RuntimeConfig) -> std::io::Result<Vec<Candidate>> {
        if !tools_dir.exists() {
            warn!("tools directory {:?} not found, creating it", tools_dir);
            std::fs::create_dir_all(tools_dir)?;
            return Ok(vec![]);
        }

        let mut found = Vec::new();
        for entry in std::fs::read_dir(tools_dir)? {
            let entry = entry?;
            let path = entry.path();

            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(runtime.extension.as_str()) {
                continue;
            }

            let Some(stem) = path.file_stem() else {
                continue;
            };
            let Some(name) = stem.to_str() else {
                warn!("Skipping tool with non UTF-8 name at {:?}", path);
                continue;
            };
            if name.starts_with('.')
                || (!runtime.reserved_prefix.is_empty() && name.starts_with(&runtime.reserved_prefix))
            {
                debug!("Skipping private entry {:?}", path);
                continue;
            }
            if !is_valid_name(name) {
                warn!("Skipping tool with unsupported name {:?}", path);
                continue;
            }

            found.push(Candidate {
                name: name.to_string(),
                entry_point: path,
            });
        }

        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }
}
