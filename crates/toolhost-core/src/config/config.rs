use super::{Layout, RuntimeConfig};
use crate::error::{Result, ToolhostError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Runtime configuration.
///
/// Example `<root>/config.json` (or `.toolhost.json` in the working directory):
/// ```json
/// {
///   "storage_dir": "/mnt/models",
///   "runtime": {
///     "interpreter": "/usr/bin/python3.11",
///     "storage_env_var": "MODEL_CACHE_DIR"
///   }
/// }
/// ```
/// Relative directories are resolved against `root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolhostConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default)]
    pub tools_dir: Option<PathBuf>,
    #[serde(default)]
    pub sandboxes_dir: Option<PathBuf>,
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

fn default_root() -> PathBuf {
    ToolhostConfig::resolve_path("")
}

impl Default for ToolhostConfig {
    fn default() -> Self {
        Self::with_root(default_root())
    }
}

impl ToolhostConfig {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tools_dir: None,
            sandboxes_dir: None,
            storage_dir: None,
            runtime: RuntimeConfig::default(),
        }
    }

    /// Load `<root>/config.json` (if any) and overlay `.toolhost.json` from the
    /// working directory. `root` defaults to `~/.toolhost`.
    pub fn load(root: Option<&Path>) -> Result<Self> {
        let local = std::env::current_dir()
            .ok()
            .map(|d| d.join(".toolhost.json"))
            .filter(|p| p.exists());
        Self::load_from(root, local.as_deref())
    }

    pub fn load_from(root: Option<&Path>, local_override: Option<&Path>) -> Result<Self> {
        // Tools run with their own directory as cwd, so every derived path
        // must stay valid after a chdir.
        let root = std::path::absolute(root.map(Path::to_path_buf).unwrap_or_else(default_root))?;
        let config_path = root.join("config.json");

        let mut config = if config_path.exists() {
            let data = std::fs::read_to_string(&config_path)?;
            serde_json::from_str::<ToolhostConfig>(&data).map_err(|e| ToolhostError::Config {
                path: config_path.clone(),
                message: e.to_string(),
            })?
        } else {
            ToolhostConfig::default()
        };
        config.root = root.clone();

        if let Some(local) = local_override {
            let data = std::fs::read_to_string(local)?;
            let parse_err = |e: serde_json::Error| ToolhostError::Config {
                path: local.to_path_buf(),
                message: e.to_string(),
            };
            let override_val: serde_json::Value = serde_json::from_str(&data).map_err(parse_err)?;
            let mut base = serde_json::to_value(&config)?;
            if let (Some(base_obj), Some(over_obj)) =
                (base.as_object_mut(), override_val.as_object())
            {
                for (k, v) in over_obj {
                    base_obj.insert(k.clone(), v.clone());
                }
            }
            config = serde_json::from_value(base).map_err(parse_err)?;
            config.root = root;
        }

        Ok(config)
    }

    pub fn layout(&self) -> Layout {
        let defaults = Layout::under(&self.root);
        let pick = |over: &Option<PathBuf>, fallback: PathBuf| match over {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => self.root.join(p),
            None => fallback,
        };
        Layout {
            tools_dir: pick(&self.tools_dir, defaults.tools_dir),
            sandboxes_dir: pick(&self.sandboxes_dir, defaults.sandboxes_dir),
            storage_dir: pick(&self.storage_dir, defaults.storage_dir),
            locks_dir: defaults.locks_dir,
        }
    }

    pub fn resolve_path(relative: &str) -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".toolhost")
            .join(relative)
    }
}
