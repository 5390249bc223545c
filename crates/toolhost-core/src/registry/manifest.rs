use super::descriptor::ToolManifest;
use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

/// Static declaration files that stand in for introspection. The first one
/// found wins and the entry point is never executed.
const SIDECAR_SUFFIXES: &[&str] = &["tool.yaml", "tool.yml", "tool.json"];

/// Locate `<name>.tool.yaml|yml|json` next to the entry point.
pub fn find_sidecar(tools_dir: &Path, name: &str) -> Option<PathBuf> {
    SIDECAR_SUFFIXES
        .iter()
        .map(|suffix| tools_dir.join(format!("{name}.{suffix}")))
        .find(|p| p.is_file())
}

pub async fn load_sidecar(path: &Path) -> Result<ToolManifest> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow!("cannot read {}: {}", path.display(), e))?;
    parse_sidecar(path, &content)
}

fn parse_sidecar(path: &Path, content: &str) -> Result<ToolManifest> {
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    if is_json {
        serde_json::from_str(content).map_err(|e| anyhow!("invalid {}: {}", path.display(), e))
    } else if content.trim().is_empty() {
        // An empty YAML file declares nothing.
        Ok(ToolManifest::default())
    } else {
        serde_yaml::from_str(content).map_err(|e| anyhow!("invalid {}: {}", path.display(), e))
    }
}
