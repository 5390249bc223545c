use super::descriptor::ToolManifest;
use crate::config::runtime::{render_command, RuntimeConfig};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Loads a Python tool as a module (without running its `__main__` block) and
/// prints its `INPUT_SCHEMA`, `REQUIRES` and `MODES` as one JSON document.
/// Anything the module prints while importing goes to stderr.
pub const PYTHON_PROBE: &str = r#"import importlib.util, json, os, sys
path = os.path.abspath(sys.argv[1])
sys.path.insert(0, os.path.dirname(path))
out, sys.stdout = sys.stdout, sys.stderr
spec = importlib.util.spec_from_file_location("__toolhost_probe__", path)
module = importlib.util.module_from_spec(spec)
spec.loader.exec_module(module)
sys.stdout = out
json.dump({
    "input_schema": getattr(module, "INPUT_SCHEMA", []),
    "dependencies": list(getattr(module, "REQUIRES", [])),
    "modes": getattr(module, "MODES", None),
}, sys.stdout, default=str)
"#;

/// Extracts a tool's declarations without invoking its primary behaviour.
#[async_trait]
pub trait Introspector: Send + Sync {
    async fn describe(&self, name: &str, entry_point: &Path) -> Result<ToolManifest>;
}

/// Runs the configured `describe` command in its own process, so a tool that
/// fails to import, hangs, or crashes only fails its own descriptor.
pub struct ProbeIntrospector {
    runtime: RuntimeConfig,
}

impl ProbeIntrospector {
    pub fn new(runtime: RuntimeConfig) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl Introspector for ProbeIntrospector {
    async fn describe(&self, name: &str, entry_point: &Path) -> Result<ToolManifest> {
        let interpreter = self.runtime.interpreter.to_string_lossy().into_owned();
        let entry = entry_point.to_string_lossy().into_owned();
        let (program, args) = render_command(
            &self.runtime.describe,
            &[
                ("interpreter", interpreter.as_str()),
                ("entry", entry.as_str()),
                ("name", name),
            ],
        )
        .ok_or_else(|| anyhow!("runtime.describe command is empty"))?;

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = entry_point.parent() {
            cmd.current_dir(dir);
        }

        let timeout_secs = self.runtime.introspect_timeout_secs;
        let output = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output())
            .await
            .map_err(|_| anyhow!("introspection timed out after {}s", timeout_secs))?
            .map_err(|e| anyhow!("failed to run '{}': {}", program, e))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!(tool = %name, "probe stderr: {}", stderr.trim());
        }
        if !output.status.success() {
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .map(str::trim)
                .unwrap_or("no diagnostic output");
            bail!("introspection exited with {}: {}", output.status, reason);
        }

        serde_json::from_slice::<ToolManifest>(&output.stdout)
            .map_err(|e| anyhow!("introspection output is not a valid descriptor: {}", e))
    }
}
