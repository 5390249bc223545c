use super::process::{DispatchOutput, Invocation};
use crate::config::{Layout, ToolhostConfig};
use crate::error::{Result, ToolhostError};
use crate::registry::{ToolDescriptor, ToolRegistry};
use crate::sandbox::Provisioner;
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

/// Runs one tool per call: resolve, provision, prepare storage, execute.
pub struct Dispatcher {
    config: ToolhostConfig,
    layout: Layout,
    registry: ToolRegistry,
    provisioner: Provisioner,
}

impl Dispatcher {
    pub fn new(config: &ToolhostConfig) -> Self {
        Self {
            config: config.clone(),
            layout: config.layout(),
            registry: ToolRegistry::new(config),
            provisioner: Provisioner::new(config),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn provisioner(&self) -> &Provisioner {
        &self.provisioner
    }

    /// Dispatch `payload` to the tool called `name`.
    ///
    /// A tool that runs and exits non-zero is still `Ok`: inspect
    /// [`DispatchOutput::success`] or call [`DispatchOutput::into_result`].
    /// Errors mean no tool result exists: unknown or broken tool, failed
    /// provisioning, missing interpreter.
    pub async fn run(&self, name: &str, payload: &Value) -> Result<DispatchOutput> {
        let descriptor = self.resolve(name).await?;
        let invocation = self.prepare(&descriptor).await?;
        let body = serde_json::to_vec(payload)?;

        info!(tool = %name, "--- Running tool: {} ---", name);
        let output = invocation.execute(body).await?;
        if output.success() {
            info!(tool = %name, "tool finished");
        } else {
            info!(tool = %name, "tool exited with {}", output.status);
        }
        Ok(output)
    }

    /// Look `name` up in a fresh snapshot. Broken tools are not dispatchable.
    pub async fn resolve(&self, name: &str) -> Result<ToolDescriptor> {
        match self.registry.get(name).await? {
            Some(d) if d.load_error().is_none() => Ok(d),
            _ => Err(ToolhostError::NotFound(name.to_string())),
        }
    }

    /// Select the interpreter (provisioning a sandbox when dependencies are
    /// declared) and create the storage directory.
    pub async fn prepare(&self, descriptor: &ToolDescriptor) -> Result<Invocation> {
        let name = descriptor.name.as_str();
        let interpreter = self.select_runtime(descriptor).await?;
        let storage = self.prepare_storage(name).await?;

        Ok(Invocation {
            name: name.to_string(),
            interpreter,
            entry_point: descriptor.entry_point().to_path_buf(),
            env: vec![(self.config.runtime.storage_env_var.clone(), storage)],
        })
    }

    pub async fn select_runtime(&self, descriptor: &ToolDescriptor) -> Result<PathBuf> {
        let dependencies = descriptor.dependencies();
        if dependencies.is_empty() {
            return Ok(self.config.runtime.interpreter.clone());
        }
        self.provisioner.provision(&descriptor.name, dependencies).await
    }

    pub async fn prepare_storage(&self, name: &str) -> Result<PathBuf> {
        let storage = self.layout.storage_path(name);
        tokio::fs::create_dir_all(&storage).await?;
        Ok(storage)
    }
}
