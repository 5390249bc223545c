use super::descriptor::{ToolDescriptor, ToolSnapshot};
use super::introspect::{Introspector, ProbeIntrospector};
use super::loader::{Candidate, ToolLoader};
use super::manifest::{find_sidecar, load_sidecar};
use crate::config::{Layout, ToolhostConfig};
use crate::error::Result;
use std::sync::Arc;
use tracing::{debug, warn};

/// Discovers tools and extracts their declarations.
///
/// Nothing is cached: every call to [`discover`](Self::discover) rescans the
/// tools directory and builds a new snapshot.
pub struct ToolRegistry {
    layout: Layout,
    config: ToolhostConfig,
    introspector: Arc<dyn Introspector>,
}

impl ToolRegistry {
    pub fn new(config: &ToolhostConfig) -> Self {
        Self {
            layout: config.layout(),
            config: config.clone(),
            introspector: Arc::new(ProbeIntrospector::new(config.runtime.clone())),
        }
    }

    /// Replace the introspector used for tools without a sidecar manifest.
    pub fn with_introspector(mut self, introspector: Arc<dyn Introspector>) -> Self {
        self.introspector = introspector;
        self
    }

    /// One descriptor per entry point. A tool whose declarations cannot be
    /// extracted is recorded as failed and never aborts the pass; only an
    /// unreadable tools directory is an error.
    pub async fn discover(&self) -> Result<ToolSnapshot> {
        let candidates = ToolLoader::scan(&self.layout.tools_dir, &self.config.runtime)?;
        let mut snapshot = ToolSnapshot::default();
        for candidate in candidates {
            snapshot.insert(self.describe(candidate).await);
        }
        Ok(snapshot)
    }

    /// Discover and return a single tool's descriptor.
    pub async fn get(&self, name: &str) -> Result<Option<ToolDescriptor>> {
        let snapshot = self.discover().await?;
        Ok(snapshot.get(name).cloned())
    }

    async fn describe(&self, candidate: Candidate) -> ToolDescriptor {
        let Candidate { name, entry_point } = candidate;

        let extracted = match find_sidecar(&self.layout.tools_dir, &name) {
            Some(sidecar) => {
                debug!(tool = %name, "reading sidecar manifest {:?}", sidecar);
                load_sidecar(&sidecar).await
            }
            None => self.introspector.describe(&name, &entry_point).await,
        };

        let checked = extracted.and_then(|manifest| {
            manifest.validate().map_err(anyhow::Error::msg)?;
            Ok(manifest)
        });

        match checked {
            Ok(manifest) => ToolDescriptor::loaded(name, entry_point, manifest),
            Err(e) => {
                warn!(tool = %name, "Error loading tool: {}", e);
                ToolDescriptor::failed(name, entry_point, format!("Error loading: {e}"))
            }
        }
    }
}
