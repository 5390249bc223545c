pub mod config;
pub mod dispatch;
pub mod error;
pub mod reclaim;
pub mod registry;
pub mod sandbox;

pub use config::{Layout, RuntimeConfig, ToolhostConfig};
pub use dispatch::{DispatchOutput, Dispatcher, Invocation};
pub use error::{Result, ToolhostError};
pub use reclaim::{ReclaimReport, Reclaimer};
pub use registry::{
    Extraction, FieldDescriptor, Introspector, Mode, ProbeIntrospector, ToolDescriptor,
    ToolManifest, ToolRegistry, ToolSnapshot,
};
pub use sandbox::{ProvisionLock, Provisioner, READY_MARKER};
