pub mod descriptor;
pub mod introspect;
pub mod loader;
pub mod manifest;
#[allow(clippy::module_inception)]
pub mod registry;

pub use descriptor::{Extraction, FieldDescriptor, Mode, ToolDescriptor, ToolManifest, ToolSnapshot};
pub use introspect::{Introspector, ProbeIntrospector};
pub use registry::ToolRegistry;
