#[allow(clippy::module_inception)]
pub mod config;
pub mod layout;
pub mod runtime;
pub use config::ToolhostConfig;
pub use layout::Layout;
pub use runtime::RuntimeConfig;
