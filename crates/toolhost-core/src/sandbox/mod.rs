pub mod lock;
pub mod provisioner;

pub use lock::ProvisionLock;
pub use provisioner::{Provisioner, READY_MARKER};
