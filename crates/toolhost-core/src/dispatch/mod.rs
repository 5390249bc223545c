pub mod dispatcher;
pub mod process;

pub use dispatcher::Dispatcher;
pub use process::{DispatchOutput, Invocation};
