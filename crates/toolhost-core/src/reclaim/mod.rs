pub mod reclaimer;

pub use reclaimer::{ReclaimReport, Reclaimer};
