//! Host queries and system requirement checks.

mod checks;
mod probe;

pub use checks::{aggregate, SystemChecker};
pub use probe::{HostProbe, SystemProbe};
