//! Tool and version detection.
//!
//! - `ToolLocator`: PATH lookup with well-known install path fallbacks
//! - `DottedVersion`: four-part version parsing and comparison

mod path_finder;
mod version;

pub use path_finder::{resolve_on_path, resolve_well_known, Resolver, ToolLocator, DEFAULT_RESOLVERS};
pub use version::DottedVersion;
