//! Executable lookup through an ordered list of resolver strategies.

use crate::settings::ExtractionToolSettings;
use std::path::{Path, PathBuf};

/// One lookup strategy: given the binary name and the well-known install
/// paths, return a resolved executable or `None`.
pub type Resolver = fn(&str, &[PathBuf]) -> Option<PathBuf>;

/// Default strategies, tried in order.
pub const DEFAULT_RESOLVERS: &[Resolver] = &[resolve_on_path, resolve_well_known];

/// Locates an external tool.
///
/// Strategies run in order and the first hit wins. Every hit is verified to
/// exist on disk.
///
/// # Example
///
/// ```rust
/// use chim_installer::ToolLocator;
///
/// let locator = ToolLocator::new("definitely_not_a_real_tool_12345", Vec::new());
/// assert!(locator.locate().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct ToolLocator {
    binary_name: String,
    well_known_paths: Vec<PathBuf>,
    resolvers: Vec<Resolver>,
}

impl ToolLocator {
    /// Locator using the default strategies.
    pub fn new(binary_name: impl Into<String>, well_known_paths: Vec<PathBuf>) -> Self {
        Self {
            binary_name: binary_name.into(),
            well_known_paths,
            resolvers: DEFAULT_RESOLVERS.to_vec(),
        }
    }

    /// Locator for the configured extraction tool.
    pub fn for_extraction_tool(settings: &ExtractionToolSettings) -> Self {
        Self::new(&settings.binary_name, settings.well_known_paths.clone())
    }

    /// Replace the strategy list.
    pub fn with_resolvers(mut self, resolvers: Vec<Resolver>) -> Self {
        self.resolvers = resolvers;
        self
    }

    /// Find the tool. Never fails; `None` means not found.
    pub fn locate(&self) -> Option<PathBuf> {
        let found = self
            .resolvers
            .iter()
            .find_map(|resolve| resolve(&self.binary_name, &self.well_known_paths));
        match &found {
            Some(path) => tracing::debug!("Found {} at {}", self.binary_name, path.display()),
            None => tracing::debug!("{} not found", self.binary_name),
        }
        found
    }
}

/// PATH lookup via the `which` crate.
pub fn resolve_on_path(name: &str, _well_known: &[PathBuf]) -> Option<PathBuf> {
    which::which(name).ok().filter(|path| path.is_file())
}

/// Probe the fixed list of well-known install paths.
pub fn resolve_well_known(_name: &str, well_known: &[PathBuf]) -> Option<PathBuf> {
    well_known
        .iter()
        .map(PathBuf::as_path)
        .find(|path| is_existing_file(path))
        .map(Path::to_path_buf)
}

fn is_existing_file(path: &Path) -> bool {
    path.try_exists().unwrap_or(false) && path.is_file()
}
