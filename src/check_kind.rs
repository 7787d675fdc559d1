//! Check kind enum classifying system requirement results.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// The kind of system requirement a check result describes.
///
/// Every check run by the system checker is tagged with one of these kinds.
/// The kind decides whether a failure blocks the installation: all kinds are
/// fatal except [`CheckKind::Virtualization`], which is advisory only.
///
/// # Example
///
/// ```rust
/// use chim_installer::CheckKind;
///
/// for kind in CheckKind::all() {
///     println!("{}: advisory={}", kind.display_name(), kind.is_advisory());
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter)]
pub enum CheckKind {
    /// The process runs with elevated (administrator/root) privileges.
    AdminRights,
    /// The target volume has enough free space.
    DiskSpace,
    /// Hardware virtualization is available.
    Virtualization,
    /// The archive extraction tool (7-Zip) can be found.
    ExtractionTool,
    /// Aggregate of all other checks.
    Overall,
}

impl CheckKind {
    /// Human-readable name suitable for reports.
    ///
    /// ```rust
    /// use chim_installer::CheckKind;
    ///
    /// assert_eq!(CheckKind::ExtractionTool.display_name(), "7-Zip");
    /// ```
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::AdminRights => "Administrator rights",
            Self::DiskSpace => "Disk space",
            Self::Virtualization => "Virtualization",
            Self::ExtractionTool => "7-Zip",
            Self::Overall => "Overall",
        }
    }

    /// Whether a failure of this kind is reported as a warning only.
    pub fn is_advisory(&self) -> bool {
        matches!(self, Self::Virtualization)
    }

    /// Iterator over all check kinds, in declaration order.
    pub fn all() -> impl Iterator<Item = Self> {
        <Self as IntoEnumIterator>::iter()
    }
}
