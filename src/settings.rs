//! Installer settings.
//!
//! This module provides [`InstallerSettings`], which gathers every
//! load-bearing constant of an installation run: vendor file names, URLs,
//! version floors, tool names and timings. Defaults match the shipped mod
//! package; a JSON settings file may override any subset of fields.

use crate::install::SetupError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Ordered list of OS feature identifiers that must all be enabled.
///
/// Each feature is checked and enabled independently, in list order.
///
/// # Example
///
/// ```rust
/// use chim_installer::RequiredFeatureSet;
///
/// let set = RequiredFeatureSet::new(["VirtualMachinePlatform", "HypervisorPlatform"]);
/// assert_eq!(set.len(), 2);
/// assert_eq!(set.iter().next(), Some("VirtualMachinePlatform"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequiredFeatureSet(Vec<String>);

impl RequiredFeatureSet {
    /// Build a feature set from identifiers, keeping their order.
    pub fn new<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(features.into_iter().map(Into::into).collect())
    }

    /// Iterate over the feature identifiers in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for RequiredFeatureSet {
    fn default() -> Self {
        Self::new([
            "VirtualMachinePlatform",
            "HypervisorPlatform",
            "Microsoft-Windows-Subsystem-Linux",
        ])
    }
}

/// Where to look for the archive extraction tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionToolSettings {
    /// Executable name searched on PATH.
    pub binary_name: String,

    /// Full paths probed when the PATH lookup fails.
    pub well_known_paths: Vec<PathBuf>,
}

impl Default for ExtractionToolSettings {
    fn default() -> Self {
        #[cfg(windows)]
        let well_known_paths = vec![
            PathBuf::from(r"C:\Program Files\7-Zip\7z.exe"),
            PathBuf::from(r"C:\Program Files (x86)\7-Zip\7z.exe"),
        ];
        #[cfg(not(windows))]
        let well_known_paths = vec![
            PathBuf::from("/usr/bin/7z"),
            PathBuf::from("/usr/local/bin/7z"),
            PathBuf::from("/opt/homebrew/bin/7z"),
        ];

        Self {
            binary_name: "7z".to_string(),
            well_known_paths,
        }
    }
}

/// Settings for one installation run.
///
/// # Example
///
/// ```rust
/// use chim_installer::InstallerSettings;
///
/// let settings = InstallerSettings {
///     install_root: "/tmp/chim".into(),
///     between_scripts_pause_secs: 0,
///     ..Default::default()
/// };
/// assert!(settings.archive_path().ends_with(&settings.archive_file_name));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerSettings {
    /// Installation root; the archive lives directly under it and is
    /// extracted into it.
    pub install_root: PathBuf,

    /// Directory name of the vendor package inside the installation root.
    pub vendor_package_dir: String,

    /// Exact file name of the mod archive.
    pub archive_file_name: String,

    /// Vendor page where the archive can be downloaded by hand.
    pub download_page_url: String,

    /// Direct download URL of the redistributable runtime installer.
    pub runtime_installer_url: String,

    /// Oldest acceptable redistributable version (dotted, up to 4 parts).
    pub runtime_min_version: String,

    /// Arguments for a silent, no-restart runtime install.
    pub runtime_installer_args: Vec<String>,

    /// OS features that must be enabled.
    pub required_features: RequiredFeatureSet,

    /// Feature query/enable tool.
    pub feature_tool: String,

    /// Minimum free space on the installation volume, in bytes.
    pub min_disk_space: u64,

    /// Extraction tool discovery.
    pub extraction_tool: ExtractionToolSettings,

    /// Pause between the two vendor scripts, in seconds.
    pub between_scripts_pause_secs: u64,

    /// Overall HTTP request timeout, in seconds.
    pub http_timeout_secs: u64,

    /// User agent sent with HTTP requests.
    pub user_agent: String,

    /// Directory for temporary downloads.
    pub temp_dir: PathBuf,

    /// Countdown passed to the restart facility, in seconds.
    pub restart_countdown_secs: u32,

    /// Message shown by the restart facility.
    pub restart_message: String,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        #[cfg(windows)]
        let install_root = PathBuf::from(r"C:\CHIM");
        #[cfg(not(windows))]
        let install_root = PathBuf::from("CHIM");

        Self {
            install_root,
            vendor_package_dir: "DwemerAI4Skyrim3".to_string(),
            archive_file_name: "DwemerAI4Skyrim3-126330-1-2-0-1746980508.7z".to_string(),
            download_page_url:
                "https://www.nexusmods.com/skyrimspecialedition/mods/126330?tab=files&file_id=626114"
                    .to_string(),
            runtime_installer_url: "https://aka.ms/vs/17/release/vc_redist.x64.exe".to_string(),
            runtime_min_version: "14.36.32532.0".to_string(),
            runtime_installer_args: vec!["/quiet".to_string(), "/norestart".to_string()],
            required_features: RequiredFeatureSet::default(),
            feature_tool: "dism.exe".to_string(),
            min_disk_space: 15 * (1 << 30),
            extraction_tool: ExtractionToolSettings::default(),
            between_scripts_pause_secs: 2,
            http_timeout_secs: 300,
            user_agent: concat!("chim-installer/", env!("CARGO_PKG_VERSION")).to_string(),
            temp_dir: std::env::temp_dir(),
            restart_countdown_secs: 10,
            restart_message: "CHIM AI installation requires a system restart to complete."
                .to_string(),
        }
    }
}

impl InstallerSettings {
    /// Load settings from a JSON file; absent keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, SetupError> {
        let text = std::fs::read_to_string(path).map_err(|source| SetupError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| SetupError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Full path of the expected archive under the installation root.
    pub fn archive_path(&self) -> PathBuf {
        self.install_root.join(&self.archive_file_name)
    }

    /// Root of the extracted vendor package.
    pub fn vendor_package_path(&self) -> PathBuf {
        self.install_root.join(&self.vendor_package_dir)
    }

    /// Pause between the two vendor scripts.
    pub fn between_scripts_pause(&self) -> Duration {
        Duration::from_secs(self.between_scripts_pause_secs)
    }

    /// Overall HTTP request timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// The volume used for the disk-space check: the nearest existing
    /// ancestor of the installation root.
    ///
    /// Relative roots are resolved against the current directory first.
    pub fn install_volume(&self) -> PathBuf {
        nearest_existing_ancestor(&self.install_root)
    }
}

fn nearest_existing_ancestor(path: &Path) -> PathBuf {
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(e) => {
                tracing::warn!("Cannot resolve current directory: {}", e);
                path.to_path_buf()
            }
        }
    };

    resolved
        .ancestors()
        .map(|p| if p.as_os_str().is_empty() { Path::new(".") } else { p })
        .find(|p| p.exists())
        .map(Path::to_path_buf)
        .unwrap_or(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constants() {
        let settings = InstallerSettings::default();
        assert_eq!(
            settings.archive_file_name,
            "DwemerAI4Skyrim3-126330-1-2-0-1746980508.7z"
        );
        assert_eq!(settings.runtime_min_version, "14.36.32532.0");
        assert_eq!(settings.runtime_installer_args, vec!["/quiet", "/norestart"]);
        assert_eq!(settings.between_scripts_pause(), Duration::from_secs(2));
        assert_eq!(settings.http_timeout(), Duration::from_secs(300));
        assert_eq!(settings.min_disk_space, 16_106_127_360);
    }

    #[test]
    fn test_default_feature_order() {
        let settings = InstallerSettings::default();
        let features: Vec<_> = settings.required_features.iter().collect();
        assert_eq!(
            features,
            vec![
                "VirtualMachinePlatform",
                "HypervisorPlatform",
                "Microsoft-Windows-Subsystem-Linux"
            ]
        );
    }

    #[test]
    fn test_archive_path_is_directly_under_root() {
        let settings = InstallerSettings {
            install_root: PathBuf::from("/games/CHIM"),
            ..Default::default()
        };
        assert_eq!(
            settings.archive_path(),
            PathBuf::from("/games/CHIM/DwemerAI4Skyrim3-126330-1-2-0-1746980508.7z")
        );
        assert_eq!(
            settings.vendor_package_path(),
            PathBuf::from("/games/CHIM/DwemerAI4Skyrim3")
        );
    }

    #[test]
    fn test_install_volume_walks_up_to_existing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let settings = InstallerSettings {
            install_root: dir.path().join("not").join("yet").join("created"),
            ..Default::default()
        };
        assert_eq!(settings.install_volume(), dir.path());
    }

    #[test]
    fn test_install_volume_for_relative_uncreated_root() {
        let settings = InstallerSettings {
            install_root: PathBuf::from("chim-relative-root-not-yet-created"),
            ..Default::default()
        };
        let volume = settings.install_volume();
        assert!(volume.exists());
        assert_eq!(volume, std::env::current_dir().unwrap());
    }

    #[test]
    fn test_pause_and_timeout_read_as_plain_seconds() {
        let json = r#"{ "between_scripts_pause_secs": 5, "http_timeout_secs": 60 }"#;
        let settings: InstallerSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.between_scripts_pause(), Duration::from_secs(5));
        assert_eq!(settings.http_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "install_root": "/srv/chim", "min_disk_space": 1024 }"#;
        let settings: InstallerSettings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.install_root, PathBuf::from("/srv/chim"));
        assert_eq!(settings.min_disk_space, 1024);
        assert_eq!(settings.feature_tool, "dism.exe");
        assert_eq!(settings.required_features.len(), 3);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "feature_tool": "C:\\Windows\\System32\\dism.exe" }"#).unwrap();
        let settings = InstallerSettings::from_json_file(&path).unwrap();
        assert_eq!(settings.feature_tool, r"C:\Windows\System32\dism.exe");

        let missing = InstallerSettings::from_json_file(&dir.path().join("absent.json"));
        assert!(matches!(missing, Err(SetupError::ConfigRead { .. })));

        std::fs::write(&path, "{ not json").unwrap();
        let invalid = InstallerSettings::from_json_file(&path);
        assert!(matches!(invalid, Err(SetupError::ConfigParse { .. })));
    }

    #[test]
    fn test_feature_set_from_json_array() {
        let json = r#"{ "required_features": ["A", "B"] }"#;
        let settings: InstallerSettings = serde_json::from_str(json).unwrap();
        let features: Vec<_> = settings.required_features.iter().collect();
        assert_eq!(features, vec!["A", "B"]);
    }
}
