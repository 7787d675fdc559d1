//! Archive acquisition.
//!
//! The mod archive is never fetched automatically: when it is missing the
//! user is sent to the vendor download page and asked to place the file in
//! the installation root. Prerequisite installers are fetched with
//! [`Downloader`].

mod download;

pub use download::{Downloader, CHUNK_SIZE};

use crate::install::{ProgressEvent, ProgressFn};
use crate::StepResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opens URLs in the user's browser.
pub trait UrlOpener: Send + Sync {
    /// Open `url`.
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// [`UrlOpener`] using the platform's default handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) -> std::io::Result<()> {
        opener::open(url).map_err(std::io::Error::other)
    }
}

/// Locates the mod archive, falling back to a manual download.
#[derive(Clone)]
pub struct FileAcquisition {
    archive_file_name: String,
    download_page_url: String,
    opener: Arc<dyn UrlOpener>,
}

impl FileAcquisition {
    /// Create an acquisition step for `archive_file_name`.
    pub fn new(
        archive_file_name: impl Into<String>,
        download_page_url: impl Into<String>,
        opener: Arc<dyn UrlOpener>,
    ) -> Self {
        Self {
            archive_file_name: archive_file_name.into(),
            download_page_url: download_page_url.into(),
            opener,
        }
    }

    /// Full path of the expected archive in `target_dir`.
    pub fn expected_path(&self, target_dir: &Path) -> PathBuf {
        target_dir.join(&self.archive_file_name)
    }

    /// Whether `path` exists. I/O errors count as "does not exist".
    pub fn file_exists(&self, path: &Path) -> bool {
        match path.try_exists() {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!("Failed to check {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Succeed with the archive's path and size, or open the download page
    /// and fail with manual download instructions.
    pub fn ensure_archive(&self, target_dir: &Path, on_progress: ProgressFn<'_>) -> StepResult {
        on_progress(ProgressEvent::status("Checking for mod file..."));
        let path = self.expected_path(target_dir);

        if self.file_exists(&path) {
            return match std::fs::metadata(&path) {
                Ok(meta) => {
                    tracing::info!("Found mod archive at {}", path.display());
                    StepResult::success("Mod file found successfully")
                        .with_path(path)
                        .with_file_size(meta.len())
                }
                Err(e) => {
                    tracing::error!("Failed to read {}: {}", path.display(), e);
                    StepResult::failure("Error checking for mod file").with_details(e.to_string())
                }
            };
        }

        tracing::warn!("Mod archive not found at {}", path.display());
        on_progress(ProgressEvent::status("Mod file not found. Opening download page..."));
        if let Err(e) = self.opener.open(&self.download_page_url) {
            tracing::warn!("Failed to open {}: {}", self.download_page_url, e);
        }

        StepResult::failure("Mod file not found - manual download required").with_details(format!(
            "Please download '{}' from Nexus Mods and place it in: {}",
            self.archive_file_name,
            target_dir.display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingOpener;

    const ARCHIVE: &str = "DwemerAI4Skyrim3-126330-1-2-0-1746980508.7z";
    const PAGE: &str = "https://example.invalid/mods/126330";

    fn acquisition(opener: Arc<RecordingOpener>) -> FileAcquisition {
        FileAcquisition::new(ARCHIVE, PAGE, opener)
    }

    #[test]
    fn test_expected_path_is_exact_name() {
        let acq = acquisition(Arc::new(RecordingOpener::default()));
        assert_eq!(
            acq.expected_path(Path::new("/games/CHIM")),
            PathBuf::from("/games/CHIM").join(ARCHIVE)
        );
    }

    #[test]
    fn test_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let acq = acquisition(Arc::new(RecordingOpener::default()));
        let file = dir.path().join("present");
        std::fs::write(&file, b"x").unwrap();
        assert!(acq.file_exists(&file));
        assert!(!acq.file_exists(&dir.path().join("absent")));
    }

    #[test]
    fn test_archive_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ARCHIVE), vec![0u8; 1234]).unwrap();
        let opener = Arc::new(RecordingOpener::default());

        let result = acquisition(opener.clone()).ensure_archive(dir.path(), &|_| {});

        assert!(result.is_success());
        assert_eq!(result.message, "Mod file found successfully");
        assert_eq!(result.file_size, Some(1234));
        assert_eq!(result.path(), Some(dir.path().join(ARCHIVE).as_path()));
        assert!(opener.opened().is_empty());
    }

    #[test]
    fn test_archive_missing_opens_page_once() {
        let dir = tempfile::tempdir().unwrap();
        let opener = Arc::new(RecordingOpener::default());
        let events = std::sync::Mutex::new(Vec::new());

        let result = acquisition(opener.clone())
            .ensure_archive(dir.path(), &|e| events.lock().unwrap().push(e.message().to_string()));

        assert!(!result.is_success());
        assert_eq!(result.message, "Mod file not found - manual download required");
        let details = result.details.unwrap();
        assert!(details.contains(ARCHIVE));
        assert!(details.contains(&dir.path().display().to_string()));
        assert_eq!(opener.opened(), vec![PAGE.to_string()]);
        assert!(events
            .lock()
            .unwrap()
            .iter()
            .any(|m| m == "Mod file not found. Opening download page..."));
    }

    #[test]
    fn test_opener_failure_is_not_fatal_to_result() {
        let dir = tempfile::tempdir().unwrap();
        let opener = Arc::new(RecordingOpener::failing());
        let result = acquisition(opener.clone()).ensure_archive(dir.path(), &|_| {});
        assert!(!result.is_success());
        assert_eq!(opener.opened().len(), 1);
    }
}
