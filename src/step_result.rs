//! Result records produced by every installation step.

use crate::CheckKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How a step ended.
///
/// Cancellation is kept apart from failure so callers can tell
/// "the user stopped this" from "this broke".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    /// The step completed successfully.
    Succeeded,
    /// The step failed; the message says why.
    Failed,
    /// The step was stopped through its cancellation token.
    Cancelled,
}

/// Outcome of a single installation step.
///
/// One shape is shared by every step (checks, downloads, extraction,
/// prerequisite installation, vendor scripts). Fields that do not apply to
/// a step stay `None`/`false`.
///
/// A failed result always carries a non-empty message. When an external
/// process ran, `exit_code` is populated.
///
/// # Example
///
/// ```rust
/// use chim_installer::StepResult;
///
/// let result = StepResult::failure("7-Zip not found")
///     .with_details("Please install 7-Zip from https://www.7-zip.org/");
/// assert!(!result.is_success());
/// assert!(!result.is_cancelled());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// How the step ended.
    pub status: StepStatus,

    /// Human-readable summary.
    pub message: String,

    /// Structured error detail or diagnostics (captured output, hints).
    pub details: Option<String>,

    /// Exit code of the external process, if one ran.
    pub exit_code: Option<i32>,

    /// Whether the system must restart for the step to take effect.
    pub requires_restart: bool,

    /// Path produced or resolved by the step (downloaded file, tool, ...).
    pub path: Option<PathBuf>,

    /// Size in bytes of the file at `path`, when known.
    pub file_size: Option<u64>,
}

impl StepResult {
    fn new(status: StepStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
            exit_code: None,
            requires_restart: false,
            path: None,
            file_size: None,
        }
    }

    /// A successful result.
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(StepStatus::Succeeded, message)
    }

    /// A failed result.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(StepStatus::Failed, message)
    }

    /// A cancelled result. Cancellation never carries error details.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(StepStatus::Cancelled, message)
    }

    /// Attach detail text.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Attach the exit code of the process that ran.
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Set the restart flag.
    pub fn with_restart(mut self, requires_restart: bool) -> Self {
        self.requires_restart = requires_restart;
        self
    }

    /// Attach a resolved path.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach a file size.
    pub fn with_file_size(mut self, size: u64) -> Self {
        self.file_size = Some(size);
        self
    }

    /// Whether the step succeeded.
    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Succeeded
    }

    /// Whether the step was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.status == StepStatus::Cancelled
    }

    /// Path attached to the result, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// A [`StepResult`] tagged with the requirement it checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Which requirement was checked.
    pub kind: CheckKind,
    /// The outcome.
    pub result: StepResult,
}

impl CheckResult {
    /// Tag a result with its check kind.
    pub fn new(kind: CheckKind, result: StepResult) -> Self {
        Self { kind, result }
    }

    /// Whether the check passed.
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }

    /// Whether this result is a failure that must halt the installation.
    pub fn is_fatal_failure(&self) -> bool {
        !self.is_success() && !self.kind.is_advisory()
    }

    /// The check's message.
    pub fn message(&self) -> &str {
        &self.result.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_result() {
        let result = StepResult::success("Archive extracted successfully")
            .with_exit_code(0)
            .with_path("/tmp/out");

        assert!(result.is_success());
        assert!(!result.is_cancelled());
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.path(), Some(Path::new("/tmp/out")));
        assert!(result.details.is_none());
    }

    #[test]
    fn test_failure_result() {
        let result = StepResult::failure("Distribution installation failed")
            .with_details("Exit code: 3")
            .with_exit_code(3);

        assert!(!result.is_success());
        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(result.details.as_deref(), Some("Exit code: 3"));
    }

    #[test]
    fn test_cancelled_result_has_no_details() {
        let result = StepResult::cancelled("Download was cancelled");

        assert!(result.is_cancelled());
        assert!(!result.is_success());
        assert!(result.details.is_none());
    }

    #[test]
    fn test_restart_flag_defaults_false() {
        assert!(!StepResult::success("ok").requires_restart);
        assert!(StepResult::success("ok").with_restart(true).requires_restart);
    }

    #[test]
    fn test_check_result_fatality() {
        let virt = CheckResult::new(
            CheckKind::Virtualization,
            StepResult::failure("Virtualization is NOT enabled in the BIOS."),
        );
        assert!(!virt.is_success());
        assert!(!virt.is_fatal_failure());

        let admin = CheckResult::new(
            CheckKind::AdminRights,
            StepResult::failure("Administrator privileges required."),
        );
        assert!(admin.is_fatal_failure());

        let disk = CheckResult::new(CheckKind::DiskSpace, StepResult::success("ok"));
        assert!(!disk.is_fatal_failure());
    }
}
