//! Prerequisite installation: the redistributable runtime and OS features.

use crate::acquire::Downloader;
use crate::detection::DottedVersion;
use crate::install::{ProbeError, ProcessError, ProgressEvent, ProgressFn};
use crate::process::{CommandSpec, OutputStream, ProcessOutput, ProcessRunner};
use crate::system::SystemProbe;
use crate::{InstallerSettings, StepResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Default file name for the downloaded runtime installer.
const RUNTIME_INSTALLER_FILE: &str = "vc_redist.x64.exe";

/// Ensures the redistributable runtime and required OS features are present.
///
/// Every operation is total: errors are logged and folded into the
/// returned [`StepResult`].
#[derive(Clone)]
pub struct PrerequisiteInstaller {
    runner: Arc<dyn ProcessRunner>,
    probe: Arc<dyn SystemProbe>,
    downloader: Downloader,
    settings: InstallerSettings,
}

impl PrerequisiteInstaller {
    /// Create an installer from injected capabilities.
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        probe: Arc<dyn SystemProbe>,
        downloader: Downloader,
        settings: InstallerSettings,
    ) -> Self {
        Self {
            runner,
            probe,
            downloader,
            settings,
        }
    }

    /// Install the redistributable runtime unless a new enough one is present.
    ///
    /// The installer is downloaded to the temporary directory, run silently
    /// and deleted afterwards whatever the outcome.
    pub async fn ensure_runtime(&self, cancel: &CancellationToken, on_progress: ProgressFn<'_>) -> StepResult {
        on_progress(ProgressEvent::status("Checking Visual C++ Redistributable..."));

        let Some(minimum) = DottedVersion::parse(&self.settings.runtime_min_version) else {
            return StepResult::failure("Invalid minimum Visual C++ Redistributable version")
                .with_details(self.settings.runtime_min_version.clone());
        };

        match self.probe.installed_runtime_version().await {
            Ok(Some(marker)) => match DottedVersion::parse(&marker) {
                Some(installed) if installed >= minimum => {
                    tracing::info!("Visual C++ Redistributable {} is current", installed);
                    return StepResult::success("Visual C++ Redistributable is already up to date.");
                }
                Some(installed) => {
                    tracing::info!("Visual C++ Redistributable {} is older than {}", installed, minimum)
                }
                None => tracing::warn!("Unparseable Visual C++ Redistributable version: {}", marker),
            },
            Ok(None) => tracing::info!("Visual C++ Redistributable is not installed"),
            Err(e @ ProbeError::Unsupported(_)) => {
                tracing::error!("Cannot check Visual C++ Redistributable: {}", e);
                return StepResult::failure("Unable to check Visual C++ Redistributable").with_details(e.to_string());
            }
            Err(e) => tracing::warn!("Failed to read Visual C++ Redistributable version: {}", e),
        }

        let installer = TempFileGuard(self.settings.temp_dir.join(installer_file_name(
            &self.settings.runtime_installer_url,
        )));

        on_progress(ProgressEvent::status("Downloading Visual C++ Redistributable..."));
        let download = self
            .downloader
            .download_file(&self.settings.runtime_installer_url, installer.path(), cancel, on_progress)
            .await;
        if download.is_cancelled() {
            return download;
        }
        if !download.is_success() {
            let mut details = download.message;
            if let Some(extra) = download.details {
                details.push_str(": ");
                details.push_str(&extra);
            }
            return StepResult::failure("Failed to download Visual C++ Redistributable").with_details(details);
        }

        on_progress(ProgressEvent::status("Installing Visual C++ Redistributable..."));
        let command = CommandSpec::new(installer.path()).args(self.settings.runtime_installer_args.iter().cloned());
        match self.runner.run(&command, cancel, &log_lines).await {
            Ok(output) if output.success() => {
                tracing::info!("Visual C++ Redistributable installed");
                StepResult::success("Visual C++ Redistributable installed successfully").with_exit_code(0)
            }
            Ok(output) => {
                tracing::error!("Visual C++ Redistributable installer exited with {}", output.exit_code);
                StepResult::failure("Visual C++ Redistributable installation failed")
                    .with_exit_code(output.exit_code)
                    .with_details(output.diagnostics())
            }
            Err(ProcessError::Cancelled) => {
                StepResult::cancelled("Visual C++ Redistributable installation was cancelled")
            }
            Err(e) => {
                tracing::error!("Error installing Visual C++ Redistributable: {}", e);
                StepResult::failure("Error installing Visual C++ Redistributable").with_details(e.to_string())
            }
        }
    }

    /// Whether `feature` is currently enabled. Query failures count as "no".
    pub async fn is_feature_enabled(&self, feature: &str, cancel: &CancellationToken) -> Result<bool, ProcessError> {
        let command = CommandSpec::new(&self.settings.feature_tool).args([
            "/Online".to_string(),
            "/Get-FeatureInfo".to_string(),
            format!("/FeatureName:{}", feature),
        ]);
        match self.runner.run(&command, cancel, &log_lines).await {
            Ok(output) => Ok(output.success() && reports_enabled(&output)),
            Err(ProcessError::Cancelled) => Err(ProcessError::Cancelled),
            Err(e) => {
                tracing::warn!("Failed to query feature {}: {}", feature, e);
                Ok(false)
            }
        }
    }

    /// Enable one OS feature unless it is already enabled.
    ///
    /// The result requests a restart when the tool's standard output
    /// mentions one.
    pub async fn enable_feature(
        &self,
        feature: &str,
        cancel: &CancellationToken,
        on_progress: ProgressFn<'_>,
    ) -> StepResult {
        on_progress(ProgressEvent::status(format!("Checking feature {}...", feature)));
        match self.is_feature_enabled(feature, cancel).await {
            Ok(true) => return StepResult::success(format!("Feature '{}' is already enabled.", feature)),
            Ok(false) => {}
            Err(_) => return StepResult::cancelled(format!("Enabling feature '{}' was cancelled", feature)),
        }

        on_progress(ProgressEvent::status(format!("Enabling feature {}...", feature)));
        let command = CommandSpec::new(&self.settings.feature_tool).args([
            "/Online".to_string(),
            "/Enable-Feature".to_string(),
            format!("/FeatureName:{}", feature),
            "/All".to_string(),
            "/NoRestart".to_string(),
        ]);

        match self.runner.run(&command, cancel, &log_lines).await {
            Ok(output) => {
                let restart = mentions_restart(&output);
                if output.success() {
                    tracing::info!("Enabled feature {} (restart required: {})", feature, restart);
                    StepResult::success(format!("Feature '{}' enabled successfully", feature))
                        .with_exit_code(0)
                        .with_restart(restart)
                } else {
                    tracing::error!("Enabling feature {} exited with {}", feature, output.exit_code);
                    StepResult::failure(format!("Failed to enable feature '{}'", feature))
                        .with_exit_code(output.exit_code)
                        .with_details(output.diagnostics())
                        .with_restart(restart)
                }
            }
            Err(ProcessError::Cancelled) => StepResult::cancelled(format!("Enabling feature '{}' was cancelled", feature)),
            Err(e) => {
                tracing::error!("Error enabling feature {}: {}", feature, e);
                StepResult::failure(format!("Error enabling feature '{}'", feature)).with_details(e.to_string())
            }
        }
    }

    /// Enable every required feature, in order.
    ///
    /// A failed feature does not stop the remaining ones; cancellation does.
    /// The result's restart flag is the OR over all features.
    pub async fn enable_all_features(&self, cancel: &CancellationToken, on_progress: ProgressFn<'_>) -> StepResult {
        let mut restart = false;
        let mut failed = Vec::new();
        let mut failure_details = Vec::new();

        for feature in self.settings.required_features.iter() {
            let result = self.enable_feature(feature, cancel, on_progress).await;
            if result.is_cancelled() {
                return result.with_restart(restart);
            }
            restart |= result.requires_restart;
            if !result.is_success() {
                failure_details.push(result.details.unwrap_or(result.message));
                failed.push(feature);
            }
        }

        if failed.is_empty() {
            StepResult::success("All required Windows features enabled successfully").with_restart(restart)
        } else {
            StepResult::failure(format!(
                "Failed to enable {} Windows feature(s): {}",
                failed.len(),
                failed.join(", ")
            ))
            .with_details(failure_details.join("\n"))
            .with_restart(restart)
        }
    }
}

fn log_lines(stream: OutputStream, line: &str) {
    match stream {
        OutputStream::Stdout => tracing::debug!("{}", line),
        OutputStream::Stderr => tracing::warn!("{}", line),
    }
}

fn reports_enabled(output: &ProcessOutput) -> bool {
    output.stdout_text().to_lowercase().contains("state : enabled")
}

fn mentions_restart(output: &ProcessOutput) -> bool {
    output.stdout_text().to_lowercase().contains("restart")
}

fn installer_file_name(url: &str) -> String {
    url.rsplit('/')
        .next()
        .map(|segment| segment.split(['?', '#']).next().unwrap_or_default())
        .filter(|name| !name.is_empty())
        .unwrap_or(RUNTIME_INSTALLER_FILE)
        .to_string()
}

/// Deletes the wrapped file when dropped.
struct TempFileGuard(PathBuf);

impl TempFileGuard {
    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.0) {
            Ok(()) => tracing::debug!("Removed {}", self.0.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove {}: {}", self.0.display(), e),
        }
    }
}
