//! System requirement checks.

use crate::detection::ToolLocator;
use crate::install::format_gib;
use crate::system::SystemProbe;
use crate::{CheckKind, CheckResult, StepResult};
use std::path::Path;
use std::sync::Arc;

/// Runs the system requirement checks.
///
/// Every check is total: probe errors are logged and reported as a failed
/// [`CheckResult`] carrying the error text.
#[derive(Clone)]
pub struct SystemChecker {
    probe: Arc<dyn SystemProbe>,
    locator: ToolLocator,
}

impl SystemChecker {
    /// Create a checker over `probe`, locating the extraction tool with `locator`.
    pub fn new(probe: Arc<dyn SystemProbe>, locator: ToolLocator) -> Self {
        Self { probe, locator }
    }

    /// Pass iff the process is elevated.
    pub async fn check_admin_rights(&self) -> CheckResult {
        let result = match self.probe.is_elevated().await {
            Ok(true) => StepResult::success("Running with administrator privileges."),
            Ok(false) => StepResult::failure("Administrator privileges required.")
                .with_details("Please run the installer as administrator to continue."),
            Err(e) => {
                tracing::error!("Failed to check administrator privileges: {}", e);
                StepResult::failure("Failed to check administrator privileges.").with_details(e.to_string())
            }
        };
        CheckResult::new(CheckKind::AdminRights, result)
    }

    /// Pass iff `volume` is ready and has at least `required` free bytes.
    pub async fn check_disk_space(&self, volume: &Path, required: u64) -> CheckResult {
        let label = volume.display();
        if !self.probe.volume_ready(volume) {
            return CheckResult::new(
                CheckKind::DiskSpace,
                StepResult::failure(format!("Drive {} is not ready or does not exist.", label)),
            );
        }

        let result = match self.probe.available_space(volume).await {
            Ok(available) => {
                let summary = format!(
                    "{} GB free (requires {} GB)",
                    format_gib(available),
                    format_gib(required)
                );
                if available >= required {
                    StepResult::success(format!("Sufficient disk space available: {}", summary))
                } else {
                    StepResult::failure(format!("Insufficient disk space: {}", summary)).with_details(format!(
                        "Free up space on {} or choose a different installation directory.",
                        label
                    ))
                }
            }
            Err(e) => {
                tracing::error!("Failed to check disk space on {}: {}", label, e);
                StepResult::failure("Failed to check disk space.").with_details(e.to_string())
            }
        };
        CheckResult::new(CheckKind::DiskSpace, result)
    }

    /// Pass iff hardware virtualization is enabled. Advisory only.
    pub async fn check_virtualization(&self) -> CheckResult {
        let result = match self.probe.virtualization_enabled().await {
            Ok(true) => StepResult::success("Virtualization is enabled in the BIOS."),
            Ok(false) => StepResult::failure("Virtualization is NOT enabled in the BIOS.").with_details(
                "Some features may not function correctly. Please enable Virtualization \
                 (Intel VT-x or AMD-V) in your system's BIOS settings if needed.",
            ),
            Err(e) => {
                tracing::warn!("Failed to check virtualization: {}", e);
                StepResult::failure("Failed to check virtualization status.").with_details(e.to_string())
            }
        };
        CheckResult::new(CheckKind::Virtualization, result)
    }

    /// Pass iff the extraction tool can be located; the result carries its path.
    pub async fn check_extraction_tool(&self) -> CheckResult {
        let result = match self.locator.locate() {
            Some(path) => StepResult::success(format!("7-Zip found at: {}", path.display()))
                .with_details(path.display().to_string())
                .with_path(path),
            None => StepResult::failure("7-Zip not found.").with_details(
                "7-Zip is required to extract the mod files. \
                 Please install 7-Zip from https://www.7-zip.org/",
            ),
        };
        CheckResult::new(CheckKind::ExtractionTool, result)
    }

    /// Run every check in display order, then append the overall verdict.
    ///
    /// The returned list holds admin rights, virtualization, disk space and
    /// extraction tool results followed by the [`CheckKind::Overall`] entry.
    pub async fn run_all_checks(&self, volume: &Path, required: u64) -> Vec<CheckResult> {
        tracing::info!("Running system checks");
        let mut results = vec![
            self.check_admin_rights().await,
            self.check_virtualization().await,
            self.check_disk_space(volume, required).await,
            self.check_extraction_tool().await,
        ];
        for check in &results {
            tracing::info!(
                "{}: {} ({})",
                check.kind.display_name(),
                if check.is_success() { "pass" } else { "fail" },
                check.message()
            );
        }
        let overall = aggregate(&results);
        results.push(overall);
        results
    }
}

/// Fold individual check results into the overall verdict.
///
/// Any failed non-advisory check fails the whole set. Advisory failures
/// alone produce a success that carries them as warnings.
///
/// # Example
///
/// ```rust
/// use chim_installer::{aggregate, CheckKind, CheckResult, StepResult};
///
/// let checks = vec![
///     CheckResult::new(CheckKind::AdminRights, StepResult::success("ok")),
///     CheckResult::new(CheckKind::Virtualization, StepResult::failure("off")),
/// ];
/// let overall = aggregate(&checks);
/// assert!(overall.is_success());
/// assert!(overall.result.details.is_some());
/// ```
pub fn aggregate(checks: &[CheckResult]) -> CheckResult {
    let fatal: Vec<&CheckResult> = checks
        .iter()
        .filter(|c| c.kind != CheckKind::Overall && c.is_fatal_failure())
        .collect();

    if !fatal.is_empty() {
        let lines: Vec<String> = fatal.iter().map(|c| format!("• {}", c.message())).collect();
        return CheckResult::new(
            CheckKind::Overall,
            StepResult::failure(format!(
                "System check failed: {} critical issue(s) found.",
                fatal.len()
            ))
            .with_details(lines.join("\n")),
        );
    }

    let warnings: Vec<String> = checks
        .iter()
        .filter(|c| c.kind.is_advisory() && !c.is_success())
        .map(|c| match &c.result.details {
            Some(details) => format!("⚠ {}: {}", c.message(), details),
            None => format!("⚠ {}", c.message()),
        })
        .collect();

    let result = if warnings.is_empty() {
        StepResult::success("All system checks passed successfully.")
    } else {
        StepResult::success("System check passed with warnings.").with_details(warnings.join("\n"))
    };
    CheckResult::new(CheckKind::Overall, result)
}
