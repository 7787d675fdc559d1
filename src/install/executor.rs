//! Vendor script execution and system restart.
//!
//! The mod package ships two batch scripts which finish the installation.
//! [`ScriptExecutor::complete_installation`] runs them in order, stopping at
//! the first failure; nothing is retried or rolled back.

use crate::install::{ProcessError, ProgressEvent, ProgressFn};
use crate::process::{CommandSpec, OutputStream, ProcessRunner};
use crate::{InstallerSettings, StepResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A vendor script shipped inside the mod package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VendorScript {
    /// Installs the Linux distribution the server runs in.
    Distro,
    /// Installs the GPU acceleration components.
    CudaComponents,
}

impl VendorScript {
    /// Path segments below the vendor package directory.
    pub fn relative_path(&self) -> &'static [&'static str] {
        match self {
            Self::Distro => &["1) INSTALL Distro.bat"],
            Self::CudaComponents => &[
                "Tools",
                "Components",
                "NVIDIA GPU Components",
                "1) REQUIRED CUDA INSTALL ME!.bat",
            ],
        }
    }

    /// Full path of the script under `package_dir`.
    pub fn path_in(&self, package_dir: &Path) -> PathBuf {
        self.relative_path()
            .iter()
            .fold(package_dir.to_path_buf(), |path, segment| path.join(segment))
    }

    /// Prefix for forwarded output lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Distro => "Distro Install",
            Self::CudaComponents => "CUDA Install",
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            Self::Distro => "Distribution",
            Self::CudaComponents => "CUDA",
        }
    }

    fn lower_noun(&self) -> &'static str {
        match self {
            Self::Distro => "distribution",
            Self::CudaComponents => "CUDA",
        }
    }
}

/// Where the script phase is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InstallPhase {
    /// Nothing has run yet.
    #[default]
    NotStarted,
    /// The distribution install script is running.
    RunningDistroScript,
    /// Holding between the two scripts.
    AwaitingBetweenStepPause,
    /// The CUDA components script is running.
    RunningSecondaryScript,
    /// Both scripts exited with code 0.
    Completed,
    /// A script was missing, failed or was cancelled.
    Failed,
}

/// Outcome of the script phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    /// Terminal phase: `Completed` or `Failed`.
    pub phase: InstallPhase,
    /// Per-script results, in execution order.
    pub scripts: Vec<(VendorScript, StepResult)>,
    /// Overall result.
    pub result: StepResult,
}

/// Runs vendor scripts and the restart facility.
#[derive(Clone)]
pub struct ScriptExecutor {
    runner: Arc<dyn ProcessRunner>,
    package_dir: PathBuf,
    pause: Duration,
    restart_countdown_secs: u32,
    restart_message: String,
}

impl ScriptExecutor {
    /// Create an executor for the vendor package under the configured root.
    pub fn new(runner: Arc<dyn ProcessRunner>, settings: &InstallerSettings) -> Self {
        Self {
            runner,
            package_dir: settings.vendor_package_path(),
            pause: settings.between_scripts_pause(),
            restart_countdown_secs: settings.restart_countdown_secs,
            restart_message: settings.restart_message.clone(),
        }
    }

    /// Run one vendor script from its own directory.
    ///
    /// Stdout lines are forwarded as progress prefixed with the script's
    /// label; stderr lines go to the log only. A missing script fails
    /// without spawning anything.
    pub async fn run_script(
        &self,
        script: VendorScript,
        cancel: &CancellationToken,
        on_progress: ProgressFn<'_>,
    ) -> StepResult {
        let path = script.path_in(&self.package_dir);
        if !path.is_file() {
            tracing::error!("{} script not found at {}", script.label(), path.display());
            return StepResult::failure(format!("{} install script not found", script.noun()))
                .with_details(format!("Expected file: {}", path.display()));
        }

        let mut command = CommandSpec::new(&path);
        if let Some(dir) = path.parent() {
            command = command.current_dir(dir);
        }
        tracing::info!("Running {}", path.display());

        let label = script.label();
        let on_line = |stream: OutputStream, line: &str| match stream {
            OutputStream::Stdout => on_progress(ProgressEvent::status(format!("{}: {}", label, line))),
            OutputStream::Stderr => tracing::warn!("{}: {}", label, line),
        };

        match self.runner.run(&command, cancel, &on_line).await {
            Ok(output) if output.success() => {
                StepResult::success(format!("{} installation completed successfully", script.noun())).with_exit_code(0)
            }
            Ok(output) => {
                tracing::error!("{} script exited with {}", label, output.exit_code);
                StepResult::failure(format!("{} installation failed", script.noun()))
                    .with_exit_code(output.exit_code)
                    .with_details(output.diagnostics())
            }
            Err(ProcessError::Cancelled) => {
                StepResult::cancelled(format!("{} installation was cancelled", script.noun()))
            }
            Err(e) => {
                tracing::error!("Error running {} script: {}", label, e);
                StepResult::failure(format!("Error running {} installation", script.lower_noun()))
                    .with_details(e.to_string())
            }
        }
    }

    /// Run both vendor scripts.
    ///
    /// `restart_required` is the flag accumulated by the prerequisite phase;
    /// a completed run carries it on its result.
    pub async fn complete_installation(
        &self,
        restart_required: bool,
        cancel: &CancellationToken,
        on_progress: ProgressFn<'_>,
    ) -> CompletionOutcome {
        let mut scripts = Vec::new();

        // Step 1: distribution script
        tracing::info!("Phase: {:?}", InstallPhase::RunningDistroScript);
        on_progress(ProgressEvent::status("Running distribution installation script..."));
        let distro = self.run_script(VendorScript::Distro, cancel, on_progress).await;
        scripts.push((VendorScript::Distro, distro.clone()));
        if !distro.is_success() {
            return failed(scripts, &distro, "Failed during distribution installation");
        }

        // Step 2: give the caution message time to register
        tracing::info!("Phase: {:?}", InstallPhase::AwaitingBetweenStepPause);
        on_progress(ProgressEvent::status(
            "Please let the installation complete. Do not close any windows that may appear.",
        ));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let result = StepResult::cancelled("Installation was cancelled");
                return failed(scripts, &result, "Installation was cancelled");
            }
            _ = tokio::time::sleep(self.pause) => {}
        }

        // Step 3: GPU components script
        tracing::info!("Phase: {:?}", InstallPhase::RunningSecondaryScript);
        on_progress(ProgressEvent::status("Running CUDA installation script..."));
        let cuda = self.run_script(VendorScript::CudaComponents, cancel, on_progress).await;
        scripts.push((VendorScript::CudaComponents, cuda.clone()));
        if !cuda.is_success() {
            return failed(scripts, &cuda, "Failed during CUDA installation");
        }

        tracing::info!("Phase: {:?}", InstallPhase::Completed);
        CompletionOutcome {
            phase: InstallPhase::Completed,
            scripts,
            result: StepResult::success(
                "CHIM AI installation completed successfully. The automated installation steps have finished.",
            )
            .with_restart(restart_required),
        }
    }

    /// Ask the platform to restart the machine after a short countdown.
    ///
    /// Succeeds once the shutdown facility accepts the request.
    pub async fn restart_system(&self, cancel: &CancellationToken) -> StepResult {
        let command = restart_command(self.restart_countdown_secs, &self.restart_message);
        tracing::info!("Requesting system restart: {}", command);

        match self.runner.run(&command, cancel, &|_, line| tracing::info!("shutdown: {}", line)).await {
            Ok(output) if output.success() => StepResult::success(format!(
                "System restart initiated. The computer will restart in {} seconds.",
                self.restart_countdown_secs
            ))
            .with_exit_code(0),
            Ok(output) => StepResult::failure("Failed to initiate system restart")
                .with_exit_code(output.exit_code)
                .with_details(output.diagnostics()),
            Err(ProcessError::Cancelled) => StepResult::cancelled("System restart was cancelled"),
            Err(e) => {
                tracing::error!("Error initiating system restart: {}", e);
                StepResult::failure("Error initiating system restart").with_details(e.to_string())
            }
        }
    }
}

fn failed(scripts: Vec<(VendorScript, StepResult)>, cause: &StepResult, message: &str) -> CompletionOutcome {
    tracing::info!("Phase: {:?}", InstallPhase::Failed);
    let mut details = cause.message.clone();
    if let Some(extra) = &cause.details {
        details.push('\n');
        details.push_str(extra);
    }
    let result = if cause.is_cancelled() {
        StepResult::cancelled(message)
    } else {
        let mut result = StepResult::failure(message).with_details(details);
        result.exit_code = cause.exit_code;
        result
    };
    CompletionOutcome {
        phase: InstallPhase::Failed,
        scripts,
        result,
    }
}

#[cfg(windows)]
fn restart_command(countdown_secs: u32, message: &str) -> CommandSpec {
    CommandSpec::new("shutdown").args([
        "/r".to_string(),
        "/t".to_string(),
        countdown_secs.to_string(),
        "/c".to_string(),
        message.to_string(),
    ])
}

#[cfg(not(windows))]
fn restart_command(countdown_secs: u32, message: &str) -> CommandSpec {
    let minutes = countdown_secs.div_ceil(60).max(1);
    CommandSpec::new("shutdown").args(["-r".to_string(), format!("+{}", minutes), message.to_string()])
}
