//! The full installation pipeline.

use crate::acquire::{Downloader, FileAcquisition, SystemOpener, UrlOpener};
use crate::detection::ToolLocator;
use crate::extract::ArchiveExtractor;
use crate::install::{
    CompletionOutcome, InstallPhase, PrerequisiteInstaller, ProgressEvent, ProgressFn, ScriptExecutor, SetupError,
};
use crate::process::{ProcessRunner, SystemRunner};
use crate::system::{HostProbe, SystemChecker, SystemProbe};
use crate::{CheckResult, InstallerSettings, StepResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Capabilities the pipeline talks to the outside world through.
#[derive(Clone)]
pub struct Services {
    /// Runs external programs.
    pub runner: Arc<dyn ProcessRunner>,
    /// Answers host queries.
    pub probe: Arc<dyn SystemProbe>,
    /// Opens the vendor download page.
    pub opener: Arc<dyn UrlOpener>,
    /// Fetches prerequisite installers.
    pub downloader: Downloader,
}

impl Services {
    /// Services backed by the real machine.
    pub fn host(settings: &InstallerSettings) -> Result<Self, SetupError> {
        Ok(Self {
            runner: Arc::new(SystemRunner),
            probe: Arc::new(HostProbe),
            opener: Arc::new(SystemOpener),
            downloader: Downloader::new(settings)?,
        })
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Admin rights, virtualization, disk space and 7-Zip.
    SystemChecks,
    /// Visual C++ Redistributable.
    Runtime,
    /// Required Windows features.
    Features,
    /// Mod archive presence.
    Acquisition,
    /// Archive extraction into the installation root.
    Extraction,
    /// Vendor install scripts.
    Scripts,
}

impl Stage {
    /// Human-readable stage name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SystemChecks => "System checks",
            Self::Runtime => "Visual C++ Redistributable",
            Self::Features => "Windows features",
            Self::Acquisition => "Mod file",
            Self::Extraction => "Extraction",
            Self::Scripts => "Vendor scripts",
        }
    }
}

/// Everything a pipeline run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Individual system check results, overall verdict last.
    pub checks: Vec<CheckResult>,
    /// Executed stages with their results, in order.
    pub stages: Vec<(Stage, StepResult)>,
    /// Where the script phase ended.
    pub phase: InstallPhase,
    /// Advisory warnings carried past the checks.
    pub warnings: Option<String>,
    /// Whether a restart is needed to finish.
    pub restart_required: bool,
    /// Terminal result of the run.
    pub outcome: StepResult,
}

impl PipelineReport {
    /// The stage the run stopped at, if it did not complete.
    pub fn failed_stage(&self) -> Option<Stage> {
        self.stages
            .iter()
            .find(|(_, result)| !result.is_success())
            .map(|(stage, _)| *stage)
    }
}

/// Runs the installation steps in order, stopping at the first fatal failure.
///
/// # Example
///
/// ```rust,no_run
/// use chim_installer::{InstallerSettings, Orchestrator, Services};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() {
///     let settings = InstallerSettings::default();
///     let services = Services::host(&settings).expect("HTTP client");
///     let orchestrator = Orchestrator::new(settings, services);
///
///     let report = orchestrator
///         .run(&CancellationToken::new(), &|event| println!("{}", event.message()))
///         .await;
///     println!("{}", report.outcome.message);
/// }
/// ```
#[derive(Clone)]
pub struct Orchestrator {
    settings: InstallerSettings,
    checker: SystemChecker,
    prerequisites: PrerequisiteInstaller,
    acquisition: FileAcquisition,
    extractor: ArchiveExtractor,
    scripts: ScriptExecutor,
}

impl Orchestrator {
    /// Wire every component from `settings` and `services`.
    pub fn new(settings: InstallerSettings, services: Services) -> Self {
        let locator = ToolLocator::for_extraction_tool(&settings.extraction_tool);
        Self {
            checker: SystemChecker::new(services.probe.clone(), locator.clone()),
            prerequisites: PrerequisiteInstaller::new(
                services.runner.clone(),
                services.probe.clone(),
                services.downloader.clone(),
                settings.clone(),
            ),
            acquisition: FileAcquisition::new(
                settings.archive_file_name.clone(),
                settings.download_page_url.clone(),
                services.opener.clone(),
            ),
            extractor: ArchiveExtractor::new(services.runner.clone(), locator),
            scripts: ScriptExecutor::new(services.runner, &settings),
            settings,
        }
    }

    /// The vendor script executor, also used for restarts.
    pub fn scripts(&self) -> &ScriptExecutor {
        &self.scripts
    }

    /// Run the system checks against the installation volume.
    pub async fn run_checks(&self) -> Vec<CheckResult> {
        self.checker
            .run_all_checks(&self.settings.install_volume(), self.settings.min_disk_space)
            .await
    }

    /// Run the whole pipeline.
    pub async fn run(&self, cancel: &CancellationToken, on_progress: ProgressFn<'_>) -> PipelineReport {
        let mut run = Run::default();

        // Step 1: System checks
        on_progress(ProgressEvent::status("Checking system requirements..."));
        run.checks = self.run_checks().await;
        let overall = run
            .checks
            .last()
            .map(|c| c.result.clone())
            .unwrap_or_else(|| StepResult::failure("System checks produced no result"));
        if overall.is_success() {
            run.warnings = overall.details.clone();
        }
        if !run.record(Stage::SystemChecks, overall) || run.cancelled(cancel) {
            return run.finish();
        }

        // Step 2: Redistributable runtime
        let runtime = self.prerequisites.ensure_runtime(cancel, on_progress).await;
        if !run.record(Stage::Runtime, runtime) || run.cancelled(cancel) {
            return run.finish();
        }

        // Step 3: OS features
        let features = self.prerequisites.enable_all_features(cancel, on_progress).await;
        run.restart_required |= features.requires_restart;
        if !run.record(Stage::Features, features) || run.cancelled(cancel) {
            return run.finish();
        }

        // Step 4: Archive
        let root = &self.settings.install_root;
        let acquisition = match tokio::fs::create_dir_all(root).await {
            Ok(()) => self.acquisition.ensure_archive(root, on_progress),
            Err(e) => {
                tracing::error!("Failed to create {}: {}", root.display(), e);
                StepResult::failure(format!("Failed to create installation directory {}", root.display()))
                    .with_details(e.to_string())
            }
        };
        let archive = acquisition.path.clone();
        if !run.record(Stage::Acquisition, acquisition) || run.cancelled(cancel) {
            return run.finish();
        }
        let archive = archive.unwrap_or_else(|| self.settings.archive_path());

        // Step 5: Extraction
        let extraction = self.extractor.extract(&archive, root, cancel, on_progress).await;
        if !run.record(Stage::Extraction, extraction) || run.cancelled(cancel) {
            return run.finish();
        }

        // Step 6: Vendor scripts
        let CompletionOutcome { phase, result, .. } = self
            .scripts
            .complete_installation(run.restart_required, cancel, on_progress)
            .await;
        run.phase = phase;
        run.record(Stage::Scripts, result);
        run.finish()
    }
}

/// Mutable state of one run, including the restart accumulator.
#[derive(Default)]
struct Run {
    checks: Vec<CheckResult>,
    stages: Vec<(Stage, StepResult)>,
    phase: InstallPhase,
    warnings: Option<String>,
    restart_required: bool,
    terminal: Option<StepResult>,
}

impl Run {
    /// Record a stage result; returns whether the run may continue.
    fn record(&mut self, stage: Stage, result: StepResult) -> bool {
        let ok = result.is_success();
        if ok {
            tracing::info!("{}: {}", stage.display_name(), result.message);
        } else {
            tracing::error!("{}: {}", stage.display_name(), result.message);
            self.terminal = Some(result.clone());
        }
        self.stages.push((stage, result));
        ok
    }

    fn cancelled(&mut self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            tracing::info!("Installation was cancelled");
            self.terminal = Some(StepResult::cancelled("Installation was cancelled"));
            return true;
        }
        false
    }

    fn finish(self) -> PipelineReport {
        let outcome = match self.terminal {
            Some(result) => result,
            None => self
                .stages
                .last()
                .map(|(_, result)| result.clone())
                .unwrap_or_else(|| StepResult::failure("Installation did not run")),
        };
        let phase = match (self.phase, outcome.is_success()) {
            (InstallPhase::NotStarted, false) => InstallPhase::Failed,
            (phase, _) => phase,
        };
        PipelineReport {
            checks: self.checks,
            stages: self.stages,
            phase,
            warnings: self.warnings,
            restart_required: self.restart_required,
            outcome,
        }
    }
}
