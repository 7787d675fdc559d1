//! # chim-installer
//!
//! Installation orchestration for the CHIM mod package.
//!
//! The crate prepares a machine for the mod in a fixed sequence of
//! independently failable steps: system requirement checks, the
//! redistributable runtime, OS features, the mod archive (manual download
//! fallback), extraction with 7-Zip, and the vendor scripts. Every
//! component-level operation returns a [`StepResult`] value instead of an
//! error, so a failing step can never abort the host.
//!
//! ## Features
//!
//! - [`SystemChecker`] with the advisory virtualization rule in [`aggregate`]
//! - [`PrerequisiteInstaller`] for the runtime and OS features
//! - [`FileAcquisition`] and [`Downloader`] for archives and installers
//! - [`ArchiveExtractor`] with friendly 7-Zip exit messages
//! - [`ScriptExecutor`] for vendor scripts and restarts
//! - [`Orchestrator`] running the whole pipeline
//!
//! External programs, host queries and the browser are reached through the
//! [`ProcessRunner`], [`SystemProbe`] and [`UrlOpener`] traits.
//!
//! ## Example
//!
//! ```rust,no_run
//! use chim_installer::{InstallerSettings, Orchestrator, Services};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let settings = InstallerSettings::default();
//!     let services = Services::host(&settings).expect("HTTP client");
//!     let orchestrator = Orchestrator::new(settings, services);
//!
//!     for check in orchestrator.run_checks().await {
//!         println!("{}: {}", check.kind.display_name(), check.message());
//!     }
//! }
//! ```

mod acquire;
mod check_kind;
mod detection;
mod extract;
mod install;
mod process;
mod settings;
mod step_result;
mod system;

#[cfg(test)]
mod testing;

pub use acquire::{Downloader, FileAcquisition, SystemOpener, UrlOpener, CHUNK_SIZE};
pub use check_kind::CheckKind;
pub use detection::{resolve_on_path, resolve_well_known, DottedVersion, Resolver, ToolLocator, DEFAULT_RESOLVERS};
pub use extract::{friendly_exit_message, ArchiveExtractor};
pub use install::{
    format_bytes, format_gib, CompletionOutcome, DownloadError, InstallPhase, Orchestrator, PipelineReport,
    PrerequisiteInstaller, ProbeError, ProcessError, ProgressEvent, ProgressFn, ScriptExecutor, Services,
    SetupError, Stage, VendorScript,
};
pub use process::{CommandSpec, LineFn, OutputStream, ProcessOutput, ProcessRunner, SystemRunner};
pub use settings::{ExtractionToolSettings, InstallerSettings, RequiredFeatureSet};
pub use step_result::{CheckResult, StepResult, StepStatus};
pub use system::{aggregate, HostProbe, SystemChecker, SystemProbe};
