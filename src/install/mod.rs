//! Installation steps and their orchestration.
//!
//! - [`PrerequisiteInstaller`]: redistributable runtime and OS features
//! - [`ScriptExecutor`]: vendor scripts and system restart
//! - [`Orchestrator`]: the full pipeline, stage by stage
//!
//! Progress flows through a [`ProgressFn`] callback and cancellation through
//! a `tokio_util` `CancellationToken` shared by every long-running step.

mod errors;
mod executor;
mod pipeline;
mod prereq;
mod progress;

pub use errors::{DownloadError, ProbeError, ProcessError, SetupError};
pub use executor::{CompletionOutcome, InstallPhase, ScriptExecutor, VendorScript};
pub use pipeline::{Orchestrator, PipelineReport, Services, Stage};
pub use prereq::PrerequisiteInstaller;
pub use progress::{format_bytes, format_gib, ProgressEvent, ProgressFn};
