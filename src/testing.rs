//! In-memory fakes for the injected capabilities.

use crate::acquire::UrlOpener;
use crate::install::{ProbeError, ProcessError};
use crate::process::{CommandSpec, LineFn, OutputStream, ProcessOutput, ProcessRunner};
use crate::system::SystemProbe;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

type Responder = Box<dyn Fn(&CommandSpec) -> Result<ProcessOutput, ProcessError> + Send + Sync>;

/// Records every command and answers from a responder closure, replaying
/// the answer's lines through the line callback.
pub(crate) struct FakeRunner {
    responder: Responder,
    calls: Mutex<Vec<CommandSpec>>,
}

impl FakeRunner {
    pub(crate) fn new<F>(responder: F) -> Self
    where
        F: Fn(&CommandSpec) -> Result<ProcessOutput, ProcessError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_output(output: ProcessOutput) -> Self {
        Self::new(move |_| Ok(output.clone()))
    }

    pub(crate) fn succeeding() -> Self {
        Self::with_output(ProcessOutput::default())
    }

    pub(crate) fn cancelled() -> Self {
        Self::new(|_| Err(ProcessError::Cancelled))
    }

    pub(crate) fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(
        &self,
        command: &CommandSpec,
        cancel: &CancellationToken,
        on_line: LineFn<'_>,
    ) -> Result<ProcessOutput, ProcessError> {
        self.calls.lock().unwrap().push(command.clone());
        if cancel.is_cancelled() {
            return Err(ProcessError::Cancelled);
        }
        let output = (self.responder)(command)?;
        for line in &output.stdout {
            on_line(OutputStream::Stdout, line);
        }
        for line in &output.stderr {
            on_line(OutputStream::Stderr, line);
        }
        Ok(output)
    }
}

/// Scripted host facts.
pub(crate) struct FakeProbe {
    pub(crate) elevated: bool,
    pub(crate) virtualization: bool,
    pub(crate) virtualization_error: bool,
    pub(crate) free_space: u64,
    pub(crate) runtime_version: Option<String>,
    pub(crate) runtime_unsupported: bool,
}

impl Default for FakeProbe {
    fn default() -> Self {
        Self {
            elevated: true,
            virtualization: true,
            virtualization_error: false,
            free_space: 1 << 40,
            runtime_version: None,
            runtime_unsupported: false,
        }
    }
}

#[async_trait]
impl SystemProbe for FakeProbe {
    async fn is_elevated(&self) -> Result<bool, ProbeError> {
        Ok(self.elevated)
    }

    async fn virtualization_enabled(&self) -> Result<bool, ProbeError> {
        if self.virtualization_error {
            return Err(ProbeError::Timeout(std::time::Duration::from_secs(10)));
        }
        Ok(self.virtualization)
    }

    async fn available_space(&self, _volume: &Path) -> Result<u64, ProbeError> {
        Ok(self.free_space)
    }

    async fn installed_runtime_version(&self) -> Result<Option<String>, ProbeError> {
        if self.runtime_unsupported {
            return Err(ProbeError::Unsupported("registry lookup"));
        }
        Ok(self.runtime_version.clone())
    }
}

/// Remembers every URL it was asked to open.
#[derive(Default)]
pub(crate) struct RecordingOpener {
    opened: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingOpener {
    pub(crate) fn failing() -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub(crate) fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl UrlOpener for RecordingOpener {
    fn open(&self, url: &str) -> std::io::Result<()> {
        self.opened.lock().unwrap().push(url.to_string());
        if self.fail {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "no browser"));
        }
        Ok(())
    }
}
