//! External process execution with streamed output.
//!
//! Every external program the installer touches (feature tool, extraction
//! tool, vendor scripts, runtime installer, restart facility) goes through
//! the [`ProcessRunner`] trait, so orchestration logic can be exercised with
//! a fake runner.

use crate::install::ProcessError;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// A command to execute.
///
/// # Example
///
/// ```rust
/// use chim_installer::CommandSpec;
///
/// let cmd = CommandSpec::new("dism.exe")
///     .arg("/Online")
///     .arg("/Get-FeatureInfo")
///     .arg("/FeatureName:VirtualMachinePlatform");
/// assert_eq!(cmd.args.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path.
    pub program: PathBuf,

    /// Arguments, passed verbatim (no shell quoting).
    pub args: Vec<String>,

    /// Working directory; inherits the caller's when `None`.
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    /// Start a command for `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Whether any argument equals `needle`.
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// Callback invoked once per non-empty output line, as it arrives.
pub type LineFn<'a> = &'a (dyn Fn(OutputStream, &str) + Send + Sync);

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    /// Non-empty stdout lines in arrival order.
    pub stdout: Vec<String>,
    /// Non-empty stderr lines in arrival order.
    pub stderr: Vec<String>,
}

impl ProcessOutput {
    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout joined with newlines.
    pub fn stdout_text(&self) -> String {
        self.stdout.join("\n")
    }

    /// Stderr joined with newlines.
    pub fn stderr_text(&self) -> String {
        self.stderr.join("\n")
    }

    /// Diagnostic block with exit code, output and error text.
    pub fn diagnostics(&self) -> String {
        format!(
            "Exit code: {}\nOutput: {}\nError: {}",
            self.exit_code,
            self.stdout_text(),
            self.stderr_text()
        )
    }
}

/// Runs external programs.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `command` to completion.
    ///
    /// `on_line` sees each non-empty output line as it arrives. If `cancel`
    /// fires first, returns [`ProcessError::Cancelled`]; the child is not
    /// guaranteed to be terminated.
    async fn run(
        &self,
        command: &CommandSpec,
        cancel: &CancellationToken,
        on_line: LineFn<'_>,
    ) -> Result<ProcessOutput, ProcessError>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(
        &self,
        command: &CommandSpec,
        cancel: &CancellationToken,
        on_line: LineFn<'_>,
    ) -> Result<ProcessOutput, ProcessError> {
        let program = command.program.display().to_string();
        tracing::debug!("Running {}", command);

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;

        let io_err = |source: std::io::Error| ProcessError::Io {
            program: program.clone(),
            source,
        };
        let missing_pipe = || std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe not captured");

        let mut stdout = BufReader::new(child.stdout.take().ok_or_else(missing_pipe).map_err(io_err)?);
        let mut stderr = BufReader::new(child.stderr.take().ok_or_else(missing_pipe).map_err(io_err)?);
        let (mut out_buf, mut err_buf) = (Vec::new(), Vec::new());
        let (mut out_done, mut err_done) = (false, false);
        let mut output = ProcessOutput::default();

        while !(out_done && err_done) {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ProcessError::Cancelled),
                read = next_line(&mut stdout, &mut out_buf), if !out_done => {
                    match read.map_err(io_err)? {
                        Some(line) => {
                            on_line(OutputStream::Stdout, &line);
                            output.stdout.push(line);
                        }
                        None => out_done = true,
                    }
                }
                read = next_line(&mut stderr, &mut err_buf), if !err_done => {
                    match read.map_err(io_err)? {
                        Some(line) => {
                            on_line(OutputStream::Stderr, &line);
                            output.stderr.push(line);
                        }
                        None => err_done = true,
                    }
                }
            }
        }

        let status = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProcessError::Cancelled),
            status = child.wait() => status.map_err(io_err)?,
        };
        output.exit_code = status.code().unwrap_or(-1);
        tracing::debug!("{} exited with code {}", program, output.exit_code);

        Ok(output)
    }
}

/// Read the next non-empty line, decoding lossily.
///
/// Partial reads stay in `buf`, so the future may be dropped by `select!`
/// and polled again without losing data. Returns `None` at end of stream.
async fn next_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let read = reader.read_until(b'\n', buf).await?;
        if read == 0 && buf.is_empty() {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(buf)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        buf.clear();
        if !line.is_empty() {
            return Ok(Some(line));
        }
        if read == 0 {
            return Ok(None);
        }
    }
}
