//! Error types for installation operations.
//!
//! These errors never cross a component boundary: each component catches
//! them, logs them and turns them into a failed [`StepResult`]. Only
//! [`SetupError`] reaches the command-line host.
//!
//! [`StepResult`]: crate::StepResult

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while running an external process.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProcessError {
    /// The program could not be started.
    #[error("Failed to start {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Reading output or waiting for exit failed.
    #[error("I/O error while running {program}: {source}")]
    Io {
        /// Program being run.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The caller's cancellation token fired while waiting.
    #[error("Process was cancelled")]
    Cancelled,
}

/// Errors raised while querying platform facts.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProbeError {
    /// The query has no implementation on this platform.
    #[error("Not supported on this platform: {0}")]
    Unsupported(&'static str),

    /// The query command did not answer in time.
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    /// The query command ran but reported failure.
    #[error("{program} {}", exit_description(.code))]
    CommandFailed {
        /// Query program.
        program: String,
        /// Its exit code, when it had one.
        code: Option<i32>,
    },

    /// Any other I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn exit_description(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with code {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

/// Errors raised while downloading a file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DownloadError {
    /// The request could not be sent or the body could not be read.
    #[error("Request to {url} failed: {source}")]
    Request {
        /// Requested URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("HTTP {}: {}", .status.as_u16(), .status.canonical_reason().unwrap_or("Unknown"))]
    Status {
        /// Response status.
        status: reqwest::StatusCode,
    },

    /// Writing the destination file failed.
    #[error("Failed to write {path}: {source}")]
    Io {
        /// Destination being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The caller's cancellation token fired.
    #[error("Download was cancelled")]
    Cancelled,
}

/// Errors raised while wiring up the installer host.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SetupError {
    /// The HTTP client could not be built.
    #[error("Failed to create HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// The settings file could not be read.
    #[error("Failed to read settings file {path}: {source}")]
    ConfigRead {
        /// Settings file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON for [`InstallerSettings`].
    ///
    /// [`InstallerSettings`]: crate::InstallerSettings
    #[error("Invalid settings file {path}: {source}")]
    ConfigParse {
        /// Settings file path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_error_display() {
        let error = ProcessError::Spawn {
            program: "dism.exe".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert!(error.to_string().contains("Failed to start dism.exe"));
        assert_eq!(ProcessError::Cancelled.to_string(), "Process was cancelled");
    }

    #[test]
    fn test_probe_error_display() {
        let error = ProbeError::CommandFailed {
            program: "powershell".to_string(),
            code: Some(1),
        };
        assert_eq!(error.to_string(), "powershell exited with code 1");

        let error = ProbeError::CommandFailed {
            program: "powershell".to_string(),
            code: None,
        };
        assert_eq!(error.to_string(), "powershell was terminated by a signal");

        let error = ProbeError::Unsupported("registry lookup");
        assert!(error.to_string().contains("registry lookup"));
    }

    #[test]
    fn test_download_status_display() {
        let error = DownloadError::Status {
            status: reqwest::StatusCode::NOT_FOUND,
        };
        assert_eq!(error.to_string(), "HTTP 404: Not Found");
    }

    #[test]
    fn test_setup_error_display() {
        let error = SetupError::ConfigRead {
            path: PathBuf::from("settings.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(error.to_string().contains("settings.json"));
    }
}
