//! Archive extraction through the external 7-Zip tool.

use crate::detection::ToolLocator;
use crate::install::{ProcessError, ProgressEvent, ProgressFn};
use crate::process::{CommandSpec, OutputStream, ProcessRunner};
use crate::StepResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Unpacks archives with 7-Zip.
#[derive(Clone)]
pub struct ArchiveExtractor {
    runner: Arc<dyn ProcessRunner>,
    locator: ToolLocator,
}

impl ArchiveExtractor {
    /// Create an extractor running the tool found by `locator` through `runner`.
    pub fn new(runner: Arc<dyn ProcessRunner>, locator: ToolLocator) -> Self {
        Self { runner, locator }
    }

    /// Resolve the extraction tool, `None` when unavailable.
    pub fn locate_tool(&self) -> Option<PathBuf> {
        self.locator.locate()
    }

    /// Extract `archive` into `dest`, keeping full paths.
    ///
    /// Only output lines mentioning `Extracting` or containing `%` are
    /// forwarded to `on_progress`. A non-zero exit is translated with
    /// [`friendly_exit_message`]; the raw diagnostics always go to `details`.
    pub async fn extract(
        &self,
        archive: &Path,
        dest: &Path,
        cancel: &CancellationToken,
        on_progress: ProgressFn<'_>,
    ) -> StepResult {
        if !archive.is_file() {
            return StepResult::failure("Archive file not found")
                .with_details(format!("The file '{}' does not exist.", archive.display()));
        }

        let Some(tool) = self.locate_tool() else {
            return StepResult::failure("7-Zip not found").with_details(
                "7-Zip executable (7z.exe) not found or not in system PATH. \
                 Please install 7-Zip from https://www.7-zip.org/",
            );
        };

        if let Err(e) = tokio::fs::create_dir_all(dest).await {
            tracing::error!("Failed to create {}: {}", dest.display(), e);
            return StepResult::failure("Extraction failed due to an unexpected error").with_details(e.to_string());
        }

        on_progress(ProgressEvent::status(format!(
            "Extracting {}...",
            archive.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
        )));
        tracing::info!("Extracting {} to {}", archive.display(), dest.display());

        let command = CommandSpec::new(tool).args([
            "x".to_string(),
            archive.display().to_string(),
            format!("-o{}", dest.display()),
            "-y".to_string(),
        ]);
        let on_line = |stream: OutputStream, line: &str| match stream {
            OutputStream::Stdout if is_informative(line) => on_progress(ProgressEvent::status(line)),
            OutputStream::Stdout => {}
            OutputStream::Stderr => tracing::warn!("7-Zip: {}", line),
        };

        match self.runner.run(&command, cancel, &on_line).await {
            Ok(output) if output.success() => {
                on_progress(ProgressEvent::status("Extraction completed"));
                StepResult::success("Archive extracted successfully").with_exit_code(0)
            }
            Ok(output) => {
                let message = friendly_exit_message(output.exit_code, &output.stderr_text());
                tracing::error!("Extraction failed: {}", message);
                StepResult::failure(message)
                    .with_exit_code(output.exit_code)
                    .with_details(output.diagnostics())
            }
            Err(ProcessError::Cancelled) => {
                tracing::info!("Extraction was cancelled");
                StepResult::cancelled("Extraction was cancelled")
            }
            Err(e) => {
                tracing::error!("Extraction failed: {}", e);
                StepResult::failure("Extraction failed due to an unexpected error").with_details(e.to_string())
            }
        }
    }
}

fn is_informative(line: &str) -> bool {
    line.contains("Extracting") || line.contains('%')
}

/// Translate a 7-Zip exit code into a user-facing message.
///
/// Mapped codes win; otherwise `stderr` is scanned case-insensitively for
/// corruption, password and disk hints before a generic message.
///
/// # Example
///
/// ```rust
/// use chim_installer::friendly_exit_message;
///
/// assert_eq!(friendly_exit_message(2, "Corrupted"), "7-Zip encountered a fatal error");
/// assert!(friendly_exit_message(3, "CORRUPTED header").contains("corrupted"));
/// ```
pub fn friendly_exit_message(exit_code: i32, stderr: &str) -> String {
    let mapped = match exit_code {
        1 => Some("7-Zip encountered warnings during extraction"),
        2 => Some("7-Zip encountered a fatal error"),
        7 => Some("7-Zip command line error"),
        8 => Some("Not enough memory for operation"),
        255 => Some("User stopped the process"),
        _ => None,
    };
    if let Some(message) = mapped {
        return message.to_string();
    }

    let stderr = stderr.to_lowercase();
    if stderr.contains("corrupted") {
        "The archive appears to be corrupted. Please download the file again.".to_string()
    } else if stderr.contains("password") {
        "The archive is password protected.".to_string()
    } else if stderr.contains("disk") {
        "Insufficient disk space for extraction.".to_string()
    } else {
        format!(
            "7-Zip failed with exit code {}. This might indicate a corrupted archive, \
             insufficient disk space, or permission issues.",
            exit_code
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessOutput;
    use crate::testing::FakeRunner;
    use crate::StepStatus;
    use std::sync::Mutex;

    fn tool_at(path: &'static str) -> ToolLocator {
        fn resolve(_: &str, well_known: &[PathBuf]) -> Option<PathBuf> {
            well_known.first().cloned()
        }
        ToolLocator::new("7z", vec![PathBuf::from(path)]).with_resolvers(vec![resolve])
    }

    fn no_tool() -> ToolLocator {
        ToolLocator::new("7z", Vec::new()).with_resolvers(Vec::new())
    }

    #[test]
    fn test_friendly_messages_for_mapped_codes() {
        assert_eq!(friendly_exit_message(1, ""), "7-Zip encountered warnings during extraction");
        assert_eq!(friendly_exit_message(2, "corrupted password disk"), "7-Zip encountered a fatal error");
        assert_eq!(friendly_exit_message(7, ""), "7-Zip command line error");
        assert_eq!(friendly_exit_message(8, ""), "Not enough memory for operation");
        assert_eq!(friendly_exit_message(255, ""), "User stopped the process");
    }

    #[test]
    fn test_friendly_messages_stderr_fallbacks() {
        assert!(friendly_exit_message(3, "Data Error: CoRrUpTeD").contains("corrupted"));
        assert_eq!(friendly_exit_message(3, "Wrong PASSWORD"), "The archive is password protected.");
        assert_eq!(
            friendly_exit_message(3, "There is not enough space on the disk"),
            "Insufficient disk space for extraction."
        );
        assert!(friendly_exit_message(3, "corrupted and password").contains("corrupted"));
        assert!(friendly_exit_message(42, "").starts_with("7-Zip failed with exit code 42."));
    }

    #[tokio::test]
    async fn test_missing_archive_fails_fast() {
        let runner = Arc::new(FakeRunner::succeeding());
        let extractor = ArchiveExtractor::new(runner.clone(), tool_at("/opt/7z"));
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("missing.7z");

        let result = extractor
            .extract(&archive, dir.path(), &CancellationToken::new(), &|_| {})
            .await;

        assert_eq!(result.message, "Archive file not found");
        assert!(result.details.unwrap().contains("missing.7z"));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_tool_fails_with_hint() {
        let runner = Arc::new(FakeRunner::succeeding());
        let extractor = ArchiveExtractor::new(runner.clone(), no_tool());
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.7z");
        std::fs::write(&archive, b"7z").unwrap();

        let result = extractor
            .extract(&archive, dir.path(), &CancellationToken::new(), &|_| {})
            .await;

        assert_eq!(result.message, "7-Zip not found");
        assert!(result.details.unwrap().contains("https://www.7-zip.org/"));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_extract_success_filters_progress() {
        let runner = Arc::new(FakeRunner::with_output(ProcessOutput {
            exit_code: 0,
            stdout: vec![
                "7-Zip 23.01 (x64)".to_string(),
                "Extracting archive: a.7z".to_string(),
                " 42% 120 - file.dll".to_string(),
                "Everything is Ok".to_string(),
            ],
            stderr: Vec::new(),
        }));
        let extractor = ArchiveExtractor::new(runner.clone(), tool_at("/opt/7z"));
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.7z");
        std::fs::write(&archive, b"7z").unwrap();
        let dest = dir.path().join("out");
        let lines = Mutex::new(Vec::new());

        let result = extractor
            .extract(&archive, &dest, &CancellationToken::new(), &|e| {
                lines.lock().unwrap().push(e.message().to_string())
            })
            .await;

        assert!(result.is_success());
        assert_eq!(result.exit_code, Some(0));
        assert!(dest.is_dir());

        let lines = lines.lock().unwrap();
        assert!(lines.contains(&"Extracting archive: a.7z".to_string()));
        assert!(lines.contains(&" 42% 120 - file.dll".to_string()));
        assert!(!lines.iter().any(|l| l.contains("Everything is Ok")));
        assert!(!lines.iter().any(|l| l.starts_with("7-Zip 23.01")));

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, PathBuf::from("/opt/7z"));
        assert_eq!(calls[0].args[0], "x");
        assert_eq!(calls[0].args[1], archive.display().to_string());
        assert_eq!(calls[0].args[2], format!("-o{}", dest.display()));
        assert_eq!(calls[0].args[3], "-y");
    }

    #[tokio::test]
    async fn test_extract_failure_carries_diagnostics() {
        let runner = Arc::new(FakeRunner::with_output(ProcessOutput {
            exit_code: 2,
            stdout: vec!["Extracting archive: a.7z".to_string()],
            stderr: vec!["ERROR: Data Error : Corrupted".to_string()],
        }));
        let extractor = ArchiveExtractor::new(runner, tool_at("/opt/7z"));
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.7z");
        std::fs::write(&archive, b"7z").unwrap();

        let result = extractor
            .extract(&archive, dir.path(), &CancellationToken::new(), &|_| {})
            .await;

        assert_eq!(result.status, StepStatus::Failed);
        assert_eq!(result.message, "7-Zip encountered a fatal error");
        assert_eq!(result.exit_code, Some(2));
        let details = result.details.unwrap();
        assert!(details.contains("Exit code: 2"));
        assert!(details.contains("Corrupted"));
        assert!(details.contains("Extracting archive"));
    }

    #[tokio::test]
    async fn test_extract_cancelled() {
        let runner = Arc::new(FakeRunner::cancelled());
        let extractor = ArchiveExtractor::new(runner, tool_at("/opt/7z"));
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.7z");
        std::fs::write(&archive, b"7z").unwrap();

        let result = extractor
            .extract(&archive, dir.path(), &CancellationToken::new(), &|_| {})
            .await;

        assert!(result.is_cancelled());
        assert_eq!(result.message, "Extraction was cancelled");
    }
}
