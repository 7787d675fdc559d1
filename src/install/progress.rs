//! Progress reporting types for installation operations.
//!
//! Long-running steps report through a caller-supplied callback receiving
//! [`ProgressEvent`] values. Events arrive in emission order; nothing else is
//! guaranteed, and download totals may be unknown.

/// Callback receiving progress events.
pub type ProgressFn<'a> = &'a (dyn Fn(ProgressEvent) + Send + Sync);

/// A progress update emitted while a step runs.
///
/// # Example
///
/// ```rust
/// use chim_installer::ProgressEvent;
///
/// fn on_progress(event: ProgressEvent) {
///     match event.percent_complete() {
///         Some(pct) => println!("[{pct:>5.1}%] {}", event.message()),
///         None => println!("{}", event.message()),
///     }
/// }
///
/// on_progress(ProgressEvent::status("Checking for mod file"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A free-text status line.
    Status(String),

    /// Byte counters for a download in flight.
    Download {
        /// Name of the file being written.
        file_name: String,
        /// Bytes received so far.
        bytes_received: u64,
        /// Total expected bytes; `0` when the server gave no length.
        total_bytes: u64,
        /// Formatted status line.
        message: String,
    },
}

impl ProgressEvent {
    /// Build a status event.
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status(message.into())
    }

    /// Build a download event with the standard status text.
    pub fn download(file_name: impl Into<String>, bytes_received: u64, total_bytes: u64) -> Self {
        let mut message = format!("Downloaded {}", format_bytes(bytes_received));
        if total_bytes > 0 {
            message.push_str(&format!(" of {}", format_bytes(total_bytes)));
        }
        Self::Download {
            file_name: file_name.into(),
            bytes_received,
            total_bytes,
            message,
        }
    }

    /// The human-readable line for this event.
    pub fn message(&self) -> &str {
        match self {
            Self::Status(message) => message,
            Self::Download { message, .. } => message,
        }
    }

    /// Completion percentage, or `None` when indeterminate.
    pub fn percent_complete(&self) -> Option<f64> {
        match self {
            Self::Download {
                bytes_received,
                total_bytes,
                ..
            } if *total_bytes > 0 => Some(*bytes_received as f64 / *total_bytes as f64 * 100.0),
            _ => None,
        }
    }
}

const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Format a byte count in the largest unit that keeps the value at or above 1.
///
/// Values are rounded to two decimals with trailing zeros dropped; a value
/// that would round to 1024 moves up to the next unit.
///
/// ```rust
/// use chim_installer::format_bytes;
///
/// assert_eq!(format_bytes(0), "0 Bytes");
/// assert_eq!(format_bytes(1500), "1.46 KB");
/// assert_eq!(format_bytes(1_073_741_824), "1 GB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} Bytes", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while unit + 1 < UNITS.len() && round2(value) >= 1024.0 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{} {}", trim_decimals(value), UNITS[unit])
}

/// Format a byte count as binary gigabytes with one decimal place.
pub fn format_gib(bytes: u64) -> String {
    format!("{:.1}", bytes as f64 / (1u64 << 30) as f64)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn trim_decimals(value: f64) -> String {
    let text = format!("{:.2}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
