//! Platform fact queries.

use crate::install::ProbeError;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Timeout for query commands such as the hypervisor probe.
#[cfg_attr(not(windows), allow(dead_code))]
const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Registry key holding the installed x64 redistributable version.
#[cfg_attr(not(windows), allow(dead_code))]
const RUNTIME_REGISTRY_KEY: &str = r"SOFTWARE\Microsoft\VisualStudio\14.0\VC\Runtimes\x64";

/// Read-only queries about the host machine.
#[async_trait]
pub trait SystemProbe: Send + Sync {
    /// Whether the current process runs with elevated privileges.
    async fn is_elevated(&self) -> Result<bool, ProbeError>;

    /// Whether hardware virtualization is enabled in firmware.
    async fn virtualization_enabled(&self) -> Result<bool, ProbeError>;

    /// Whether the volume at `volume` is mounted and ready.
    fn volume_ready(&self, volume: &Path) -> bool {
        volume.exists()
    }

    /// Free bytes available to the current user on the volume holding `volume`.
    async fn available_space(&self, volume: &Path) -> Result<u64, ProbeError>;

    /// Installed redistributable version marker, `None` when not installed.
    async fn installed_runtime_version(&self) -> Result<Option<String>, ProbeError>;
}

/// [`SystemProbe`] for the machine the installer runs on.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostProbe;

#[async_trait]
impl SystemProbe for HostProbe {
    async fn is_elevated(&self) -> Result<bool, ProbeError> {
        elevated()
    }

    async fn virtualization_enabled(&self) -> Result<bool, ProbeError> {
        virtualization().await
    }

    async fn available_space(&self, volume: &Path) -> Result<u64, ProbeError> {
        Ok(fs2::available_space(volume)?)
    }

    async fn installed_runtime_version(&self) -> Result<Option<String>, ProbeError> {
        runtime_version()
    }
}

#[cfg(windows)]
fn elevated() -> Result<bool, ProbeError> {
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY};
    use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

    let mut token = HANDLE::default();
    let mut elevation = TOKEN_ELEVATION::default();
    let mut returned = 0u32;

    // SAFETY: `token` is only closed after a successful open, and the
    // elevation buffer is sized for TOKEN_ELEVATION.
    unsafe {
        OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token).map_err(std::io::Error::from)?;
        let queried = GetTokenInformation(
            token,
            TokenElevation,
            Some(&mut elevation as *mut TOKEN_ELEVATION as *mut core::ffi::c_void),
            std::mem::size_of::<TOKEN_ELEVATION>() as u32,
            &mut returned,
        );
        let _ = CloseHandle(token);
        queried.map_err(std::io::Error::from)?;
    }

    Ok(elevation.TokenIsElevated != 0)
}

#[cfg(unix)]
fn elevated() -> Result<bool, ProbeError> {
    // SAFETY: geteuid has no preconditions and cannot fail.
    Ok(unsafe { libc::geteuid() } == 0)
}

#[cfg(not(any(windows, unix)))]
fn elevated() -> Result<bool, ProbeError> {
    Err(ProbeError::Unsupported("privilege query"))
}

#[cfg(windows)]
async fn virtualization() -> Result<bool, ProbeError> {
    use tokio::process::Command;
    use tokio::time::timeout;

    let program = "powershell";
    let output = timeout(
        QUERY_TIMEOUT,
        Command::new(program)
            .args([
                "-NoProfile",
                "-NonInteractive",
                "-Command",
                "(Get-CimInstance Win32_Processor | Select-Object -First 1).VirtualizationFirmwareEnabled -or (Get-CimInstance Win32_ComputerSystem).HypervisorPresent",
            ])
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| ProbeError::Timeout(QUERY_TIMEOUT))??;

    if !output.status.success() {
        return Err(ProbeError::CommandFailed {
            program: program.to_string(),
            code: output.status.code(),
        });
    }

    let text = String::from_utf8_lossy(&output.stdout);
    Ok(text.trim().eq_ignore_ascii_case("true"))
}

#[cfg(target_os = "linux")]
async fn virtualization() -> Result<bool, ProbeError> {
    let cpuinfo = tokio::fs::read_to_string("/proc/cpuinfo").await?;
    Ok(cpu_flags_report_virtualization(&cpuinfo))
}

#[cfg(not(any(windows, target_os = "linux")))]
async fn virtualization() -> Result<bool, ProbeError> {
    Err(ProbeError::Unsupported("virtualization query"))
}

/// Whether any `flags` line in cpuinfo text lists `vmx` (Intel) or `svm` (AMD).
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn cpu_flags_report_virtualization(cpuinfo: &str) -> bool {
    cpuinfo
        .lines()
        .filter(|line| line.starts_with("flags"))
        .filter_map(|line| line.split_once(':'))
        .any(|(_, flags)| flags.split_whitespace().any(|f| f == "vmx" || f == "svm"))
}

#[cfg(windows)]
fn runtime_version() -> Result<Option<String>, ProbeError> {
    use winreg::enums::{HKEY_LOCAL_MACHINE, KEY_READ};
    use winreg::RegKey;

    let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);
    let key = match hklm.open_subkey_with_flags(RUNTIME_REGISTRY_KEY, KEY_READ) {
        Ok(key) => key,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    match key.get_value::<String, _>("Version") {
        Ok(version) => Ok(Some(version)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(windows))]
fn runtime_version() -> Result<Option<String>, ProbeError> {
    Err(ProbeError::Unsupported("redistributable registry lookup"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_flags_detection() {
        let intel = "processor\t: 0\nflags\t\t: fpu vme de pse vmx sse\n";
        let amd = "flags\t\t: fpu svm lm\n";
        let none = "flags\t\t: fpu vme de pse\nmodel name\t: vmx-looking name\n";
        assert!(cpu_flags_report_virtualization(intel));
        assert!(cpu_flags_report_virtualization(amd));
        assert!(!cpu_flags_report_virtualization(none));
        assert!(!cpu_flags_report_virtualization(""));
    }

    #[tokio::test]
    async fn test_host_available_space() {
        let dir = tempfile::tempdir().unwrap();
        let free = HostProbe.available_space(dir.path()).await.unwrap();
        assert!(free > 0);
    }

    #[tokio::test]
    async fn test_host_available_space_missing_volume() {
        let result = HostProbe
            .available_space(Path::new("/nonexistent/volume/for/test"))
            .await;
        assert!(matches!(result, Err(ProbeError::Io(_))));
    }

    #[test]
    fn test_default_volume_ready() {
        let dir = tempfile::tempdir().unwrap();
        assert!(HostProbe.volume_ready(dir.path()));
        assert!(!HostProbe.volume_ready(&dir.path().join("missing")));
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_runtime_lookup_unsupported_off_windows() {
        let result = HostProbe.installed_runtime_version().await;
        assert!(matches!(result, Err(ProbeError::Unsupported(_))));
    }
}
