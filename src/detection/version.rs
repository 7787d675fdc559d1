//! Dotted version parsing and ordering.

use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

/// A `major.minor[.build[.revision]]` version.
///
/// Components compare numerically, left to right; missing trailing
/// components count as zero, so `14.36` equals `14.36.0.0`.
///
/// # Example
///
/// ```rust
/// use chim_installer::DottedVersion;
///
/// let installed = DottedVersion::parse("v14.38.33135.00").unwrap();
/// let minimum = DottedVersion::parse("14.36.32532.0").unwrap();
/// assert!(installed >= minimum);
/// ```
#[derive(Debug, Clone)]
pub struct DottedVersion(Vec<u64>);

fn version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+(?:\.\d+){1,3})").expect("Invalid version regex"))
}

impl DottedVersion {
    /// Extract the first dotted version (2 to 4 components) from `text`.
    ///
    /// Leading markers such as `v` and surrounding text are ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = version_regex().captures(text)?;
        let parts = caps
            .get(1)?
            .as_str()
            .split('.')
            .map(str::parse::<u64>)
            .collect::<Result<Vec<_>, _>>()
            .ok()?;
        Some(Self(parts))
    }

    /// The numeric components as parsed.
    pub fn components(&self) -> &[u64] {
        &self.0
    }
}

impl Ord for DottedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| {
                let a = self.0.get(i).copied().unwrap_or(0);
                let b = other.0.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for DottedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DottedVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DottedVersion {}

impl fmt::Display for DottedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u64::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}
