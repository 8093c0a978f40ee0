//! Build version resolution.
//!
//! Tokens are stamped with the version of the build that minted them and
//! only validate under the same version. Shipping a build with a bumped tag
//! invalidates every earlier token without changing the key.
//!
//! Resolution order, first non-empty wins:
//! 1. explicit override
//! 2. sidecar text file (for example `VERSION` next to the executable)
//! 3. `TALLY_BUILD_VERSION` captured at compile time
//! 4. [`BASELINE_VERSION`]

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// Version used when nothing else is configured.
pub const BASELINE_VERSION: &str = "v1";

/// Name of the sidecar version file looked up in an install directory.
pub const VERSION_FILE_NAME: &str = "VERSION";

/// Version captured from the build environment, if any.
const BUILD_VERSION: Option<&str> = option_env!("TALLY_BUILD_VERSION");

/// Resolves and caches the current build version.
#[derive(Debug, Clone, Default)]
pub struct VersionGate {
    override_tag: Option<String>,
    sidecar: Option<PathBuf>,
    resolved: OnceLock<String>,
}

impl VersionGate {
    /// A gate that resolves from the build-time tag or the baseline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A gate pinned to an explicit version.
    #[must_use]
    pub fn fixed(version: impl Into<String>) -> Self {
        Self::new().with_override(version)
    }

    /// Sets an explicit version that takes precedence over every other source.
    #[must_use]
    pub fn with_override(mut self, version: impl Into<String>) -> Self {
        self.override_tag = Some(version.into());
        self.resolved = OnceLock::new();
        self
    }

    /// Sets a sidecar text file consulted when no override is given.
    #[must_use]
    pub fn with_sidecar(mut self, path: impl Into<PathBuf>) -> Self {
        self.sidecar = Some(path.into());
        self.resolved = OnceLock::new();
        self
    }

    /// Returns the current version, resolving it on first use.
    pub fn current_version(&self) -> &str {
        self.resolved.get_or_init(|| {
            let version = self.resolve();
            debug!(%version, "resolved build version");
            version
        })
    }

    fn resolve(&self) -> String {
        if let Some(tag) = self.override_tag.as_deref().and_then(first_line) {
            return tag;
        }
        if let Some(tag) = self.sidecar.as_deref().and_then(read_sidecar) {
            return tag;
        }
        if let Some(tag) = BUILD_VERSION.and_then(first_line) {
            return tag;
        }
        BASELINE_VERSION.to_string()
    }
}

fn read_sidecar(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    first_line(&content)
}

/// First non-empty line, trimmed of whitespace and a leading BOM.
fn first_line(text: &str) -> Option<String> {
    text.trim_start_matches('\u{feff}')
        .lines()
        .map(|line| line.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}'))
        .find(|line| !line.is_empty())
        .map(str::to_string)
}
