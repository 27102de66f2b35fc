//! Tool version detection.

use std::sync::LazyLock;

use command_tree_core::{CommandPath, UNKNOWN_VERSION};
use regex::Regex;
use tracing::{debug, warn};

use crate::runner::CommandRunner;

static SEMVER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+\.[0-9]+\.[0-9]+").expect("version regex"));

/// Extracts the first `major.minor.patch` token from `text`, prefixed with `v`.
///
/// # Examples
///
/// ```
/// use command_tree_discovery::version::extract_version;
///
/// assert_eq!(extract_version("avalanche version 1.8.4, go1.22"), Some("v1.8.4".to_string()));
/// assert_eq!(extract_version("tool 2.1"), None);
/// ```
pub fn extract_version(text: &str) -> Option<String> {
    SEMVER_PATTERN
        .find(text)
        .map(|found| format!("v{}", found.as_str()))
}

/// Queries `<root> <version_flag>` and returns the detected version.
///
/// Never fails: a query error or output without a three-part version
/// yields [`UNKNOWN_VERSION`], so a missing version never stops discovery.
pub fn detect_version<R: CommandRunner + ?Sized>(
    runner: &R,
    root: &CommandPath,
    version_flag: &str,
) -> String {
    match runner.run(&root.to_argv(&[version_flag])) {
        Ok(output) => extract_version(&output).unwrap_or_else(|| {
            debug!(command = %root, "No version token in version output");
            UNKNOWN_VERSION.to_string()
        }),
        Err(err) => {
            warn!(command = %root, error = %err, "Error fetching CLI version");
            UNKNOWN_VERSION.to_string()
        }
    }
}
