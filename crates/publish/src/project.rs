//! Project metadata.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

/// Version recorded when `package.json` has none.
pub const FALLBACK_VERSION: &str = "1.0.0";

#[derive(Debug, Deserialize)]
struct PackageJson {
    version: Option<String>,
}

/// Reads the `version` field of `root/package.json`.
///
/// Any failure falls back to [`FALLBACK_VERSION`].
pub fn package_version(root: &Path) -> String {
    let path = root.join("package.json");
    let version = std::fs::read_to_string(&path)
        .ok()
        .and_then(|content| serde_json::from_str::<PackageJson>(&content).ok())
        .and_then(|pkg| pkg.version)
        .filter(|v| !v.trim().is_empty());

    match version {
        Some(v) => v,
        None => {
            debug!(path = %path.display(), "no package version, using fallback");
            FALLBACK_VERSION.to_string()
        }
    }
}
