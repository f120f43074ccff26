//! Directory scanning for ingest.
//!
//! Recursively walks a directory and produces its entries with
//! relative paths normalized to forward slashes.

use std::path::{Path, PathBuf};

use crate::backend::EntryKind;
use crate::error::StoreError;

/// A file or directory found under the scanned root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedEntry {
    /// Path relative to the root, `/`-separated.
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub kind: EntryKind,
    /// File size in bytes; 0 for directories.
    pub size: u64,
}

/// Scans `root` recursively.
///
/// Entries are sorted by name at every level and each directory is
/// listed before its contents, so the same tree always scans in the
/// same order. Symlinks and special files are skipped.
pub fn scan_tree(root: &Path) -> Result<Vec<ScannedEntry>, StoreError> {
    let metadata = std::fs::metadata(root)
        .map_err(|_| StoreError::not_found(root.display().to_string()))?;
    if !metadata.is_dir() {
        return Err(StoreError::not_found(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut entries = Vec::new();
    walk_dir(root, root, &mut entries)?;
    Ok(entries)
}

fn walk_dir(root: &Path, current: &Path, out: &mut Vec<ScannedEntry>) -> Result<(), StoreError> {
    let mut children = std::fs::read_dir(current)?.collect::<Result<Vec<_>, _>>()?;
    children.sort_by_key(|entry| entry.file_name());

    for entry in children {
        let path = entry.path();
        let file_type = entry.file_type()?;

        let kind = if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            continue;
        };

        let rel_path = path.strip_prefix(root).map_err(std::io::Error::other)?;
        // Normalize to forward slashes.
        let relative_path = rel_path.to_string_lossy().replace('\\', "/");
        let size = match kind {
            EntryKind::File => entry.metadata()?.len(),
            _ => 0,
        };

        out.push(ScannedEntry {
            relative_path,
            absolute_path: path.clone(),
            kind,
            size,
        });

        if kind == EntryKind::Directory {
            walk_dir(root, &path, out)?;
        }
    }

    Ok(())
}

/// Returns `true` if `path` is a directory with at least one entry.
pub fn is_non_empty_dir(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
