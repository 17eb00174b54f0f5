use anyhow::Context;
use std::path::{Path, PathBuf};

/// Recursively collects files under `root` ending in `.{extension}` whose
/// path contains `filter` (an empty filter accepts everything).
///
/// Unreadable subdirectories are logged and skipped; only an unreadable
/// `root` is an error. The result is sorted so submission order is stable.
pub fn scan_candidates(root: &Path, extension: &str, filter: &str) -> crate::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let entries = std::fs::read_dir(root).with_context(|| format!("failed to walk {}", root.display()))?;
    let mut pending: Vec<_> = entries.flatten().map(|e| e.path()).collect();

    while let Some(path) = pending.pop() {
        if path.is_dir() {
            match std::fs::read_dir(&path) {
                Ok(entries) => pending.extend(entries.flatten().map(|e| e.path())),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "error when walking path"),
            }
        } else if path.is_file() && matches_candidate(&path, extension, filter) {
            found.push(path);
        }
    }

    found.sort();
    tracing::info!(root = %root.display(), candidates = found.len(), "scanned search folder");
    Ok(found)
}

fn matches_candidate(path: &Path, extension: &str, filter: &str) -> bool {
    let has_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == extension);
    has_extension && (filter.is_empty() || path.to_string_lossy().contains(filter))
}
