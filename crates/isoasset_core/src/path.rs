//! Load-time path canonicalization.
//!
//! Canonical keys are project-root-relative and joined with `/` on every
//! platform, matching how the bundler writes manifest keys.

use std::path::{Component, Path, PathBuf};

/// Converts an absolute load-time path into a canonical manifest key.
///
/// Returns `None` when `raw` is not strictly below `root`; callers must treat
/// that as a declined interception.
pub fn normalize(raw: &Path, root: &Path) -> Option<String> {
    let relative = raw.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().replace('\\', "/")),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Anchors a relative path at the current directory and folds dot segments.
///
/// Falls back to the folded relative path when the current directory is
/// unavailable.
pub fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return lexical_normalize(path);
    }
    match std::env::current_dir() {
        Ok(cwd) => lexical_normalize(&cwd.join(path)),
        Err(_) => lexical_normalize(path),
    }
}

/// Folds `.` and `..` components without touching the filesystem.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
