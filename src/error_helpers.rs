//! Error helper functions for creating actionable per-file error messages
//!
//! Messages end up inside `FileResult::error`, so they stay on one line.

use std::io;
use std::path::Path;

/// Check if an IO error is a permission denied error
pub fn is_permission_denied(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::PermissionDenied
}

/// Check if an IO error is a "not found" error
pub fn is_not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}

fn parent_display(path: &Path) -> String {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ".".to_string())
}

/// Message for a file that does not exist
pub fn not_found_error(path: &Path) -> String {
    format!(
        "File not found: '{}' (check the path, or use an absolute path)",
        path.display()
    )
}

/// Message for a permission problem during `operation` ("reading", "writing", ...)
pub fn permission_error(path: &Path, operation: &str) -> String {
    format!(
        "Permission denied when {} '{}' (check access rights on '{}')",
        operation,
        path.display(),
        parent_display(path)
    )
}

/// Message for a path that exists but is not a regular file
pub fn not_a_file_error(path: &Path) -> String {
    format!("Not a regular file: '{}'", path.display())
}

/// Message for content that is not valid UTF-8
pub fn invalid_utf8_error(path: &Path, valid_up_to: usize) -> String {
    format!(
        "File is not valid UTF-8: '{}' (first invalid byte at offset {}; re-save it as UTF-8)",
        path.display(),
        valid_up_to
    )
}

/// Pick the most helpful message for an IO failure
pub fn io_error(path: &Path, operation: &str, err: &io::Error) -> String {
    if is_not_found(err) {
        not_found_error(path)
    } else if is_permission_denied(err) {
        permission_error(path, operation)
    } else {
        format!("Failed {} '{}': {}", operation, path.display(), err)
    }
}
