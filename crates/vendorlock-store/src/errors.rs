//! Error helpers for vendorlock-store
//!
//! Wraps vendorlock-core ExError with filesystem-specific constructors

use std::path::Path;
use vendorlock_core::errors::{ExError, ExErrorKind};

pub use vendorlock_core::errors::io_error;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

/// Create an IO error carrying the path it happened on
pub fn io_error_at(op: &str, path: &Path, err: std::io::Error) -> ExError {
    io_error(op, err).with_path(path)
}

/// Create an export error for one project
///
/// Cancellation passes through unwrapped.
pub fn export_error(project: &str, target: &Path, source: ExError) -> ExError {
    if source.kind() == ExErrorKind::Cancelled {
        return source.with_project(project);
    }
    ExError::new(ExErrorKind::Export)
        .with_op("export_project")
        .with_project(project)
        .with_path(target)
        .with_message(format!("failed to export {}", project))
        .with_source(source)
}

/// Create a digest error for a tree that could not be hashed
pub fn digest_error(path: &Path, message: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::Digest)
        .with_op("digest_tree")
        .with_path(path)
        .with_message(message)
}

/// Create a commit error for a failed swap of one artifact
pub fn commit_error(artifact: &str, path: &Path, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Commit)
        .with_op("commit")
        .with_path(path)
        .with_message(format!("failed to swap {} into place", artifact))
        .with_source(io_error("rename", err))
}
