use std::path::PathBuf;

use thiserror::Error;
use vendorlock_core_types::RequestId;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that can be used for programmatic
/// error handling, testing, and CLI exit reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Preconditions (fail before any mutation)
    InvalidInput,
    NotFound,
    PreconditionFailed,
    StaleScratch,

    // Rendering
    Serialization,

    // Filesystem
    Io,
    Export,
    Digest,
    Commit,

    // Control
    Cancelled,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::PreconditionFailed => "ERR_PRECONDITION_FAILED",
            ExErrorKind::StaleScratch => "ERR_STALE_SCRATCH",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Export => "ERR_EXPORT",
            ExErrorKind::Digest => "ERR_DIGEST",
            ExErrorKind::Commit => "ERR_COMMIT",
            ExErrorKind::Cancelled => "ERR_CANCELLED",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification for programmatic handling plus the context a
/// user needs to act on a failed write: which operation, which artifact
/// path, which project.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    project: Option<String>,
    path: Option<PathBuf>,
    request_id: Option<RequestId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            project: None,
            path: None,
            request_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add project root context
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Add filesystem path context
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add request ID context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the project root context, if any
    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }

    /// Get the path context, if any
    pub fn path(&self) -> Option<&std::path::Path> {
        self.path.as_deref()
    }

    /// Get the request ID context, if any
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(project) = &self.project {
            write!(f, " (project: {})", project)?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Create an IO error for the named operation
pub fn io_error(op: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(op.to_string())
        .with_message(err.to_string())
}

// ========== End Error Facility ==========

/// Precondition failures raised by the planner and the tree writers
///
/// All of these are detected before the filesystem is touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    /// A diff needs both endpoints
    #[error("must provide a new lock when an old lock is specified")]
    OldLockWithoutNewLock,

    /// Vendor materialization needs something to materialize
    #[error("must provide a new lock in order to write out vendor")]
    VendorWithoutNewLock,

    /// The delta writer only operates on a resolved lock
    #[error("must provide a non-nil new lock")]
    MissingNewLock,

    #[error("root path must be non-empty")]
    EmptyRoot,

    #[error("root path {} does not exist", path.display())]
    RootNotFound { path: PathBuf },

    #[error("root path {} is not a directory", path.display())]
    RootNotDirectory { path: PathBuf },

    #[error("must provide a source provider if writing out a vendor dir")]
    MissingSourceProvider,

    /// The delta writer was constructed for a different vendor tree
    #[error(
        "target path ({}) must be the parent of the original vendor path ({})",
        target.display(),
        vendor_dir.display()
    )]
    RootMismatch { target: PathBuf, vendor_dir: PathBuf },

    /// Left behind by an earlier failed delta write
    #[error("scratch directory {} already exists, please remove it", path.display())]
    StaleScratch { path: PathBuf },

    #[error("project root {root} appears more than once in the lock")]
    DuplicateProject { root: String },

    /// Roots map onto vendor subdirectories, so they must stay beneath it
    #[error("invalid project root {root:?}: {reason}")]
    InvalidProjectRoot { root: String, reason: &'static str },

    #[error("write cancelled")]
    Cancelled,
}

impl From<TreeError> for ExError {
    fn from(err: TreeError) -> Self {
        let message = err.to_string();
        match err {
            TreeError::OldLockWithoutNewLock
            | TreeError::VendorWithoutNewLock
            | TreeError::MissingNewLock => ExError::new(ExErrorKind::InvalidInput)
                .with_op("plan_write")
                .with_message(message),

            TreeError::EmptyRoot => ExError::new(ExErrorKind::InvalidInput)
                .with_op("validate_root")
                .with_message(message),

            TreeError::RootNotFound { path } => ExError::new(ExErrorKind::NotFound)
                .with_op("validate_root")
                .with_path(path)
                .with_message(message),

            TreeError::RootNotDirectory { path } => {
                ExError::new(ExErrorKind::PreconditionFailed)
                    .with_op("validate_root")
                    .with_path(path)
                    .with_message(message)
            }

            TreeError::MissingSourceProvider => ExError::new(ExErrorKind::PreconditionFailed)
                .with_op("validate_root")
                .with_message(message),

            TreeError::RootMismatch { target, .. } => ExError::new(ExErrorKind::InvalidInput)
                .with_op("validate_root")
                .with_path(target)
                .with_message(message),

            TreeError::StaleScratch { path } => ExError::new(ExErrorKind::StaleScratch)
                .with_op("create_scratch")
                .with_path(path)
                .with_message(message),

            TreeError::DuplicateProject { root } => ExError::new(ExErrorKind::InvalidInput)
                .with_op("build_lock")
                .with_project(root)
                .with_message(message),

            TreeError::InvalidProjectRoot { root, .. } => ExError::new(ExErrorKind::InvalidInput)
                .with_op("build_lock")
                .with_project(root)
                .with_message(message),

            TreeError::Cancelled => ExError::new(ExErrorKind::Cancelled).with_message(message),
        }
    }
}

impl From<toml::ser::Error> for ExError {
    fn from(err: toml::ser::Error) -> Self {
        ExError::new(ExErrorKind::Serialization)
            .with_op("serialize_toml")
            .with_message(err.to_string())
    }
}

impl From<toml::de::Error> for ExError {
    fn from(err: toml::de::Error) -> Self {
        ExError::new(ExErrorKind::Serialization)
            .with_op("parse_toml")
            .with_message(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_codes() {
        let cases = [
            (ExErrorKind::InvalidInput, "ERR_INVALID_INPUT"),
            (ExErrorKind::StaleScratch, "ERR_STALE_SCRATCH"),
            (ExErrorKind::Commit, "ERR_COMMIT"),
            (ExErrorKind::Cancelled, "ERR_CANCELLED"),
        ];
        for (kind, expected_code) in cases {
            assert_eq!(kind.code(), expected_code, "Wrong code for {:?}", kind);
        }
    }

    #[test]
    fn test_tree_error_maps_to_kind() {
        let err: ExError = TreeError::StaleScratch {
            path: PathBuf::from("/p/.vendor-new"),
        }
        .into();
        assert_eq!(err.kind(), ExErrorKind::StaleScratch);
        assert_eq!(err.path(), Some(std::path::Path::new("/p/.vendor-new")));
        assert!(err.message().contains("please remove it"));

        let err: ExError = TreeError::OldLockWithoutNewLock.into();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);
        assert_eq!(err.op(), Some("plan_write"));
    }

    #[test]
    fn test_display_includes_context() {
        let err = ExError::new(ExErrorKind::Export)
            .with_op("export_project")
            .with_project("example.com/a")
            .with_message("boom");
        let rendered = err.to_string();
        assert!(rendered.starts_with("[ERR_EXPORT]"));
        assert!(rendered.contains("export_project"));
        assert!(rendered.contains("project: example.com/a"));
    }

    #[test]
    fn test_source_chain() {
        let inner = io_error("rename", std::io::Error::other("disk full"));
        let outer = ExError::new(ExErrorKind::Commit)
            .with_message("failed to install lock")
            .with_source(inner);
        assert_eq!(outer.source_error().map(|e| e.kind()), Some(ExErrorKind::Io));
        assert!(std::error::Error::source(&outer).is_some());
        assert!(outer.to_string().contains("disk full"));
    }
}
