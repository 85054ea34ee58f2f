//! Tree writers: get manifest, lock and vendor on disk in agreement with a
//! freshly resolved lock.
//!
//! Two strategies share the [`TreeWriter`] contract:
//! - [`SafeWriter`] stages everything and swaps it in with rollback
//! - [`DeltaWriter`] re-exports only changed projects and moves the rest

pub mod commit;
pub mod delta;
pub mod safe;

pub use commit::{FsRenamer, Renamer};
pub use delta::{new_delta_writer, new_delta_writer_with_options, DeltaWriter};
pub use safe::SafeWriter;

use crate::errors::{io_error_at, Result};
use crate::source::{CancelToken, SourceProvider};
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;
use vendorlock_core::errors::TreeError;
use vendorlock_core_types::RequestId;

/// A strategy for committing a planned write
pub trait TreeWriter {
    /// Describe what [`TreeWriter::write`] would do, without touching disk
    ///
    /// # Errors
    ///
    /// Fails if an artifact cannot be serialized or `out` cannot be written.
    fn print_prepared_actions(&self, out: &mut dyn io::Write, verbose: bool) -> Result<()>;

    /// Commit the planned write beneath `root`
    ///
    /// `provider` is required whenever vendor is written. Progress lines go
    /// to `logger` when given.
    ///
    /// # Errors
    ///
    /// Returns the single error that ended the write.
    fn write(
        &mut self,
        root: &Path,
        provider: Option<&dyn SourceProvider>,
        examples: bool,
        logger: Option<&mut dyn io::Write>,
    ) -> Result<()>;
}

/// Knobs shared by both writers
#[derive(Clone)]
pub struct WriterOptions {
    pub cancel: CancelToken,
    pub renamer: Arc<dyn Renamer>,
    /// Tags the log events and any error of one write
    pub request_id: RequestId,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            cancel: CancelToken::new(),
            renamer: Arc::new(FsRenamer),
            request_id: RequestId::new(),
        }
    }
}

impl fmt::Debug for WriterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterOptions")
            .field("cancel", &self.cancel)
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

/// Check that `root` names an existing directory
pub(crate) fn validate_root(root: &Path) -> Result<()> {
    if root.as_os_str().is_empty() {
        return Err(TreeError::EmptyRoot.into());
    }
    match std::fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(TreeError::RootNotDirectory {
            path: root.to_path_buf(),
        }
        .into()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(TreeError::RootNotFound {
            path: root.to_path_buf(),
        }
        .into()),
        Err(e) => Err(io_error_at("validate_root", root, e)),
    }
}

/// Write one progress line to an optional logger
///
/// Logger failures never fail a write.
pub(crate) fn progress(logger: &mut Option<&mut dyn io::Write>, line: impl fmt::Display) {
    if let Some(out) = logger.as_deref_mut() {
        writeln!(out, "{}", line).ok();
    }
}
