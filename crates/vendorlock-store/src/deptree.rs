//! Export of a whole lock into a vendor tree.

use crate::errors::{export_error, io_error_at, Result};
use crate::fs::project_path;
use crate::source::{CancelToken, SourceProvider};
use std::fmt;
use std::fs;
use std::path::Path;
use vendorlock_core::model::{CascadingPruneOptions, Lock};

/// Progress of [`write_dep_tree`], reported after each project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteProgress {
    pub count: usize,
    pub total: usize,
    pub project: String,
    pub version: String,
}

impl fmt::Display for WriteProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}/{}) Wrote {}@{}",
            self.count, self.total, self.project, self.version
        )
    }
}

/// Export every project in `lock` beneath `base`
///
/// Each project lands at its slash-segmented root path and is pruned with
/// the options `prune` gives for it.
///
/// # Errors
///
/// Stops at the first failed export or on cancellation.
pub fn write_dep_tree(
    base: &Path,
    lock: &Lock,
    provider: &dyn SourceProvider,
    prune: &CascadingPruneOptions,
    cancel: &CancelToken,
    on_write: &mut dyn FnMut(&WriteProgress),
) -> Result<()> {
    fs::create_dir_all(base).map_err(|e| io_error_at("create_vendor_dir", base, e))?;

    let total = lock.len();
    for (i, project) in lock.projects().iter().enumerate() {
        cancel.check()?;
        let target = project_path(base, &project.name);
        let opts = prune.options_for(&project.name);
        provider
            .export_pruned_project(cancel, project, opts, &target)
            .map_err(|e| export_error(&project.name, &target, e))?;

        tracing::debug!(
            op = "write_dep_tree",
            project_root = %project.name,
            prune = %opts,
            "exported project"
        );
        on_write(&WriteProgress {
            count: i + 1,
            total,
            project: project.name.clone(),
            version: project.version_label().to_string(),
        });
    }
    Ok(())
}
