//! Commit phase of a staged write.
//!
//! Each artifact is one [`CommitStep`]: displace the current target into a
//! backup, then install the staged replacement. Every completed action is
//! recorded; on failure the record is unwound in reverse order.

use crate::errors::{commit_error, Result};
use crate::fs::{exists, remove_any, rename_with_fallback};
use std::io;
use std::path::{Path, PathBuf};

/// Rename seam for commit and relocation
pub trait Renamer {
    /// # Errors
    ///
    /// Any rename failure.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
}

/// Renames on the real filesystem, copying across devices when needed
#[derive(Debug, Clone, Copy, Default)]
pub struct FsRenamer;

impl Renamer for FsRenamer {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        rename_with_fallback(from, to)
    }
}

/// One artifact to swap into place
#[derive(Debug, Clone)]
pub(crate) struct CommitStep {
    pub artifact: &'static str,
    pub staged: PathBuf,
    pub target: PathBuf,
    pub backup: PathBuf,
}

#[derive(Debug)]
enum Undo {
    /// Move the displaced original back
    Restore { backup: PathBuf, target: PathBuf },
    /// Take out a freshly installed artifact
    Remove { target: PathBuf },
}

/// Run every step in order, rolling back all completed actions on failure
///
/// Returns the backups created, so the caller can clean them up after
/// success. Rollback failures are ignored; the triggering error is returned.
pub(crate) fn commit_all(renamer: &dyn Renamer, steps: &[CommitStep]) -> Result<Vec<PathBuf>> {
    let mut undo = Vec::new();
    for step in steps {
        if let Err(err) = apply(renamer, step, &mut undo) {
            tracing::warn!(
                op = "commit",
                artifact = step.artifact,
                path = %step.target.display(),
                undo_len = undo.len(),
                "commit failed, rolling back"
            );
            rollback(renamer, undo);
            return Err(err);
        }
    }
    Ok(undo
        .into_iter()
        .filter_map(|u| match u {
            Undo::Restore { backup, .. } => Some(backup),
            Undo::Remove { .. } => None,
        })
        .collect())
}

fn apply(renamer: &dyn Renamer, step: &CommitStep, undo: &mut Vec<Undo>) -> Result<()> {
    if exists(&step.target) {
        renamer
            .rename(&step.target, &step.backup)
            .map_err(|e| commit_error(step.artifact, &step.target, e))?;
        undo.push(Undo::Restore {
            backup: step.backup.clone(),
            target: step.target.clone(),
        });
    }
    renamer
        .rename(&step.staged, &step.target)
        .map_err(|e| commit_error(step.artifact, &step.target, e))?;
    undo.push(Undo::Remove {
        target: step.target.clone(),
    });
    tracing::debug!(op = "commit", artifact = step.artifact, "installed");
    Ok(())
}

fn rollback(renamer: &dyn Renamer, undo: Vec<Undo>) {
    for action in undo.into_iter().rev() {
        // Already failing; a rollback error cannot improve on the original.
        let _ = match action {
            Undo::Remove { target } => remove_any(&target),
            Undo::Restore { backup, target } => renamer.rename(&backup, &target),
        };
    }
}
