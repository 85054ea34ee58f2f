//! Minimal-rewrite strategy.
//!
//! Only projects with a [`ChangeReason`] are exported, into a `.vendor-new`
//! scratch sibling of vendor. Unchanged projects are then moved across and
//! the scratch tree replaces vendor. Removed projects are left behind and go
//! away with the old tree.

use crate::errors::{commit_error, export_error, io_error_at, Result};
use crate::fs::{atomic_write, exists, has_dot_git, project_path, remove_any};
use crate::project::Project;
use crate::source::SourceProvider;
use crate::verify::digest_from_directory;
use crate::writer::{progress, SafeWriter, TreeWriter, WriterOptions};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use vendorlock_core::errors::TreeError;
use vendorlock_core::model::{Lock, PruneOptions, VersionedDigest, LOCK_NAME};
use vendorlock_core::{change_explanation, classify_changes, ChangeReason, ChangeSet, VendorBehavior};
use vendorlock_core::{log_op_end, log_op_error, log_op_start};

/// Name of the scratch directory created next to vendor
pub const SCRATCH_DIR_NAME: &str = ".vendor-new";

/// Writer that touches only the projects that need it
#[derive(Debug)]
pub struct DeltaWriter {
    lock: Lock,
    changes: ChangeSet,
    /// Digests recorded by the previous lock
    old_digests: BTreeMap<String, Option<VersionedDigest>>,
    vendor_dir: PathBuf,
    behavior: VendorBehavior,
    options: WriterOptions,
}

/// Build a writer bringing `project` in line with `new_lock`
///
/// Falls back to a [`SafeWriter`] when there is no vendor directory yet.
///
/// # Errors
///
/// Fails if the vendor tree cannot be verified or planning fails, and with
/// [`TreeError::StaleScratch`] when vendor is missing but a scratch
/// directory from an interrupted swap is still present.
pub fn new_delta_writer(
    project: &Project,
    new_lock: Lock,
    behavior: VendorBehavior,
) -> Result<Box<dyn TreeWriter>> {
    new_delta_writer_with_options(project, new_lock, behavior, WriterOptions::default())
}

/// [`new_delta_writer`] with explicit cancellation and rename seams
///
/// # Errors
///
/// See [`new_delta_writer`].
pub fn new_delta_writer_with_options(
    project: &Project,
    new_lock: Lock,
    behavior: VendorBehavior,
    options: WriterOptions,
) -> Result<Box<dyn TreeWriter>> {
    let status = project.verify_vendor()?;
    let vendor_dir = project.vendor_dir();

    if !exists(&vendor_dir) {
        // A failed swap leaves scratch without vendor; the full writer would
        // not notice it.
        let scratch = project.abs_root.join(SCRATCH_DIR_NAME);
        if exists(&scratch) {
            return Err(TreeError::StaleScratch { path: scratch }.into());
        }
        tracing::debug!(
            op = "new_delta_writer",
            project_root = %project.abs_root.display(),
            "no vendor directory, using full writer"
        );
        let writer = SafeWriter::new(
            None,
            project.lock.as_ref(),
            Some(new_lock),
            behavior,
            project.prune_options(),
            &status,
        )?
        .with_options(options);
        return Ok(Box::new(writer));
    }

    let changes = classify_changes(
        project.lock.as_ref(),
        &new_lock,
        &status,
        &project.noverify(),
    );
    tracing::debug!(
        op = "new_delta_writer",
        project_root = %project.abs_root.display(),
        changed_len = changes.len(),
        "classified changes"
    );

    Ok(Box::new(DeltaWriter {
        lock: new_lock,
        changes,
        old_digests: project.lock.as_ref().map(Lock::digests).unwrap_or_default(),
        vendor_dir,
        behavior,
        options,
    }))
}

impl DeltaWriter {
    /// The new lock, with digests of re-exported projects once written
    pub fn lock(&self) -> &Lock {
        &self.lock
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    fn needs_export(&self) -> bool {
        self.changes
            .changed
            .values()
            .any(|r| *r != ChangeReason::ProjectRemoved)
    }

    fn validate(&self, root: &Path, provider: Option<&dyn SourceProvider>) -> Result<()> {
        if self.vendor_dir.parent() != Some(root) {
            return Err(TreeError::RootMismatch {
                target: root.to_path_buf(),
                vendor_dir: self.vendor_dir.clone(),
            }
            .into());
        }
        if provider.is_none() && self.needs_export() {
            return Err(TreeError::MissingSourceProvider.into());
        }
        Ok(())
    }

    fn write_impl(
        &mut self,
        root: &Path,
        provider: Option<&dyn SourceProvider>,
        mut logger: Option<&mut dyn io::Write>,
    ) -> Result<()> {
        self.validate(root, provider)?;

        let scratch = root.join(SCRATCH_DIR_NAME);
        if exists(&scratch) {
            return Err(TreeError::StaleScratch { path: scratch }.into());
        }
        fs::create_dir_all(&scratch).map_err(|e| io_error_at("create_scratch_dir", &scratch, e))?;

        let mut moved = Vec::new();
        let lock_bytes = match self.stage(&scratch, provider, &mut logger, &mut moved) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.abandon(&scratch, &moved);
                return Err(err);
            }
        };

        let lpath = root.join(LOCK_NAME);

        if self.behavior == VendorBehavior::Never {
            let written = atomic_write(&lpath, &lock_bytes);
            if let Err(e) = remove_any(&scratch) {
                tracing::warn!(
                    op = "delta_write",
                    path = %scratch.display(),
                    error = %e,
                    "could not remove scratch directory"
                );
            }
            return written;
        }

        // From here on the scratch tree holds the only copy of relocated
        // projects, so it is left in place on failure.
        fs::remove_dir_all(&self.vendor_dir)
            .map_err(|e| io_error_at("remove_vendor", &self.vendor_dir, e))?;
        self.options
            .renamer
            .rename(&scratch, &self.vendor_dir)
            .map_err(|e| commit_error("vendor", &self.vendor_dir, e))?;

        atomic_write(&lpath, &lock_bytes)
    }

    /// Fill scratch and return the rendered lock
    ///
    /// Every relocation out of the live vendor tree is recorded in `moved`.
    fn stage(
        &mut self,
        scratch: &Path,
        provider: Option<&dyn SourceProvider>,
        logger: &mut Option<&mut dyn io::Write>,
        moved: &mut Vec<(PathBuf, PathBuf)>,
    ) -> Result<Vec<u8>> {
        let total = self.changes.len();
        if total > 0 {
            progress(logger, "# Bringing vendor into sync");
        }

        let mut dropped = Vec::new();
        let mut written = 0;
        for (root, reason) in &self.changes.changed {
            if *reason == ChangeReason::ProjectRemoved {
                dropped.push(root.clone());
                continue;
            }
            self.options.cancel.check()?;

            let Some(project) = self.lock.project(root) else {
                tracing::warn!(
                    op = "delta_write",
                    project_root = %root,
                    reason = %reason,
                    "scheduled project is not in the new lock, skipping"
                );
                continue;
            };
            let provider = provider.ok_or(TreeError::MissingSourceProvider)?;
            let target = project_path(scratch, root);
            let prune = project.prune_opts | PruneOptions::NESTED_VENDOR_DIRS;
            provider
                .export_pruned_project(&self.options.cancel, project, prune, &target)
                .map_err(|e| export_error(root, &target, e))?;
            written += 1;

            if self.behavior != VendorBehavior::Never {
                let line = format!(
                    "({}/{}) Wrote {}: {}",
                    written,
                    total,
                    project,
                    change_explanation(*reason, &self.changes.project_delta(root))
                );
                progress(logger, line);
            }

            let digest =
                digest_from_directory(&target).map_err(|e| e.with_project(root.as_str()))?;
            self.lock.set_digest(root, digest);
            tracing::debug!(
                op = "delta_write",
                project_root = %root,
                reason = %reason,
                "exported project"
            );
        }

        // Untouched projects keep the digest they were verified against.
        for (root, digest) in &self.old_digests {
            let Some(digest) = digest else { continue };
            if self.changes.changed.contains_key(root) {
                continue;
            }
            if self.lock.project(root).is_some_and(|p| p.digest.is_none()) {
                self.lock.set_digest(root, digest.clone());
            }
        }

        let lock_bytes = self.lock.render()?;
        if self.behavior == VendorBehavior::Never {
            return Ok(lock_bytes);
        }

        for project in self.lock.projects() {
            if self.changes.changed.contains_key(&project.name) {
                continue;
            }
            let from = project_path(&self.vendor_dir, &project.name);
            let to = project_path(scratch, &project.name);
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| io_error_at("create_project_parent", parent, e))?;
            }
            self.options.renamer.rename(&from, &to).map_err(|e| {
                io_error_at("relocate_project", &from, e).with_project(project.name.as_str())
            })?;
            moved.push((from, to));
            tracing::debug!(
                op = "delta_write",
                project_root = %project.name,
                "relocated unchanged project"
            );
        }

        for (i, root) in dropped.iter().enumerate() {
            let count = total - (dropped.len() - i - 1);
            let path = project_path(&self.vendor_dir, root);
            match fs::symlink_metadata(&path) {
                Ok(meta) if meta.is_dir() => {
                    progress(logger, format!("({}/{}) Removed unused project {}", count, total, root))
                }
                Ok(_) => {
                    progress(logger, format!("({}/{}) Removed orphaned file {}", count, total, root))
                }
                Err(_) => tracing::warn!(
                    op = "delta_write",
                    project_root = %root,
                    "removed project already absent from vendor"
                ),
            }
        }

        if has_dot_git(&self.vendor_dir) {
            let from = self.vendor_dir.join(".git");
            let to = scratch.join(".git");
            self.options
                .renamer
                .rename(&from, &to)
                .map_err(|e| io_error_at("preserve_vendor_git", &from, e))?;
            moved.push((from, to));
        }

        Ok(lock_bytes)
    }

    /// Undo relocations and drop scratch after a failed stage
    ///
    /// Scratch is kept if anything could not be moved back.
    fn abandon(&self, scratch: &Path, moved: &[(PathBuf, PathBuf)]) {
        let mut restored = true;
        for (from, to) in moved.iter().rev() {
            if let Err(e) = self.options.renamer.rename(to, from) {
                tracing::warn!(
                    op = "delta_write",
                    path = %to.display(),
                    error = %e,
                    "could not move project back into vendor"
                );
                restored = false;
            }
        }
        if restored {
            remove_any(scratch).ok();
        }
    }
}

impl TreeWriter for DeltaWriter {
    fn print_prepared_actions(&self, out: &mut dyn io::Write, verbose: bool) -> Result<()> {
        let io_err = |e| crate::errors::io_error("print_prepared_actions", e);

        if verbose {
            let body = self.lock.to_toml()?;
            writeln!(
                out,
                "Would have written the following {} (hash digests may be incorrect):\n{}",
                LOCK_NAME, body
            )
            .map_err(io_err)?;
        } else {
            writeln!(out, "Would have written {}.", LOCK_NAME).map_err(io_err)?;
        }

        if self.behavior == VendorBehavior::Never {
            return Ok(());
        }

        let total = self.changes.len();
        if !verbose {
            writeln!(out, "Would have updated {} projects in the vendor directory.", total)
                .map_err(io_err)?;
            return Ok(());
        }

        writeln!(out, "Would have updated the following projects in the vendor directory:\n")
            .map_err(io_err)?;
        for (i, (root, reason)) in self.changes.changed.iter().enumerate() {
            if *reason == ChangeReason::ProjectRemoved {
                writeln!(out, "({}/{}) Would have removed {}", i + 1, total, root).map_err(io_err)?;
                continue;
            }
            let ident = self
                .lock
                .project(root)
                .map(ToString::to_string)
                .unwrap_or_else(|| root.clone());
            writeln!(
                out,
                "({}/{}) Would have written {}: {}",
                i + 1,
                total,
                ident,
                change_explanation(*reason, &self.changes.project_delta(root))
            )
            .map_err(io_err)?;
        }
        Ok(())
    }

    fn write(
        &mut self,
        root: &Path,
        provider: Option<&dyn SourceProvider>,
        _examples: bool,
        logger: Option<&mut dyn io::Write>,
    ) -> Result<()> {
        let request_id = self.options.request_id.clone();
        log_op_start!(
            "delta_write",
            request_id = %request_id,
            project_root = %root.display(),
            changed_len = self.changes.len(),
            behavior = %self.behavior
        );
        let start = Instant::now();

        self.write_impl(root, provider, logger).map_err(|e| {
            let e = e.with_request_id(request_id.clone());
            log_op_error!(
                "delta_write",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64,
                request_id = %request_id
            );
            e
        })?;

        log_op_end!(
            "delta_write",
            duration_ms = start.elapsed().as_millis() as u64,
            request_id = %request_id,
            changed_len = self.changes.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vendorlock_core::model::{LockedProject, SolveMeta};

    fn writer(behavior: VendorBehavior) -> DeltaWriter {
        let old = Lock::new(
            vec![
                LockedProject::new("example.com/a", "r1").with_version("v1.0.0"),
                LockedProject::new("example.com/gone", "r9"),
            ],
            SolveMeta::default(),
        )
        .unwrap();
        let new = Lock::new(
            vec![LockedProject::new("example.com/a", "r2").with_version("v1.1.0")],
            SolveMeta::default(),
        )
        .unwrap();
        let changes = classify_changes(Some(&old), &new, &BTreeMap::new(), &Default::default());
        DeltaWriter {
            lock: new,
            changes,
            old_digests: BTreeMap::new(),
            vendor_dir: PathBuf::from("/nowhere/vendor"),
            behavior,
            options: WriterOptions::default(),
        }
    }

    fn dry_run(w: &DeltaWriter, verbose: bool) -> String {
        let mut out = Vec::new();
        w.print_prepared_actions(&mut out, verbose).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_dry_run_terse() {
        assert_eq!(
            dry_run(&writer(VendorBehavior::OnChanged), false),
            "Would have written Vendor.lock.\n\
             Would have updated 2 projects in the vendor directory.\n"
        );
    }

    #[test]
    fn test_dry_run_verbose_explains_each_project() {
        let text = dry_run(&writer(VendorBehavior::OnChanged), true);
        assert!(text.starts_with(
            "Would have written the following Vendor.lock (hash digests may be incorrect):\n"
        ));
        assert!(text.ends_with(
            "Would have updated the following projects in the vendor directory:\n\n\
             (1/2) Would have written example.com/a@v1.1.0: version changed (was v1.0.0)\n\
             (2/2) Would have removed example.com/gone\n"
        ));
    }

    #[test]
    fn test_dry_run_never_mentions_only_lock() {
        assert_eq!(
            dry_run(&writer(VendorBehavior::Never), false),
            "Would have written Vendor.lock.\n"
        );
    }

    #[test]
    fn test_root_must_be_vendor_parent() {
        let mut w = writer(VendorBehavior::OnChanged);
        let err = w.write(Path::new("/elsewhere"), None, false, None).unwrap_err();
        assert_eq!(err.kind(), vendorlock_core::ExErrorKind::InvalidInput);
    }
}
