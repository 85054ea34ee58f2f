//! Full-rewrite strategy.
//!
//! Manifest, lock and a complete vendor tree are staged in a temporary
//! directory, then swapped into place one artifact at a time. A failed swap
//! puts every displaced artifact back.

use crate::deptree::{write_dep_tree, WriteProgress};
use crate::errors::{io_error, io_error_at, Result};
use crate::fs::{exists, has_dot_git, project_path, remove_any};
use crate::source::SourceProvider;
use crate::verify::digest_from_directory;
use crate::writer::commit::{commit_all, CommitStep};
use crate::writer::{progress, validate_root, TreeWriter, WriterOptions};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;
use vendorlock_core::errors::TreeError;
use vendorlock_core::model::{CascadingPruneOptions, Lock, Manifest, LOCK_NAME, MANIFEST_NAME};
use vendorlock_core::{log_op_end, log_op_error, log_op_start};
use vendorlock_core::{plan_write, LockDelta, VendorBehavior, VendorStatus, WritePlan};

/// Transactional writer for any combination of manifest, lock and vendor
#[derive(Debug)]
pub struct SafeWriter {
    manifest: Option<Manifest>,
    lock: Option<Lock>,
    plan: WritePlan,
    prune: CascadingPruneOptions,
    options: WriterOptions,
}

impl SafeWriter {
    /// Plan a write
    ///
    /// - a manifest, when given, is always written
    /// - the new lock is written when it is new or differs structurally
    /// - vendor is written per `behavior` and `status`
    ///
    /// # Errors
    ///
    /// An old lock without a new lock, or a vendor write without a new lock.
    pub fn new(
        manifest: Option<Manifest>,
        old_lock: Option<&Lock>,
        new_lock: Option<Lock>,
        behavior: VendorBehavior,
        prune: CascadingPruneOptions,
        status: &BTreeMap<String, VendorStatus>,
    ) -> Result<Self> {
        let plan = plan_write(old_lock, new_lock.as_ref(), behavior, status)?;
        Ok(Self {
            manifest,
            lock: new_lock,
            plan,
            prune,
            options: WriterOptions::default(),
        })
    }

    pub fn with_options(mut self, options: WriterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn has_lock(&self) -> bool {
        self.lock.is_some()
    }

    pub fn has_manifest(&self) -> bool {
        self.manifest.is_some()
    }

    pub fn writes_lock(&self) -> bool {
        self.plan.write_lock
    }

    pub fn writes_vendor(&self) -> bool {
        self.plan.write_vendor
    }

    /// The new lock, with digests filled in once vendor has been written
    pub fn lock(&self) -> Option<&Lock> {
        self.lock.as_ref()
    }

    pub fn lock_diff(&self) -> &LockDelta {
        &self.plan.lock_diff
    }

    fn validate(&self, root: &Path, provider: Option<&dyn SourceProvider>) -> Result<()> {
        validate_root(root)?;
        if self.plan.write_vendor && provider.is_none() {
            return Err(TreeError::MissingSourceProvider.into());
        }
        Ok(())
    }

    fn write_impl(
        &mut self,
        root: &Path,
        provider: Option<&dyn SourceProvider>,
        examples: bool,
        mut logger: Option<&mut dyn io::Write>,
    ) -> Result<()> {
        self.validate(root, provider)?;

        if !self.has_manifest() && !self.plan.write_lock && !self.plan.write_vendor {
            return Ok(());
        }

        let mpath = root.join(MANIFEST_NAME);
        let lpath = root.join(LOCK_NAME);
        let vpath = root.join("vendor");

        let staging = tempfile::Builder::new()
            .prefix("vendorlock")
            .tempdir()
            .map_err(|e| io_error("create_staging_dir", e))?;
        let td = staging.path();
        let staged_vendor = td.join("vendor");

        if let Some(manifest) = &self.manifest {
            let bytes = manifest.render(examples)?;
            let path = td.join(MANIFEST_NAME);
            fs::write(&path, bytes).map_err(|e| io_error_at("stage_manifest", &path, e))?;
        }

        if self.plan.write_vendor {
            let provider = provider.ok_or(TreeError::MissingSourceProvider)?;
            let lock = self.lock.as_mut().ok_or(TreeError::VendorWithoutNewLock)?;

            write_dep_tree(
                &staged_vendor,
                lock,
                provider,
                &self.prune,
                &self.options.cancel,
                &mut |p: &WriteProgress| progress(&mut logger, p),
            )?;

            let roots: Vec<String> = lock.projects().iter().map(|p| p.name.clone()).collect();
            for root in roots {
                let digest = digest_from_directory(&project_path(&staged_vendor, &root))
                    .map_err(|e| e.with_project(root.as_str()))?;
                lock.set_digest(&root, digest);
            }
        }

        if self.plan.write_lock {
            let lock = self.lock.as_ref().ok_or(TreeError::MissingNewLock)?;
            let path = td.join(LOCK_NAME);
            fs::write(&path, lock.render()?).map_err(|e| io_error_at("stage_lock", &path, e))?;
        }

        let renamer = self.options.renamer.as_ref();

        // Carry vendor/.git over into the new tree.
        let vendor_git = vpath.join(".git");
        let staged_git = staged_vendor.join(".git");
        let moved_git = self.plan.write_vendor && has_dot_git(&vpath);
        if moved_git {
            renamer
                .rename(&vendor_git, &staged_git)
                .map_err(|e| io_error_at("preserve_vendor_git", &vendor_git, e))?;
        }

        let mut steps = Vec::new();
        if self.has_manifest() {
            steps.push(CommitStep {
                artifact: "manifest",
                staged: td.join(MANIFEST_NAME),
                target: mpath,
                backup: td.join(format!("{}.orig", MANIFEST_NAME)),
            });
        }
        if self.plan.write_lock {
            steps.push(CommitStep {
                artifact: "lock",
                staged: td.join(LOCK_NAME),
                target: lpath,
                backup: td.join(format!("{}.orig", LOCK_NAME)),
            });
        }
        // Back vendor up beside itself to avoid a cross-device move, unless
        // that name is taken.
        let mut vendor_backup = root.join("vendor.orig");
        if exists(&vendor_backup) {
            vendor_backup = td.join(".vendor.orig");
        }
        if self.plan.write_vendor {
            steps.push(CommitStep {
                artifact: "vendor",
                staged: staged_vendor.clone(),
                target: vpath.clone(),
                backup: vendor_backup.clone(),
            });
        }

        if let Err(err) = commit_all(renamer, &steps) {
            if moved_git {
                // Best effort, like the rest of the rollback.
                let _ = renamer.rename(&staged_git, &vendor_git);
            }
            return Err(err);
        }

        if self.plan.write_vendor && exists(&vendor_backup) {
            if let Err(e) = remove_any(&vendor_backup) {
                tracing::warn!(
                    op = "safe_write",
                    path = %vendor_backup.display(),
                    error = %e,
                    "could not remove vendor backup"
                );
            }
        }

        Ok(())
    }
}

impl TreeWriter for SafeWriter {
    fn print_prepared_actions(&self, out: &mut dyn io::Write, verbose: bool) -> Result<()> {
        let io_err = |e| io_error("print_prepared_actions", e);

        if let Some(manifest) = &self.manifest {
            if verbose {
                let body = manifest.to_toml()?;
                writeln!(out, "Would have written the following {}:\n{}", MANIFEST_NAME, body)
                    .map_err(io_err)?;
            } else {
                writeln!(out, "Would have written {}.", MANIFEST_NAME).map_err(io_err)?;
            }
        }

        if self.plan.write_lock {
            if let Some(lock) = &self.lock {
                if verbose {
                    let body = lock.to_toml()?;
                    writeln!(out, "Would have written the following {}:\n{}", LOCK_NAME, body)
                        .map_err(io_err)?;
                } else {
                    writeln!(out, "Would have written {}.", LOCK_NAME).map_err(io_err)?;
                }
            }
        }

        if self.plan.write_vendor {
            if let Some(lock) = &self.lock {
                let total = lock.len();
                if verbose {
                    writeln!(
                        out,
                        "Would have written the following {} projects to the vendor directory:",
                        total
                    )
                    .map_err(io_err)?;
                    for (i, p) in lock.projects().iter().enumerate() {
                        writeln!(out, "({}/{}) {}", i + 1, total, p).map_err(io_err)?;
                    }
                } else {
                    writeln!(
                        out,
                        "Would have written {} projects to the vendor directory.",
                        total
                    )
                    .map_err(io_err)?;
                }
            }
        }

        Ok(())
    }

    fn write(
        &mut self,
        root: &Path,
        provider: Option<&dyn SourceProvider>,
        examples: bool,
        logger: Option<&mut dyn io::Write>,
    ) -> Result<()> {
        let request_id = self.options.request_id.clone();
        log_op_start!(
            "safe_write",
            request_id = %request_id,
            project_root = %root.display(),
            writes_lock = self.plan.write_lock,
            writes_vendor = self.plan.write_vendor
        );
        let start = Instant::now();

        self.write_impl(root, provider, examples, logger)
            .map_err(|e| {
                let e = e.with_request_id(request_id.clone());
                log_op_error!(
                    "safe_write",
                    e.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    request_id = %request_id
                );
                e
            })?;

        log_op_end!(
            "safe_write",
            duration_ms = start.elapsed().as_millis() as u64,
            request_id = %request_id,
            projects_len = self.lock.as_ref().map(Lock::len).unwrap_or(0)
        );
        Ok(())
    }
}
