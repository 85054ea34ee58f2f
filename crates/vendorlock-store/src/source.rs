//! Source export capability.
//!
//! Fetching sources is someone else's job: a [`SourceProvider`] only has to
//! place a project's pruned tree at a target path, deterministically.
//! [`LocalSourceProvider`] does this from a local cache laid out as
//! `<cache>/<project root>/<revision>/`.

use crate::errors::{io_error_at, Result};
use crate::fs::{copy_symlink, project_path};
use crate::verify::VCS_DIRS;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vendorlock_core::errors::{ExError, ExErrorKind, TreeError};
use vendorlock_core::model::{LockedProject, PruneOptions};
use walkdir::{DirEntry, WalkDir};

/// Shared cancellation flag for long-running writes
///
/// Writers check it between projects and hand it to the provider.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with a `Cancelled` error once cancellation has been requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(TreeError::Cancelled.into())
        } else {
            Ok(())
        }
    }
}

/// Capability to export one project's resolved, pruned tree
pub trait SourceProvider {
    /// Write `project` into `target` (created if missing), applying `prune`
    ///
    /// Must produce identical content for identical input.
    fn export_pruned_project(
        &self,
        cancel: &CancelToken,
        project: &LockedProject,
        prune: PruneOptions,
        target: &Path,
    ) -> Result<()>;
}

/// Files kept regardless of prune options
const LEGAL_PREFIXES: [&str; 10] = [
    "license",
    "licence",
    "copying",
    "unlicense",
    "copyright",
    "copyleft",
    "legal",
    "notice",
    "patents",
    "authors",
];

const SOURCE_EXTENSIONS: [&str; 16] = [
    "rs", "go", "c", "h", "cc", "cpp", "hpp", "s", "asm", "py", "js", "ts", "java", "proto",
    "toml", "mod",
];

fn is_legal_file(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    LEGAL_PREFIXES.iter().any(|p| lower.starts_with(p))
}

fn is_source_file(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| SOURCE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_test_file(name: &str) -> bool {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    stem.ends_with("_test") || stem.ends_with("_tests")
}

/// Package of a file: the slash path of its directory, `.` for the root
fn package_of(rel: &Path) -> String {
    let parent = rel.parent().map(|p| {
        p.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    });
    match parent {
        Some(p) if !p.is_empty() => p,
        _ => ".".to_string(),
    }
}

/// Is a directory excluded from an export
fn is_pruned_dir(entry: &DirEntry, prune: PruneOptions) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_str().unwrap_or_default();
    VCS_DIRS.contains(&name)
        || (prune.contains(PruneOptions::NESTED_VENDOR_DIRS) && name == "vendor")
        || (prune.contains(PruneOptions::TEST_FILES) && name == "testdata")
}

/// Is a file kept by an export
fn keeps_file(project: &LockedProject, rel: &Path, prune: PruneOptions) -> bool {
    let name = rel
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if is_legal_file(name) {
        return true;
    }
    if prune.contains(PruneOptions::UNUSED_PACKAGES)
        && !project.packages.iter().any(|p| *p == package_of(rel))
    {
        return false;
    }
    if prune.contains(PruneOptions::NON_SOURCE_FILES) && !is_source_file(name) {
        return false;
    }
    if prune.contains(PruneOptions::TEST_FILES) && is_test_file(name) {
        return false;
    }
    true
}

/// Exports projects from a local source cache
#[derive(Debug, Clone)]
pub struct LocalSourceProvider {
    cache_root: PathBuf,
}

impl LocalSourceProvider {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
        }
    }

    /// Cache directory holding `project` at its locked revision
    pub fn source_dir(&self, project: &LockedProject) -> PathBuf {
        let origin = project.source.as_deref().unwrap_or(&project.name);
        project_path(&self.cache_root, origin).join(&project.revision)
    }
}

impl SourceProvider for LocalSourceProvider {
    fn export_pruned_project(
        &self,
        cancel: &CancelToken,
        project: &LockedProject,
        prune: PruneOptions,
        target: &Path,
    ) -> Result<()> {
        cancel.check()?;

        let src = self.source_dir(project);
        if !src.is_dir() {
            return Err(ExError::new(ExErrorKind::NotFound)
                .with_op("export_project")
                .with_project(project.name.as_str())
                .with_path(src)
                .with_message(format!(
                    "revision {} is not in the source cache",
                    project.revision
                )));
        }

        fs::create_dir_all(target).map_err(|e| io_error_at("create_export_dir", target, e))?;

        let walker = WalkDir::new(&src)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_pruned_dir(e, prune));

        for entry in walker {
            cancel.check()?;
            let entry = entry.map_err(|e| {
                ExError::new(ExErrorKind::Io)
                    .with_op("walk_source")
                    .with_project(project.name.as_str())
                    .with_path(src.as_path())
                    .with_message(e.to_string())
            })?;
            if entry.file_type().is_dir() {
                continue;
            }
            let rel = match entry.path().strip_prefix(&src) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            if !keeps_file(project, rel, prune) {
                continue;
            }

            let to = target.join(rel);
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| io_error_at("create_export_dir", parent, e))?;
            }
            if entry.file_type().is_symlink() {
                copy_symlink(entry.path(), &to).map_err(|e| io_error_at("copy_symlink", &to, e))?;
            } else {
                fs::copy(entry.path(), &to).map_err(|e| io_error_at("copy_file", &to, e))?;
            }
        }

        Ok(())
    }
}
