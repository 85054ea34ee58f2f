//! On-disk project context: root, manifest, lock and vendor tree.

use crate::errors::{io_error_at, Result};
use crate::verify::check_dep_tree;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use vendorlock_core::errors::TreeError;
use vendorlock_core::model::{CascadingPruneOptions, Lock, Manifest, LOCK_NAME, MANIFEST_NAME};
use vendorlock_core::VendorStatus;

/// A project as found on disk
#[derive(Debug, Clone)]
pub struct Project {
    /// Canonical absolute root
    pub abs_root: PathBuf,
    pub manifest: Option<Manifest>,
    pub lock: Option<Lock>,
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error_at("read_project_file", path, e)),
    }
}

impl Project {
    /// Load the project rooted at `root`
    ///
    /// Manifest and lock are optional; when present they must parse.
    pub fn load(root: &Path) -> Result<Self> {
        if root.as_os_str().is_empty() {
            return Err(TreeError::EmptyRoot.into());
        }
        let abs_root = fs::canonicalize(root).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                TreeError::RootNotFound {
                    path: root.to_path_buf(),
                }
                .into()
            } else {
                io_error_at("load_project", root, e)
            }
        })?;
        if !abs_root.is_dir() {
            return Err(TreeError::RootNotDirectory { path: abs_root }.into());
        }

        let manifest_path = abs_root.join(MANIFEST_NAME);
        let manifest = read_optional(&manifest_path)?
            .map(|text| {
                Manifest::from_toml_str(&text).map_err(|e| e.with_path(manifest_path.as_path()))
            })
            .transpose()?;

        let lock_path = abs_root.join(LOCK_NAME);
        let lock = read_optional(&lock_path)?
            .map(|text| Lock::from_toml_str(&text).map_err(|e| e.with_path(lock_path.as_path())))
            .transpose()?;

        tracing::debug!(
            op = "load_project",
            project_root = %abs_root.display(),
            has_manifest = manifest.is_some(),
            has_lock = lock.is_some(),
            "loaded project"
        );

        Ok(Self {
            abs_root,
            manifest,
            lock,
        })
    }

    pub fn vendor_dir(&self) -> PathBuf {
        self.abs_root.join("vendor")
    }

    /// Prune policy from the manifest, or the default
    pub fn prune_options(&self) -> CascadingPruneOptions {
        self.manifest
            .as_ref()
            .map(Manifest::prune_options)
            .unwrap_or_default()
    }

    /// Roots opted out of verification in the manifest
    pub fn noverify(&self) -> BTreeSet<String> {
        self.manifest
            .as_ref()
            .map(|m| m.noverify.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Status of the vendor tree against the lock's digests
    ///
    /// Without a lock every vendored directory is reported as not in lock.
    pub fn verify_vendor(&self) -> Result<BTreeMap<String, VendorStatus>> {
        let wanted = self.lock.as_ref().map(Lock::digests).unwrap_or_default();
        check_dep_tree(&self.vendor_dir(), &wanted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vendorlock_core::errors::ExErrorKind;

    #[test]
    fn test_load_empty_project() {
        let dir = TempDir::new().unwrap();
        let project = Project::load(dir.path()).unwrap();
        assert!(project.manifest.is_none());
        assert!(project.lock.is_none());
        assert!(project.verify_vendor().unwrap().is_empty());
        assert!(project.vendor_dir().ends_with("vendor"));
    }

    #[test]
    fn test_load_parses_files() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(MANIFEST_NAME),
            "noverify = [\"example.com/a\"]\n",
        )
        .unwrap();
        fs::write(
            dir.path().join(LOCK_NAME),
            "[[projects]]\nname = \"example.com/a\"\nrevision = \"r1\"\n",
        )
        .unwrap();

        let project = Project::load(dir.path()).unwrap();
        assert!(project.noverify().contains("example.com/a"));
        let status = project.verify_vendor().unwrap();
        assert_eq!(status["example.com/a"], VendorStatus::NotInTree);
    }

    #[test]
    fn test_load_bad_lock_reports_path() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(LOCK_NAME), "projects = 3").unwrap();
        let err = Project::load(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::Serialization);
        assert!(err.path().unwrap().ends_with(LOCK_NAME));
    }

    #[test]
    fn test_load_missing_root() {
        let dir = TempDir::new().unwrap();
        let err = Project::load(&dir.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::NotFound);
    }
}
