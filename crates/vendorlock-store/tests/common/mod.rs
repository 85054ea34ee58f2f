use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use vendorlock_core::errors::{ExError, ExErrorKind};
use vendorlock_core::model::{
    CascadingPruneOptions, Lock, LockedProject, Manifest, PruneOptions, SolveMeta,
};
use vendorlock_core::VendorBehavior;
use vendorlock_store::fs::rename_with_fallback;
use vendorlock_store::source::CancelToken;
use vendorlock_store::{Project, Renamer, SafeWriter, SourceProvider, TreeWriter};
use walkdir::WalkDir;

/// Deterministic provider: every project exports a source file naming its
/// revision, a license and a test file
#[derive(Default)]
pub struct FakeProvider {
    exported: RefCell<Vec<String>>,
    fail_on: Option<String>,
}

#[allow(dead_code)]
impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(root: &str) -> Self {
        Self {
            fail_on: Some(root.to_string()),
            ..Default::default()
        }
    }

    /// Roots exported so far, in call order
    pub fn exported(&self) -> Vec<String> {
        self.exported.borrow().clone()
    }

    pub fn reset(&self) {
        self.exported.borrow_mut().clear();
    }
}

impl SourceProvider for FakeProvider {
    fn export_pruned_project(
        &self,
        cancel: &CancelToken,
        project: &LockedProject,
        prune: PruneOptions,
        target: &Path,
    ) -> vendorlock_store::Result<()> {
        cancel.check()?;
        if self.fail_on.as_deref() == Some(project.name.as_str()) {
            return Err(ExError::new(ExErrorKind::NotFound).with_message("no such revision"));
        }
        self.exported.borrow_mut().push(project.name.clone());

        fs::create_dir_all(target).unwrap();
        fs::write(
            target.join("lib.rs"),
            format!("// {} at {}\n", project.name, project.revision),
        )
        .unwrap();
        fs::write(target.join("LICENSE"), "MIT\n").unwrap();
        if !prune.contains(PruneOptions::TEST_FILES) {
            fs::write(target.join("lib_test.rs"), "// tests\n").unwrap();
        }
        Ok(())
    }
}

/// Renamer failing the first rename whose destination matches
#[allow(dead_code)]
pub struct FailOnce {
    pub to: PathBuf,
    fired: Cell<bool>,
}

#[allow(dead_code)]
impl FailOnce {
    pub fn new(to: impl Into<PathBuf>) -> Self {
        Self {
            to: to.into(),
            fired: Cell::new(false),
        }
    }
}

impl Renamer for FailOnce {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if !self.fired.get() && to == self.to {
            self.fired.set(true);
            return Err(io::Error::other("injected rename failure"));
        }
        rename_with_fallback(from, to)
    }
}

/// Build a lock from `(root, version)` pairs; the revision is derived from both
#[allow(dead_code)]
pub fn lock_of(projects: &[(&str, &str)]) -> Lock {
    let projects = projects
        .iter()
        .map(|(root, version)| {
            LockedProject::new(*root, format!("rev-{}-{}", root.replace('/', "-"), version))
                .with_version(*version)
        })
        .collect();
    Lock::new(projects, SolveMeta::default()).unwrap()
}

/// A project directory fully written by the full writer
#[allow(dead_code)]
pub fn vendored_project(projects: &[(&str, &str)], provider: &FakeProvider) -> (TempDir, Project) {
    let dir = TempDir::new().unwrap();
    let mut writer = SafeWriter::new(
        Some(Manifest::default()),
        None,
        Some(lock_of(projects)),
        VendorBehavior::OnChanged,
        CascadingPruneOptions::default(),
        &BTreeMap::new(),
    )
    .unwrap();
    writer
        .write(dir.path(), Some(provider as &dyn SourceProvider), false, None)
        .unwrap();
    provider.reset();

    let project = Project::load(dir.path()).unwrap();
    (dir, project)
}

/// Every file and symlink under `root`, by relative path, with its bytes
#[allow(dead_code)]
pub fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| !e.file_type().is_dir())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_string_lossy().into_owned();
            (rel, fs::read(e.path()).unwrap_or_default())
        })
        .collect()
}

#[allow(dead_code)]
pub fn logged(buf: &[u8]) -> String {
    String::from_utf8(buf.to_vec()).unwrap()
}
