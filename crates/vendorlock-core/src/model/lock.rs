//! Resolved dependency set and its lock file form.

use crate::errors::{Result, TreeError};
use crate::model::digest::VersionedDigest;
use crate::model::prune::{CascadingPruneOptions, PruneOptions};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// File name of the lock, a direct child of the project root
pub const LOCK_NAME: &str = "Vendor.lock";

/// Written above the serialized lock body
pub const LOCK_FILE_HEADER: &str = "# This file is autogenerated, do not edit; changes may be undone by the next 'vendorlock ensure'.\n\n";

/// One resolved project, keyed by its root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedProject {
    /// Project root; unique within a lock
    pub name: String,

    /// Alternate source location, when it differs from the root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Resolved version; `None` for a bare revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    pub revision: String,

    /// Packages required from the project, relative to its root (`.` is the root)
    #[serde(default)]
    pub packages: Vec<String>,

    #[serde(rename = "pruneopts", default)]
    pub prune_opts: PruneOptions,

    /// Digest of the exported tree; absent until the project has been vendored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<VersionedDigest>,
}

impl LockedProject {
    pub fn new(name: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
            version: None,
            revision: revision.into(),
            packages: vec![".".to_string()],
            prune_opts: PruneOptions::NONE,
            digest: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_packages(mut self, packages: Vec<String>) -> Self {
        self.packages = packages;
        self
    }

    pub fn with_prune_opts(mut self, prune_opts: PruneOptions) -> Self {
        self.prune_opts = prune_opts;
        self
    }

    pub fn with_digest(mut self, digest: VersionedDigest) -> Self {
        self.digest = Some(digest);
        self
    }

    /// The version if there is one, otherwise the revision
    pub fn version_label(&self) -> &str {
        self.version.as_deref().unwrap_or(&self.revision)
    }
}

impl fmt::Display for LockedProject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version_label())
    }
}

/// Solver bookkeeping carried in the lock
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SolveMeta {
    #[serde(default)]
    pub analyzer_name: String,
    #[serde(default)]
    pub analyzer_version: u32,
    #[serde(default)]
    pub input_imports: Vec<String>,
    #[serde(default)]
    pub solver_name: String,
    #[serde(default)]
    pub solver_version: u32,
}

#[derive(Serialize, Deserialize)]
struct RawLock {
    #[serde(default)]
    projects: Vec<LockedProject>,
    #[serde(rename = "solve-meta", default)]
    solve_meta: SolveMeta,
}

/// The resolved dependency set
///
/// Projects are kept sorted by root. The writers take the lock by value and
/// back-fill digests as projects are exported.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Lock {
    projects: Vec<LockedProject>,
    pub solve_meta: SolveMeta,
}

impl Lock {
    /// Build a lock, rejecting malformed and duplicate project roots
    pub fn new(mut projects: Vec<LockedProject>, solve_meta: SolveMeta) -> Result<Self> {
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        let mut seen = BTreeSet::new();
        for p in &projects {
            if let Err(reason) = check_project_root(&p.name) {
                return Err(TreeError::InvalidProjectRoot {
                    root: p.name.clone(),
                    reason,
                }
                .into());
            }
            if !seen.insert(p.name.as_str()) {
                return Err(TreeError::DuplicateProject {
                    root: p.name.clone(),
                }
                .into());
            }
        }
        Ok(Self {
            projects,
            solve_meta,
        })
    }

    pub fn projects(&self) -> &[LockedProject] {
        &self.projects
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn project(&self, root: &str) -> Option<&LockedProject> {
        self.projects
            .binary_search_by(|p| p.name.as_str().cmp(root))
            .ok()
            .map(|i| &self.projects[i])
    }

    /// Record the digest of a freshly exported project
    ///
    /// Returns false if the root is not in the lock.
    pub fn set_digest(&mut self, root: &str, digest: VersionedDigest) -> bool {
        match self
            .projects
            .binary_search_by(|p| p.name.as_str().cmp(root))
        {
            Ok(i) => {
                self.projects[i].digest = Some(digest);
                true
            }
            Err(_) => false,
        }
    }

    /// Record the effective prune options of every project
    ///
    /// A resolver output carries no prune policy of its own; stamping it
    /// from the manifest lets later diffs see prune policy changes.
    pub fn apply_prune_options(&mut self, prune: &CascadingPruneOptions) {
        for p in &mut self.projects {
            p.prune_opts = prune.options_for(&p.name);
        }
    }

    /// Digest recorded for each project, keyed by root
    pub fn digests(&self) -> BTreeMap<String, Option<VersionedDigest>> {
        self.projects
            .iter()
            .map(|p| (p.name.clone(), p.digest.clone()))
            .collect()
    }

    /// Serialize the lock body (no header)
    pub fn to_toml(&self) -> Result<String> {
        let raw = RawLock {
            projects: self.projects.clone(),
            solve_meta: self.solve_meta.clone(),
        };
        Ok(toml::to_string_pretty(&raw)?)
    }

    /// Bytes of the lock file as written to disk: header then body
    pub fn render(&self) -> Result<Vec<u8>> {
        let body = self.to_toml()?;
        let mut out = Vec::with_capacity(LOCK_FILE_HEADER.len() + body.len());
        out.extend_from_slice(LOCK_FILE_HEADER.as_bytes());
        out.extend_from_slice(body.as_bytes());
        Ok(out)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let raw: RawLock = toml::from_str(s)?;
        Lock::new(raw.projects, raw.solve_meta)
    }
}

/// A root must be a relative, slash-separated path with only normal segments
fn check_project_root(root: &str) -> std::result::Result<(), &'static str> {
    if root.is_empty() {
        return Err("empty root");
    }
    if root.starts_with('/') || root.contains('\\') || std::path::Path::new(root).is_absolute() {
        return Err("root must be a relative slash-separated path");
    }
    for seg in root.split('/') {
        match seg {
            "" => return Err("empty path segment"),
            "." | ".." => return Err("dot segment"),
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExErrorKind;

    fn sample() -> Lock {
        Lock::new(
            vec![
                LockedProject::new("example.com/b", "bbbb").with_version("v2.0.0"),
                LockedProject::new("example.com/a", "aaaa")
                    .with_prune_opts(PruneOptions::NESTED_VENDOR_DIRS | PruneOptions::TEST_FILES)
                    .with_digest(VersionedDigest::new(1, vec![1, 2, 3])),
            ],
            SolveMeta {
                input_imports: vec!["example.com/a".to_string()],
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_projects_sorted_by_root() {
        let lock = sample();
        let names: Vec<_> = lock.projects().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["example.com/a", "example.com/b"]);
    }

    #[test]
    fn test_duplicate_root_rejected() {
        let err = Lock::new(
            vec![
                LockedProject::new("example.com/a", "1"),
                LockedProject::new("example.com/a", "2"),
            ],
            SolveMeta::default(),
        )
        .unwrap_err();
        assert_eq!(err.project(), Some("example.com/a"));
    }

    #[test]
    fn test_roots_escaping_vendor_rejected() {
        for root in [
            "",
            "../escaped",
            "example.com/../../x",
            "example.com/./a",
            "/abs/path",
            "example.com//a",
            "example.com/a/",
            "..",
            "example.com\\a",
        ] {
            let err = Lock::new(vec![LockedProject::new(root, "r1")], SolveMeta::default())
                .unwrap_err();
            assert_eq!(err.kind(), ExErrorKind::InvalidInput, "root {:?}", root);
            assert_eq!(err.project(), Some(root));
        }
    }

    #[test]
    fn test_lock_file_with_escaping_root_rejected() {
        let text = "[[projects]]\n  name = \"../escaped\"\n  revision = \"r1\"\n";
        let err = Lock::from_toml_str(text).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);
    }

    #[test]
    fn test_toml_round_trip_preserves_digest_and_prune() {
        let lock = sample();
        let text = lock.to_toml().unwrap();
        assert!(text.contains("pruneopts = \"NT\""));
        assert!(text.contains("digest = \"1:010203\""));
        assert!(text.contains("[solve-meta]"));

        let parsed = Lock::from_toml_str(&text).unwrap();
        assert_eq!(parsed, lock);
    }

    #[test]
    fn test_render_prepends_header() {
        let bytes = sample().render().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with(LOCK_FILE_HEADER));
        // The header is a comment, so the rendered file still parses.
        assert_eq!(Lock::from_toml_str(&text).unwrap(), sample());
    }

    #[test]
    fn test_set_digest() {
        let mut lock = sample();
        assert!(lock.set_digest("example.com/b", VersionedDigest::new(1, vec![9])));
        assert!(!lock.set_digest("example.com/zzz", VersionedDigest::new(1, vec![9])));
        assert_eq!(
            lock.project("example.com/b").unwrap().digest,
            Some(VersionedDigest::new(1, vec![9]))
        );
    }

    #[test]
    fn test_apply_prune_options_stamps_each_project() {
        let mut lock = sample();
        let mut prune = CascadingPruneOptions::default();
        prune.default_options = PruneOptions::UNUSED_PACKAGES;
        prune.per_project.insert(
            "example.com/b".to_string(),
            crate::model::prune::PruneOptionSet {
                test_files: Some(true),
                ..Default::default()
            },
        );

        lock.apply_prune_options(&prune);

        assert_eq!(lock.project("example.com/a").unwrap().prune_opts.to_string(), "NU");
        assert_eq!(lock.project("example.com/b").unwrap().prune_opts.to_string(), "NUT");
    }

    #[test]
    fn test_version_label_falls_back_to_revision() {
        let lock = sample();
        assert_eq!(lock.project("example.com/a").unwrap().to_string(), "example.com/a@aaaa");
        assert_eq!(
            lock.project("example.com/b").unwrap().to_string(),
            "example.com/b@v2.0.0"
        );
    }
}
