//! Structural diff between two locks.
//!
//! [`diff_locks`] records only projects that differ along at least one
//! [`DeltaDimension`]. Hash dimensions are tracked separately so callers can
//! mask them out: a fresh solve produces a lock with no digests, which is not
//! by itself a reason to rewrite anything.

use crate::model::{Lock, LockedProject, PruneOptions};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::{BitAnd, BitOr, Not};

/// Bit mask over the ways a lock or a locked project can change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeltaDimension(u32);

impl DeltaDimension {
    pub const NONE: DeltaDimension = DeltaDimension(0);
    pub const INPUT_IMPORTS_CHANGED: DeltaDimension = DeltaDimension(1 << 0);
    pub const PROJECT_ADDED: DeltaDimension = DeltaDimension(1 << 1);
    pub const PROJECT_REMOVED: DeltaDimension = DeltaDimension(1 << 2);
    pub const SOURCE_CHANGED: DeltaDimension = DeltaDimension(1 << 3);
    pub const VERSION_CHANGED: DeltaDimension = DeltaDimension(1 << 4);
    pub const REVISION_CHANGED: DeltaDimension = DeltaDimension(1 << 5);
    pub const PACKAGES_CHANGED: DeltaDimension = DeltaDimension(1 << 6);
    pub const PRUNE_OPTS_CHANGED: DeltaDimension = DeltaDimension(1 << 7);
    pub const HASH_VERSION_CHANGED: DeltaDimension = DeltaDimension(1 << 8);
    pub const HASH_CHANGED: DeltaDimension = DeltaDimension(1 << 9);

    /// Every dimension
    pub const ANY_CHANGED: DeltaDimension = DeltaDimension((1 << 10) - 1);

    /// Every dimension except the two hash dimensions
    pub const ANY_EXCEPT_HASH: DeltaDimension = DeltaDimension(
        Self::ANY_CHANGED.0 & !Self::HASH_VERSION_CHANGED.0 & !Self::HASH_CHANGED.0,
    );

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if any dimension of `dims` is set
    pub fn intersects(self, dims: DeltaDimension) -> bool {
        self.0 & dims.0 != 0
    }
}

impl BitOr for DeltaDimension {
    type Output = DeltaDimension;

    fn bitor(self, rhs: Self) -> Self::Output {
        DeltaDimension(self.0 | rhs.0)
    }
}

impl BitAnd for DeltaDimension {
    type Output = DeltaDimension;

    fn bitand(self, rhs: Self) -> Self::Output {
        DeltaDimension(self.0 & rhs.0)
    }
}

impl Not for DeltaDimension {
    type Output = DeltaDimension;

    fn not(self) -> Self::Output {
        DeltaDimension(!self.0 & Self::ANY_CHANGED.0)
    }
}

/// Before/after detail for one project
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LockedProjectDelta {
    pub name: String,
    pub project_added: bool,
    pub project_removed: bool,
    pub source_before: Option<String>,
    pub source_after: Option<String>,
    pub version_before: Option<String>,
    pub version_after: Option<String>,
    pub revision_before: Option<String>,
    pub revision_after: Option<String>,
    pub packages_added: Vec<String>,
    pub packages_removed: Vec<String>,
    pub prune_opts_before: PruneOptions,
    pub prune_opts_after: PruneOptions,
    pub hash_version_before: Option<u32>,
    pub hash_version_after: Option<u32>,
    pub hash_changed: bool,
}

impl LockedProjectDelta {
    fn added(p: &LockedProject) -> Self {
        Self {
            name: p.name.clone(),
            project_added: true,
            source_after: p.source.clone(),
            version_after: p.version.clone(),
            revision_after: Some(p.revision.clone()),
            packages_added: p.packages.clone(),
            prune_opts_after: p.prune_opts,
            hash_version_after: p.digest.as_ref().map(|d| d.hash_version),
            ..Default::default()
        }
    }

    fn removed(p: &LockedProject) -> Self {
        Self {
            name: p.name.clone(),
            project_removed: true,
            source_before: p.source.clone(),
            version_before: p.version.clone(),
            revision_before: Some(p.revision.clone()),
            packages_removed: p.packages.clone(),
            prune_opts_before: p.prune_opts,
            hash_version_before: p.digest.as_ref().map(|d| d.hash_version),
            ..Default::default()
        }
    }

    fn between(old: &LockedProject, new: &LockedProject) -> Self {
        let before: BTreeSet<&String> = old.packages.iter().collect();
        let after: BTreeSet<&String> = new.packages.iter().collect();

        let old_digest = old.digest.as_ref();
        let new_digest = new.digest.as_ref();

        Self {
            name: new.name.clone(),
            project_added: false,
            project_removed: false,
            source_before: old.source.clone(),
            source_after: new.source.clone(),
            version_before: old.version.clone(),
            version_after: new.version.clone(),
            revision_before: Some(old.revision.clone()),
            revision_after: Some(new.revision.clone()),
            packages_added: after.difference(&before).map(|s| s.to_string()).collect(),
            packages_removed: before.difference(&after).map(|s| s.to_string()).collect(),
            prune_opts_before: old.prune_opts,
            prune_opts_after: new.prune_opts,
            hash_version_before: old_digest.map(|d| d.hash_version),
            hash_version_after: new_digest.map(|d| d.hash_version),
            hash_changed: old_digest.map(|d| d.digest.as_slice())
                != new_digest.map(|d| d.digest.as_slice()),
        }
    }

    pub fn was_added(&self) -> bool {
        self.project_added
    }

    pub fn was_removed(&self) -> bool {
        self.project_removed
    }

    pub fn source_changed(&self) -> bool {
        !self.is_add_or_remove() && self.source_before != self.source_after
    }

    pub fn version_changed(&self) -> bool {
        !self.is_add_or_remove() && self.version_before != self.version_after
    }

    pub fn revision_changed(&self) -> bool {
        !self.is_add_or_remove() && self.revision_before != self.revision_after
    }

    pub fn packages_changed(&self) -> bool {
        !self.is_add_or_remove()
            && (!self.packages_added.is_empty() || !self.packages_removed.is_empty())
    }

    pub fn prune_opts_changed(&self) -> bool {
        !self.is_add_or_remove() && self.prune_opts_before != self.prune_opts_after
    }

    pub fn hash_version_changed(&self) -> bool {
        !self.is_add_or_remove() && self.hash_version_before != self.hash_version_after
    }

    pub fn hash_changed(&self) -> bool {
        !self.is_add_or_remove() && self.hash_changed
    }

    fn is_add_or_remove(&self) -> bool {
        self.project_added || self.project_removed
    }

    /// Every dimension along which this project changed
    pub fn changes(&self) -> DeltaDimension {
        if self.project_added {
            return DeltaDimension::PROJECT_ADDED;
        }
        if self.project_removed {
            return DeltaDimension::PROJECT_REMOVED;
        }
        let checks = [
            (self.source_changed(), DeltaDimension::SOURCE_CHANGED),
            (self.version_changed(), DeltaDimension::VERSION_CHANGED),
            (self.revision_changed(), DeltaDimension::REVISION_CHANGED),
            (self.packages_changed(), DeltaDimension::PACKAGES_CHANGED),
            (self.prune_opts_changed(), DeltaDimension::PRUNE_OPTS_CHANGED),
            (self.hash_version_changed(), DeltaDimension::HASH_VERSION_CHANGED),
            (self.hash_changed(), DeltaDimension::HASH_CHANGED),
        ];
        checks
            .into_iter()
            .filter(|(hit, _)| *hit)
            .fold(DeltaDimension::NONE, |acc, (_, dim)| acc | dim)
    }

    /// True if the project changed along any of `dims`
    pub fn changed(&self, dims: DeltaDimension) -> bool {
        self.changes().intersects(dims)
    }
}

/// Diff between two whole locks
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LockDelta {
    pub added_import_inputs: Vec<String>,
    pub removed_import_inputs: Vec<String>,
    /// Only projects with at least one changed dimension appear here
    pub project_deltas: BTreeMap<String, LockedProjectDelta>,
}

impl LockDelta {
    pub fn changes(&self) -> DeltaDimension {
        let mut dims = DeltaDimension::NONE;
        if !self.added_import_inputs.is_empty() || !self.removed_import_inputs.is_empty() {
            dims = dims | DeltaDimension::INPUT_IMPORTS_CHANGED;
        }
        self.project_deltas
            .values()
            .fold(dims, |acc, d| acc | d.changes())
    }

    pub fn changed(&self, dims: DeltaDimension) -> bool {
        self.changes().intersects(dims)
    }
}

/// Compute the structural diff from `old` to `new`
///
/// A missing lock is treated as empty.
pub fn diff_locks(old: Option<&Lock>, new: Option<&Lock>) -> LockDelta {
    let empty = Lock::default();
    let old = old.unwrap_or(&empty);
    let new = new.unwrap_or(&empty);

    let before: BTreeSet<&String> = old.solve_meta.input_imports.iter().collect();
    let after: BTreeSet<&String> = new.solve_meta.input_imports.iter().collect();

    let mut delta = LockDelta {
        added_import_inputs: after.difference(&before).map(|s| s.to_string()).collect(),
        removed_import_inputs: before.difference(&after).map(|s| s.to_string()).collect(),
        project_deltas: BTreeMap::new(),
    };

    for p in old.projects() {
        let d = match new.project(&p.name) {
            Some(np) => LockedProjectDelta::between(p, np),
            None => LockedProjectDelta::removed(p),
        };
        if !d.changes().is_empty() {
            delta.project_deltas.insert(p.name.clone(), d);
        }
    }
    for p in new.projects() {
        if old.project(&p.name).is_none() {
            delta
                .project_deltas
                .insert(p.name.clone(), LockedProjectDelta::added(p));
        }
    }

    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SolveMeta, VersionedDigest};

    fn lock(projects: Vec<LockedProject>) -> Lock {
        Lock::new(projects, SolveMeta::default()).unwrap()
    }

    #[test]
    fn test_any_except_hash_mask() {
        let m = DeltaDimension::ANY_EXCEPT_HASH;
        assert!(!m.intersects(DeltaDimension::HASH_CHANGED));
        assert!(!m.intersects(DeltaDimension::HASH_VERSION_CHANGED));
        assert!(m.intersects(DeltaDimension::INPUT_IMPORTS_CHANGED));
        assert!(m.intersects(DeltaDimension::PRUNE_OPTS_CHANGED));
        assert_eq!(!DeltaDimension::ANY_CHANGED, DeltaDimension::NONE);
    }

    #[test]
    fn test_identical_locks_have_no_delta() {
        let a = lock(vec![LockedProject::new("example.com/a", "r1").with_version("v1")]);
        let delta = diff_locks(Some(&a), Some(&a.clone()));
        assert!(delta.project_deltas.is_empty());
        assert!(!delta.changed(DeltaDimension::ANY_CHANGED));
    }

    #[test]
    fn test_added_and_removed() {
        let old = lock(vec![LockedProject::new("example.com/gone", "r1")]);
        let new = lock(vec![LockedProject::new("example.com/new", "r2")]);
        let delta = diff_locks(Some(&old), Some(&new));

        assert!(delta.project_deltas["example.com/gone"].was_removed());
        assert!(delta.project_deltas["example.com/new"].was_added());
        assert_eq!(
            delta.changes(),
            DeltaDimension::PROJECT_ADDED | DeltaDimension::PROJECT_REMOVED
        );
    }

    #[test]
    fn test_missing_old_lock_adds_everything() {
        let new = lock(vec![LockedProject::new("example.com/a", "r1")]);
        let delta = diff_locks(None, Some(&new));
        assert_eq!(delta.project_deltas.len(), 1);
        assert!(delta.project_deltas["example.com/a"].was_added());
    }

    #[test]
    fn test_version_and_packages_change() {
        let old = lock(vec![LockedProject::new("example.com/a", "r1")
            .with_version("v1")
            .with_packages(vec![".".into(), "sub".into()])]);
        let new = lock(vec![LockedProject::new("example.com/a", "r2")
            .with_version("v2")
            .with_packages(vec![".".into(), "other".into()])]);
        let d = &diff_locks(Some(&old), Some(&new)).project_deltas["example.com/a"];

        assert!(d.version_changed());
        assert!(d.revision_changed());
        assert!(!d.source_changed());
        assert_eq!(d.packages_added, vec!["other".to_string()]);
        assert_eq!(d.packages_removed, vec!["sub".to_string()]);
        assert!(d.changed(DeltaDimension::ANY_EXCEPT_HASH));
    }

    #[test]
    fn test_hash_only_change_is_masked() {
        let old = lock(vec![LockedProject::new("example.com/a", "r1")
            .with_digest(VersionedDigest::new(1, vec![1]))]);
        let new = lock(vec![LockedProject::new("example.com/a", "r1")]);
        let delta = diff_locks(Some(&old), Some(&new));

        let d = &delta.project_deltas["example.com/a"];
        assert!(d.hash_changed());
        assert!(d.hash_version_changed());
        assert!(!delta.changed(DeltaDimension::ANY_EXCEPT_HASH));
    }

    #[test]
    fn test_input_imports_change() {
        let old = lock(vec![]);
        let mut new = lock(vec![]);
        new.solve_meta.input_imports = vec!["example.com/a".to_string()];
        let delta = diff_locks(Some(&old), Some(&new));
        assert_eq!(delta.added_import_inputs, vec!["example.com/a".to_string()]);
        assert!(delta.changed(DeltaDimension::INPUT_IMPORTS_CHANGED));
        assert!(!delta.changed(
            DeltaDimension::ANY_EXCEPT_HASH & !DeltaDimension::INPUT_IMPORTS_CHANGED
        ));
    }
}
