//! Per-project change classification for minimal vendor rewrites.

use crate::model::Lock;
use crate::verify::{diff_locks, DeltaDimension, LockDelta, LockedProjectDelta, VendorStatus};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Why a project is scheduled for rewrite
///
/// Declaration order is rank order. Reasons ranked below [`ChangeReason::NoVerify`]
/// come only from on-disk verification and are suppressed for opted-out projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeReason {
    HashMismatch,
    HashVersionMismatch,
    HashAbsent,
    NoVerify,
    SolveChanged,
    PruneOptsChanged,
    MissingFromTree,
    ProjectAdded,
    ProjectRemoved,
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeReason::HashMismatch => "hash_mismatch",
            ChangeReason::HashVersionMismatch => "hash_version_mismatch",
            ChangeReason::HashAbsent => "hash_absent",
            ChangeReason::NoVerify => "no_verify",
            ChangeReason::SolveChanged => "solve_changed",
            ChangeReason::PruneOptsChanged => "prune_opts_changed",
            ChangeReason::MissingFromTree => "missing_from_tree",
            ChangeReason::ProjectAdded => "project_added",
            ChangeReason::ProjectRemoved => "project_removed",
        };
        f.write_str(s)
    }
}

/// Projects scheduled for rewrite, and the lock diff they were derived from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub changed: BTreeMap<String, ChangeReason>,
    pub delta: LockDelta,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changed.len()
    }

    pub fn reason(&self, root: &str) -> Option<ChangeReason> {
        self.changed.get(root).copied()
    }

    /// Lock diff detail for a project; empty for status-only changes
    pub fn project_delta(&self, root: &str) -> LockedProjectDelta {
        self.delta
            .project_deltas
            .get(root)
            .cloned()
            .unwrap_or_else(|| LockedProjectDelta {
                name: root.to_string(),
                ..Default::default()
            })
    }
}

fn status_reason(status: VendorStatus) -> Option<ChangeReason> {
    match status {
        VendorStatus::NoMismatch => None,
        VendorStatus::NotInTree => Some(ChangeReason::MissingFromTree),
        VendorStatus::NotInLock => Some(ChangeReason::ProjectRemoved),
        VendorStatus::DigestMismatchInLock => Some(ChangeReason::HashMismatch),
        VendorStatus::HashVersionMismatch => Some(ChangeReason::HashVersionMismatch),
        VendorStatus::EmptyDigestInLock => Some(ChangeReason::HashAbsent),
    }
}

/// Assign at most one [`ChangeReason`] to every project that needs rewriting
///
/// Structural lock changes win over on-disk status. `noverify` roots then
/// lose any reason ranked below [`ChangeReason::NoVerify`]; opting out never
/// schedules a project on its own.
pub fn classify_changes(
    old: Option<&Lock>,
    new: &Lock,
    status: &BTreeMap<String, VendorStatus>,
    noverify: &BTreeSet<String>,
) -> ChangeSet {
    let delta = diff_locks(old, Some(new));
    let mut changed = BTreeMap::new();

    // Hash dimensions are ignored here: a fresh solve carries no digests.
    for (root, d) in &delta.project_deltas {
        if !d.changed(DeltaDimension::ANY_EXCEPT_HASH) {
            continue;
        }
        let reason = if d.was_added() {
            ChangeReason::ProjectAdded
        } else if d.was_removed() {
            ChangeReason::ProjectRemoved
        } else if d.prune_opts_changed() {
            ChangeReason::PruneOptsChanged
        } else {
            ChangeReason::SolveChanged
        };
        changed.insert(root.clone(), reason);
    }

    for (root, stat) in status {
        if changed.contains_key(root) {
            continue;
        }
        if let Some(reason) = status_reason(*stat) {
            changed.insert(root.clone(), reason);
        }
    }

    for root in noverify {
        if matches!(changed.get(root), Some(reason) if *reason < ChangeReason::NoVerify) {
            changed.remove(root);
        }
    }

    ChangeSet { changed, delta }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LockedProject, PruneOptions, SolveMeta, VersionedDigest};

    fn lock(projects: Vec<LockedProject>) -> Lock {
        Lock::new(projects, SolveMeta::default()).unwrap()
    }

    fn status(entries: &[(&str, VendorStatus)]) -> BTreeMap<String, VendorStatus> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn roots(entries: &[&str]) -> BTreeSet<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rank_order() {
        use ChangeReason::*;
        let ordered = [
            HashMismatch,
            HashVersionMismatch,
            HashAbsent,
            NoVerify,
            SolveChanged,
            PruneOptsChanged,
            MissingFromTree,
            ProjectAdded,
            ProjectRemoved,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0] < pair[1], "{} should rank below {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_unchanged_project_absent_from_change_set() {
        let a = lock(vec![LockedProject::new("example.com/a", "r1")]);
        let set = classify_changes(
            Some(&a),
            &a,
            &status(&[("example.com/a", VendorStatus::NoMismatch)]),
            &BTreeSet::new(),
        );
        assert!(set.is_empty());
    }

    #[test]
    fn test_version_bump_is_solve_changed() {
        let old = lock(vec![LockedProject::new("example.com/a", "r1").with_version("v1")]);
        let new = lock(vec![LockedProject::new("example.com/a", "r2").with_version("v2")]);
        let set = classify_changes(
            Some(&old),
            &new,
            &status(&[("example.com/a", VendorStatus::NoMismatch)]),
            &BTreeSet::new(),
        );
        assert_eq!(set.reason("example.com/a"), Some(ChangeReason::SolveChanged));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_prune_only_change() {
        let old = lock(vec![LockedProject::new("example.com/a", "r1")
            .with_prune_opts(PruneOptions::NESTED_VENDOR_DIRS)]);
        let new = lock(vec![LockedProject::new("example.com/a", "r1")
            .with_prune_opts(PruneOptions::NESTED_VENDOR_DIRS | PruneOptions::TEST_FILES)]);
        let set = classify_changes(Some(&old), &new, &BTreeMap::new(), &BTreeSet::new());
        assert_eq!(
            set.reason("example.com/a"),
            Some(ChangeReason::PruneOptsChanged)
        );
    }

    #[test]
    fn test_structural_reason_beats_status() {
        let old = lock(vec![LockedProject::new("example.com/a", "r1")]);
        let new = lock(vec![LockedProject::new("example.com/a", "r2")]);
        let set = classify_changes(
            Some(&old),
            &new,
            &status(&[("example.com/a", VendorStatus::DigestMismatchInLock)]),
            &BTreeSet::new(),
        );
        assert_eq!(set.reason("example.com/a"), Some(ChangeReason::SolveChanged));
    }

    #[test]
    fn test_status_mapping() {
        let new = lock(vec![
            LockedProject::new("example.com/a", "r"),
            LockedProject::new("example.com/b", "r"),
            LockedProject::new("example.com/c", "r"),
            LockedProject::new("example.com/d", "r"),
        ]);
        let set = classify_changes(
            Some(&new),
            &new,
            &status(&[
                ("example.com/a", VendorStatus::NotInTree),
                ("example.com/b", VendorStatus::DigestMismatchInLock),
                ("example.com/c", VendorStatus::HashVersionMismatch),
                ("example.com/d", VendorStatus::EmptyDigestInLock),
                ("example.com/orphan", VendorStatus::NotInLock),
            ]),
            &BTreeSet::new(),
        );
        assert_eq!(set.reason("example.com/a"), Some(ChangeReason::MissingFromTree));
        assert_eq!(set.reason("example.com/b"), Some(ChangeReason::HashMismatch));
        assert_eq!(
            set.reason("example.com/c"),
            Some(ChangeReason::HashVersionMismatch)
        );
        assert_eq!(set.reason("example.com/d"), Some(ChangeReason::HashAbsent));
        assert_eq!(
            set.reason("example.com/orphan"),
            Some(ChangeReason::ProjectRemoved)
        );
    }

    #[test]
    fn test_noverify_drops_digest_mismatch_without_lock_change() {
        // Given project B has only an on-disk digest mismatch and is opted out
        let l = lock(vec![LockedProject::new("example.com/b", "r1")
            .with_digest(VersionedDigest::new(1, vec![1]))]);

        // When classified
        let set = classify_changes(
            Some(&l),
            &l,
            &status(&[("example.com/b", VendorStatus::DigestMismatchInLock)]),
            &roots(&["example.com/b"]),
        );

        // Then B is not scheduled
        assert!(set.reason("example.com/b").is_none());
    }

    #[test]
    fn test_noverify_rank_boundaries() {
        // HashAbsent is just below NoVerify and is dropped; SolveChanged is
        // just above and survives.
        let old = lock(vec![
            LockedProject::new("example.com/absent", "r1"),
            LockedProject::new("example.com/solved", "r1"),
        ]);
        let new = lock(vec![
            LockedProject::new("example.com/absent", "r1"),
            LockedProject::new("example.com/solved", "r2"),
        ]);
        let set = classify_changes(
            Some(&old),
            &new,
            &status(&[
                ("example.com/absent", VendorStatus::EmptyDigestInLock),
                ("example.com/solved", VendorStatus::NoMismatch),
            ]),
            &roots(&["example.com/absent", "example.com/solved"]),
        );
        assert!(set.reason("example.com/absent").is_none());
        assert_eq!(
            set.reason("example.com/solved"),
            Some(ChangeReason::SolveChanged)
        );
    }

    #[test]
    fn test_noverify_never_adds_or_suppresses_high_rank() {
        let old = lock(vec![LockedProject::new("example.com/gone", "r1")]);
        let new = lock(vec![
            LockedProject::new("example.com/new", "r1"),
            LockedProject::new("example.com/quiet", "r1"),
        ]);
        let set = classify_changes(
            Some(&old),
            &new,
            &status(&[("example.com/quiet", VendorStatus::NoMismatch)]),
            &roots(&["example.com/gone", "example.com/new", "example.com/quiet"]),
        );
        assert_eq!(set.reason("example.com/gone"), Some(ChangeReason::ProjectRemoved));
        assert_eq!(set.reason("example.com/new"), Some(ChangeReason::ProjectAdded));
        assert!(set.reason("example.com/quiet").is_none());
    }

    #[test]
    fn test_project_delta_for_status_only_change_is_empty() {
        let l = lock(vec![LockedProject::new("example.com/a", "r1")]);
        let set = classify_changes(
            Some(&l),
            &l,
            &status(&[("example.com/a", VendorStatus::NotInTree)]),
            &BTreeSet::new(),
        );
        let d = set.project_delta("example.com/a");
        assert_eq!(d.name, "example.com/a");
        assert!(d.changes().is_empty());
    }
}
