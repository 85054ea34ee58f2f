//! One-line human explanations of why a project is being rewritten.

use crate::classify::ChangeReason;
use crate::model::{PruneOptions, LOCK_NAME};
use crate::verify::LockedProjectDelta;

/// Explain `reason` using the before/after detail in `delta`
pub fn change_explanation(reason: ChangeReason, delta: &LockedProjectDelta) -> String {
    match reason {
        ChangeReason::NoVerify => "verification is disabled".to_string(),
        ChangeReason::SolveChanged => solve_explanation(delta),
        ChangeReason::PruneOptsChanged => {
            // Nested vendor dirs are always pruned; leave them out of the report.
            let before = delta.prune_opts_before & !PruneOptions::NESTED_VENDOR_DIRS;
            let after = delta.prune_opts_after & !PruneOptions::NESTED_VENDOR_DIRS;
            format!("prune options changed ({} -> {})", before, after)
        }
        ChangeReason::HashMismatch => {
            format!("hash of vendored tree didn't match digest in {}", LOCK_NAME)
        }
        ChangeReason::HashVersionMismatch => "hashing algorithm mismatch".to_string(),
        ChangeReason::HashAbsent => "hash digest absent from lock".to_string(),
        ChangeReason::ProjectAdded => "new project".to_string(),
        ChangeReason::MissingFromTree => "missing from vendor".to_string(),
        ChangeReason::ProjectRemoved => "removed from lock".to_string(),
    }
}

fn solve_explanation(delta: &LockedProjectDelta) -> String {
    if delta.source_changed() {
        return format!(
            "source changed ({} -> {})",
            delta.source_before.as_deref().unwrap_or(""),
            delta.source_after.as_deref().unwrap_or("")
        );
    }
    if delta.version_changed() {
        return match &delta.version_before {
            None => "version changed (was a bare revision)".to_string(),
            Some(v) => format!("version changed (was {})", v),
        };
    }
    if delta.revision_changed() {
        return format!(
            "revision changed ({} -> {})",
            trim_sha(delta.revision_before.as_deref().unwrap_or("")),
            trim_sha(delta.revision_after.as_deref().unwrap_or(""))
        );
    }
    let added = delta.packages_added.len();
    let removed = delta.packages_removed.len();
    match (added, removed) {
        (0, 0) => "resolution changed".to_string(),
        (a, 0) => format!("packages changed ({} added)", a),
        (0, r) => format!("packages changed ({} removed)", r),
        (a, r) => format!("packages changed ({} added, {} removed)", a, r),
    }
}

/// Shorten a 40-character hex revision to its first 10 characters
///
/// Anything else is returned unchanged.
pub fn trim_sha(revision: &str) -> &str {
    if revision.len() == 40 && revision.bytes().all(|b| b.is_ascii_hexdigit()) {
        &revision[..10]
    } else {
        revision
    }
}
