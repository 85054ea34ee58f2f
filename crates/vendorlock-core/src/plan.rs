//! Decide which of manifest, lock and vendor a write must touch.

use crate::errors::{Result, TreeError};
use crate::model::Lock;
use crate::verify::{diff_locks, DeltaDimension, LockDelta, VendorStatus};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// When the vendor tree is (re)written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VendorBehavior {
    /// Write when the lock is new or changed, or the tree differs from it
    #[default]
    OnChanged,
    Always,
    Never,
}

impl fmt::Display for VendorBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VendorBehavior::OnChanged => "on-changed",
            VendorBehavior::Always => "always",
            VendorBehavior::Never => "never",
        };
        f.write_str(s)
    }
}

impl FromStr for VendorBehavior {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "on-changed" => Ok(VendorBehavior::OnChanged),
            "always" => Ok(VendorBehavior::Always),
            "never" => Ok(VendorBehavior::Never),
            other => Err(format!(
                "unknown vendor behavior {:?} (expected on-changed, always or never)",
                other
            )),
        }
    }
}

/// Outcome of [`plan_write`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WritePlan {
    pub write_lock: bool,
    pub write_vendor: bool,
    /// Empty when there was no old lock
    pub lock_diff: LockDelta,
}

/// Plan a write from the old and new locks and the on-disk vendor status
///
/// # Errors
///
/// - an old lock without a new lock
/// - a plan that writes vendor without a new lock
pub fn plan_write(
    old: Option<&Lock>,
    new: Option<&Lock>,
    behavior: VendorBehavior,
    status: &BTreeMap<String, VendorStatus>,
) -> Result<WritePlan> {
    let mut plan = WritePlan::default();

    match (old, new) {
        (Some(_), None) => return Err(TreeError::OldLockWithoutNewLock.into()),
        (Some(_), Some(_)) => {
            plan.lock_diff = diff_locks(old, new);
            plan.write_lock = plan.lock_diff.changed(DeltaDimension::ANY_EXCEPT_HASH);
        }
        (None, Some(_)) => plan.write_lock = true,
        (None, None) => {}
    }

    plan.write_vendor = match behavior {
        VendorBehavior::Always => true,
        VendorBehavior::Never => false,
        VendorBehavior::OnChanged => {
            (new.is_some() && old.is_none())
                || plan.lock_diff.changed(
                    DeltaDimension::ANY_EXCEPT_HASH & !DeltaDimension::INPUT_IMPORTS_CHANGED,
                )
                || status.values().any(|s| *s != VendorStatus::NoMismatch)
        }
    };

    if plan.write_vendor && new.is_none() {
        return Err(TreeError::VendorWithoutNewLock.into());
    }

    Ok(plan)
}
