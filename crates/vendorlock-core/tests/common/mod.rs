use std::collections::BTreeMap;
use vendorlock_core::model::{Lock, LockedProject, SolveMeta};
use vendorlock_core::VendorStatus;

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

/// Every project in `lock` with the given status
#[allow(dead_code)]
pub fn uniform_status(lock: &Lock, status: VendorStatus) -> BTreeMap<String, VendorStatus> {
    lock.projects()
        .iter()
        .map(|p| (p.name.clone(), status))
        .collect()
}
