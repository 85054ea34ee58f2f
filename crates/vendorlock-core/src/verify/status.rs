use std::fmt;

/// On-disk state of one vendored project relative to the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VendorStatus {
    /// Tree digest matches the lock
    NoMismatch,
    /// In the lock but absent from the vendor tree
    NotInTree,
    /// In the vendor tree but not in the lock
    NotInLock,
    /// Tree digest differs from the one recorded in the lock
    DigestMismatchInLock,
    /// The lock digest was produced by a different hashing algorithm
    HashVersionMismatch,
    /// The lock has no digest for this project
    EmptyDigestInLock,
}

impl fmt::Display for VendorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VendorStatus::NoMismatch => "match",
            VendorStatus::NotInTree => "missing from vendor",
            VendorStatus::NotInLock => "not in lock",
            VendorStatus::DigestMismatchInLock => "digest mismatch",
            VendorStatus::HashVersionMismatch => "hash version mismatch",
            VendorStatus::EmptyDigestInLock => "no digest in lock",
        };
        f.write_str(s)
    }
}
