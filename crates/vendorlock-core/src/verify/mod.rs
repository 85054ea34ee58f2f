//! Lock diffing and vendor verification status.

pub mod delta;
pub mod status;

pub use delta::{diff_locks, DeltaDimension, LockDelta, LockedProjectDelta};
pub use status::VendorStatus;
