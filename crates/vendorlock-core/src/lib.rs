//! vendorlock core - pure domain for transactional vendor tree writes
//!
//! This crate holds everything that needs no filesystem access:
//! - Lock, manifest, prune option and digest models
//! - Structural lock diffing and vendor verification status
//! - The write planner deciding which artifacts a write must touch
//! - Per-project change classification for minimal rewrites
//! - Human explanations of scheduled changes
//!
//! The filesystem side (staging, export, digesting, swapping) lives in
//! `vendorlock-store`.

pub mod classify;
pub mod errors;
pub mod explain;
pub mod logging_facility;
pub mod model;
pub mod plan;
pub mod verify;

// Re-export commonly used types
pub use classify::{classify_changes, ChangeReason, ChangeSet};
pub use errors::{ExError, ExErrorKind, Result, TreeError};
pub use explain::{change_explanation, trim_sha};
pub use model::{Lock, LockedProject, Manifest};
pub use plan::{plan_write, VendorBehavior, WritePlan};
pub use verify::{diff_locks, DeltaDimension, LockDelta, LockedProjectDelta, VendorStatus};
