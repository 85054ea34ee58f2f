pub mod digest;
pub mod lock;
pub mod manifest;
pub mod prune;

pub use digest::{VersionedDigest, HASH_VERSION};
pub use lock::{Lock, LockedProject, SolveMeta, LOCK_FILE_HEADER, LOCK_NAME};
pub use manifest::{Manifest, ProjectConstraint, EXAMPLE_MANIFEST, MANIFEST_NAME};
pub use prune::{CascadingPruneOptions, PruneOptionSet, PruneOptions};
