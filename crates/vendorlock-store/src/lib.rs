//! vendorlock store - filesystem side of transactional vendor writes
//!
//! Provides:
//! - Rename and atomic write primitives
//! - Directory digests and vendor tree verification
//! - The source export capability and whole-lock export
//! - Project loading
//! - The full and minimal tree writers

pub mod deptree;
pub mod errors;
pub mod fs;
pub mod project;
pub mod source;
pub mod verify;
pub mod writer;

// Re-export key types
pub use deptree::{write_dep_tree, WriteProgress};
pub use errors::Result;
pub use project::Project;
pub use source::{CancelToken, LocalSourceProvider, SourceProvider};
pub use verify::{check_dep_tree, digest_from_directory};
pub use writer::{
    new_delta_writer, new_delta_writer_with_options, DeltaWriter, FsRenamer, Renamer, SafeWriter,
    TreeWriter, WriterOptions,
};
