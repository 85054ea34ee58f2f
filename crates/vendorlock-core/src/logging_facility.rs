//! Structured logging facility for vendorlock
//!
//! - Single initialization point via `init(profile)`
//! - Structured logging macros (`log_op_start!`, `log_op_end!`, `log_op_error!`)
//! - Test capture mode for deterministic assertions
//!
//! # Usage
//!
//! ```rust
//! use vendorlock_core::logging_facility::{init, Profile};
//!
//! init(Profile::Development);
//! ```
//!
//! Progress lines meant for a human (the `logger` argument of a tree write)
//! are separate from these events; both are emitted during a real write.

pub mod init;
pub mod macros;
pub mod test_capture;

pub use init::{init, Profile};
pub use test_capture::{init_test_capture, CapturedEvent, TestCapture};
