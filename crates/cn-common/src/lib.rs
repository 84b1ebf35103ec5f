//! Certificate notification common types, buffers, and errors.
//!
//! This crate provides foundational types shared across the cn-* crates:
//! - The error taxonomy with stable codes
//! - Exclusively owned fixed-length buffers
//! - Helper process identifiers

pub mod buffer;
pub mod error;
pub mod id;

pub use buffer::Buffer;
pub use error::{format_error_human, Error, ErrorCategory, Result};
pub use id::ProcessIds;
