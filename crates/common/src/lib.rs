//! Testbed Common Library
//!
//! Shared types and the error taxonomy for the testbed harness.

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;

/// Harness version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
