//! Core domain types
//!
//! Pure types with no I/O dependencies. These represent the receiver-level
//! concepts (frequency, mode, levels, memories) that callers work with.

pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;
