//! Port traits (interfaces)
//!
//! These traits define the boundaries between the protocol engine and
//! external I/O. Adapters implement these traits to connect to real hardware.

pub mod rig;
pub mod serial;

pub use rig::*;
pub use serial::*;
