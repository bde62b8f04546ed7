//! Commands: the operations the command-line driver exposes

pub mod config;
pub mod rig;
pub mod serial;
