//! AR7030 Plus remote control
//!
//! Drives an AOR AR7030 Plus receiver over its 1200 baud remote-control
//! line. The receiver exposes its memory pages through a one-byte opcode
//! protocol; everything here is built on reading and writing those pages.
//!
//! ## Architecture (Hexagonal / Ports & Adapters)
//!
//! - `domain/` - Pure domain types, no I/O dependencies
//! - `ports/` - Trait definitions (serial line, receiver control)
//! - `protocol/` - Opcode encoding, register map, unit conversions and the
//!   cached protocol session
//! - `adapters/` - Implementations of ports (serialport, AR7030 Plus driver,
//!   simulated receiver)
//! - `commands/` - Operations the command-line driver exposes
//! - `state/` - Shared connection state

// Core domain (pure, no I/O)
pub mod domain;
pub mod ports;
pub mod protocol;

// Adapters (external I/O)
pub mod adapters;

pub mod commands;
pub mod state;
