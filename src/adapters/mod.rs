//! Adapters: concrete implementations of the port traits

pub mod ar7030p;
pub mod serial_port;
pub mod simulated;

pub use ar7030p::Ar7030Plus;
pub use serial_port::SerialPortFactory;
pub use simulated::SimulatedAr7030;
