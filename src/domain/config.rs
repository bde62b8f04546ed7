//! Configuration profiles
//!
//! A Configuration is a saved profile for one receiver hookup: which serial
//! port it sits on and the line timing the AR7030 needs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_retries() -> u32 {
    0
}

/// A saved configuration profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Profile name (e.g., "Shack AR7030", "Monitoring post 2")
    pub name: String,
    /// Selected serial port name
    pub serial_port: Option<String>,
    /// Serial baud rate. The receiver only talks 1200 8N1.
    pub baud_rate: u32,
    /// Per-read timeout in milliseconds
    pub timeout_ms: u64,
    /// Delay after each opcode byte, in milliseconds (manual recommends 12)
    pub post_write_delay_ms: u64,
    /// Whole-operation retries on transport failure
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Talk to the in-process simulated receiver instead of a serial port
    #[serde(default)]
    pub simulate: bool,
}

impl Configuration {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn post_write_delay(&self) -> Duration {
        Duration::from_millis(self.post_write_delay_ms)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            serial_port: None,
            baud_rate: 1200,
            timeout_ms: 650,
            post_write_delay_ms: 12,
            retries: default_retries(),
            simulate: false,
        }
    }
}
