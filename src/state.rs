//! Application state

use std::sync::Mutex;

use crate::domain::Configuration;
use crate::ports::RigControl;

/// Shared state for the command layer.
///
/// One mutex guards the whole driver: the protocol session's shadow cache
/// is not safe to share between callers.
pub struct RigState {
    pub rig: Mutex<Option<Box<dyn RigControl>>>,
    pub port_name: Mutex<Option<String>>,
    pub config: Mutex<Configuration>,
}

impl RigState {
    pub fn new() -> Self {
        Self {
            rig: Mutex::new(None),
            port_name: Mutex::new(None),
            config: Mutex::new(Configuration::default()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.rig.lock().map(|r| r.is_some()).unwrap_or(false)
    }
}

impl Default for RigState {
    fn default() -> Self {
        Self::new()
    }
}
