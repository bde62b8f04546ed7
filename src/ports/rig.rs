//! Receiver control port trait
//!
//! The uniform command surface every receiver backend exposes. A backend
//! overrides what its hardware supports; the rest report `Unimplemented`.

use crate::domain::{
    ChannelData, ClockTime, Dcd, Frequency, LevelKind, LevelValue, Mode, PowerStatus, ResetKind,
    RigError, RigResult, Vfo,
};

fn unimplemented<T>(what: &str) -> RigResult<T> {
    Err(RigError::Unimplemented(what.to_string()))
}

/// Trait for receiver control (frequency, mode, levels, memories)
pub trait RigControl: Send {
    /// Synchronise with the receiver and load its per-unit tables
    fn open(&mut self) -> RigResult<()>;

    /// Release the receiver
    fn close(&mut self) -> RigResult<()>;

    fn set_frequency(&mut self, vfo: Vfo, freq: Frequency) -> RigResult<()>;

    fn get_frequency(&mut self, vfo: Vfo) -> RigResult<Frequency>;

    /// Set mode, and optionally the narrowest filter at least `width_hz` wide
    fn set_mode(&mut self, vfo: Vfo, mode: Mode, width_hz: Option<u32>) -> RigResult<()>;

    /// Current mode and passband width in Hz
    fn get_mode(&mut self, vfo: Vfo) -> RigResult<(Mode, u32)>;

    fn set_level(&mut self, level: LevelKind, value: LevelValue) -> RigResult<()>;

    fn get_level(&mut self, level: LevelKind) -> RigResult<LevelValue>;

    fn set_tuning_step(&mut self, step_hz: u32) -> RigResult<()>;

    fn get_tuning_step(&mut self) -> RigResult<u32>;

    fn get_power_status(&mut self) -> RigResult<PowerStatus>;

    fn reset(&mut self, kind: ResetKind) -> RigResult<()>;

    fn get_channel(&mut self, channel: u16) -> RigResult<ChannelData>;

    fn set_power_status(&mut self, _status: PowerStatus) -> RigResult<()> {
        unimplemented("set_power_status")
    }

    fn set_channel(&mut self, _channel: &ChannelData) -> RigResult<()> {
        unimplemented("set_channel")
    }

    /// Make `vfo` the active one
    fn set_vfo(&mut self, _vfo: Vfo) -> RigResult<()> {
        unimplemented("set_vfo")
    }

    /// The active VFO, `A` or `B`
    fn get_vfo(&mut self) -> RigResult<Vfo> {
        unimplemented("get_vfo")
    }

    /// Swap the active VFO
    fn toggle_vfo(&mut self) -> RigResult<()> {
        unimplemented("toggle_vfo")
    }

    fn get_dcd(&mut self) -> RigResult<Dcd> {
        unimplemented("get_dcd")
    }

    /// Model / firmware identification string
    fn get_info(&mut self) -> RigResult<String> {
        unimplemented("get_info")
    }

    fn get_clock(&mut self) -> RigResult<ClockTime> {
        unimplemented("get_clock")
    }
}
