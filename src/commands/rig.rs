//! Receiver control commands: frequency, mode, levels, memories
//!
//! Each command locks the receiver in RigState, checks it is connected and
//! calls the trait method.
//!
//! Transport errors (`RigError::Io`) abort the operation mid-flight. The
//! whole operation is retried from scratch up to `retries` times, never
//! resumed, because the receiver's registers are unknown after a failure.
//! If the line keeps failing the receiver is dropped from RigState so the
//! next command reports it disconnected.

use crate::domain::{
    ChannelData, ClockTime, Dcd, Frequency, LevelKind, LevelValue, Mode, PowerStatus, ResetKind,
    RigError, RigResult, Vfo,
};
use crate::ports::RigControl;
use crate::state::RigState;

/// Lock the receiver mutex, check it is connected, and run `f` on it.
pub fn with_rig<T>(
    state: &RigState,
    mut f: impl FnMut(&mut dyn RigControl) -> RigResult<T>,
) -> RigResult<T> {
    let retries = state
        .config
        .lock()
        .map_err(|_| RigError::Config("Configuration state corrupted".into()))?
        .retries;

    let mut guard = state
        .rig
        .lock()
        .map_err(|_| RigError::Config("Receiver state corrupted".into()))?;
    let rig = guard.as_mut().ok_or(RigError::NotOpen)?;

    let mut attempt = 0;
    let result = loop {
        match f(&mut **rig) {
            Err(e) if e.is_transport() && attempt < retries => {
                attempt += 1;
                log::warn!("Receiver operation failed, retrying ({attempt}/{retries}): {e}");
            }
            other => break other,
        }
    };

    if let Err(e) = &result {
        if e.is_transport() {
            // The line is gone; drop the receiver
            *guard = None;
            drop(guard); // Release receiver mutex before taking the port-name mutex
            let port = state
                .port_name
                .lock()
                .ok()
                .and_then(|mut p| p.take())
                .unwrap_or_default();
            log::warn!("Receiver on '{port}' disconnected: {e}");
        }
    }

    result
}

pub fn get_frequency(state: &RigState, vfo: Vfo) -> RigResult<f64> {
    with_rig(state, |r| r.get_frequency(vfo).map(|f| f.as_hz()))
}

pub fn set_frequency(state: &RigState, vfo: Vfo, freq_hz: f64) -> RigResult<()> {
    with_rig(state, |r| r.set_frequency(vfo, Frequency::hz(freq_hz)))
}

pub fn get_mode(state: &RigState, vfo: Vfo) -> RigResult<(Mode, u32)> {
    with_rig(state, |r| r.get_mode(vfo))
}

pub fn set_mode(state: &RigState, vfo: Vfo, mode: Mode, width_hz: Option<u32>) -> RigResult<()> {
    with_rig(state, |r| r.set_mode(vfo, mode, width_hz))
}

pub fn get_level(state: &RigState, level: LevelKind) -> RigResult<LevelValue> {
    with_rig(state, |r| r.get_level(level))
}

pub fn set_level(state: &RigState, level: LevelKind, value: LevelValue) -> RigResult<()> {
    with_rig(state, |r| r.set_level(level, value))
}

pub fn get_tuning_step(state: &RigState) -> RigResult<u32> {
    with_rig(state, |r| r.get_tuning_step())
}

pub fn set_tuning_step(state: &RigState, step_hz: u32) -> RigResult<()> {
    with_rig(state, |r| r.set_tuning_step(step_hz))
}

pub fn get_power_status(state: &RigState) -> RigResult<PowerStatus> {
    with_rig(state, |r| r.get_power_status())
}

pub fn set_power_status(state: &RigState, status: PowerStatus) -> RigResult<()> {
    with_rig(state, |r| r.set_power_status(status))
}

pub fn reset(state: &RigState, kind: ResetKind) -> RigResult<()> {
    with_rig(state, |r| r.reset(kind))
}

pub fn get_channel(state: &RigState, channel: u16) -> RigResult<ChannelData> {
    with_rig(state, |r| r.get_channel(channel))
}

pub fn set_vfo(state: &RigState, vfo: Vfo) -> RigResult<()> {
    with_rig(state, |r| r.set_vfo(vfo))
}

pub fn get_vfo(state: &RigState) -> RigResult<Vfo> {
    with_rig(state, |r| r.get_vfo())
}

pub fn toggle_vfo(state: &RigState) -> RigResult<()> {
    with_rig(state, |r| r.toggle_vfo())
}

pub fn get_dcd(state: &RigState) -> RigResult<Dcd> {
    with_rig(state, |r| r.get_dcd())
}

pub fn get_info(state: &RigState) -> RigResult<String> {
    with_rig(state, |r| r.get_info())
}

pub fn get_clock(state: &RigState) -> RigResult<ClockTime> {
    with_rig(state, |r| r.get_clock())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fails with a transport error a set number of times, then succeeds
    struct FlakyRig {
        failures_left: u32,
    }

    impl RigControl for FlakyRig {
        fn open(&mut self) -> RigResult<()> {
            Ok(())
        }
        fn close(&mut self) -> RigResult<()> {
            Ok(())
        }
        fn set_frequency(&mut self, _vfo: Vfo, _freq: Frequency) -> RigResult<()> {
            Err(RigError::InvalidArgument("out of range".into()))
        }
        fn get_frequency(&mut self, _vfo: Vfo) -> RigResult<Frequency> {
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(RigError::Io("timeout".into()));
            }
            Ok(Frequency::mhz(10.0))
        }
        fn set_mode(&mut self, _vfo: Vfo, _mode: Mode, _width: Option<u32>) -> RigResult<()> {
            Ok(())
        }
        fn get_mode(&mut self, _vfo: Vfo) -> RigResult<(Mode, u32)> {
            Ok((Mode::Am, 6500))
        }
        fn set_level(&mut self, _level: LevelKind, _value: LevelValue) -> RigResult<()> {
            Ok(())
        }
        fn get_level(&mut self, _level: LevelKind) -> RigResult<LevelValue> {
            Ok(LevelValue::Int(0))
        }
        fn set_tuning_step(&mut self, _step_hz: u32) -> RigResult<()> {
            Ok(())
        }
        fn get_tuning_step(&mut self) -> RigResult<u32> {
            Ok(5000)
        }
        fn get_power_status(&mut self) -> RigResult<PowerStatus> {
            Ok(PowerStatus::On)
        }
        fn reset(&mut self, _kind: ResetKind) -> RigResult<()> {
            Ok(())
        }
        fn get_channel(&mut self, _channel: u16) -> RigResult<ChannelData> {
            Err(RigError::Unimplemented("get_channel".into()))
        }
    }

    fn state_with(failures: u32, retries: u32) -> RigState {
        let state = RigState::new();
        state.config.lock().unwrap().retries = retries;
        *state.rig.lock().unwrap() = Some(Box::new(FlakyRig {
            failures_left: failures,
        }));
        *state.port_name.lock().unwrap() = Some("/dev/ttyUSB0".into());
        state
    }

    #[test]
    fn no_receiver_is_not_open() {
        let state = RigState::new();
        assert_eq!(get_frequency(&state, Vfo::A), Err(RigError::NotOpen));
    }

    #[test]
    fn transient_failure_retried() {
        let state = state_with(2, 2);
        assert_eq!(get_frequency(&state, Vfo::A).unwrap(), 10_000_000.0);
        assert!(state.is_connected());
    }

    #[test]
    fn persistent_failure_drops_receiver() {
        let state = state_with(5, 1);
        let err = get_frequency(&state, Vfo::A).unwrap_err();
        assert!(err.is_transport());
        assert!(!state.is_connected());
        assert_eq!(*state.port_name.lock().unwrap(), None);
        assert_eq!(get_mode(&state, Vfo::A), Err(RigError::NotOpen));
    }

    #[test]
    fn argument_errors_not_retried_and_keep_receiver() {
        let state = state_with(0, 3);
        assert!(matches!(
            set_frequency(&state, Vfo::A, 1.0),
            Err(RigError::InvalidArgument(_))
        ));
        assert!(state.is_connected());
    }

    #[test]
    fn commands_pass_through() {
        let state = state_with(0, 0);
        assert_eq!(get_mode(&state, Vfo::B).unwrap(), (Mode::Am, 6500));
        assert_eq!(get_tuning_step(&state).unwrap(), 5000);
        assert_eq!(get_power_status(&state).unwrap(), PowerStatus::On);
        assert!(matches!(get_info(&state), Err(RigError::Unimplemented(_))));
    }
}
