//! Serial port commands: list, connect, disconnect

use crate::adapters::{Ar7030Plus, SerialPortFactory, SimulatedAr7030};
use crate::domain::{Configuration, RigError, RigInfo, RigResult, SerialPortInfo, Vfo};
use crate::ports::{RigControl, SerialConnection, SerialFactory};
use crate::state::RigState;

/// Port name reported for the simulated receiver
pub const SIMULATED_PORT: &str = "simulated";

pub fn list_serial_ports() -> RigResult<Vec<SerialPortInfo>> {
    SerialPortFactory::list_ports()
}

/// Open the port named in `config` (or the simulated receiver), open the
/// receiver and store it in RigState.
pub fn connect(state: &RigState, config: &Configuration) -> RigResult<RigInfo> {
    if config.simulate {
        return connect_with(
            state,
            config,
            Box::new(SimulatedAr7030::new()),
            SIMULATED_PORT,
        );
    }

    let port = config
        .serial_port
        .clone()
        .ok_or_else(|| RigError::Config(format!("Profile '{}' has no serial port", config.name)))?;
    let connection = SerialPortFactory::open(&port, config.baud_rate, config.timeout())?;
    connect_with(state, config, connection, &port)
}

/// Connect over an already open serial connection
pub fn connect_with(
    state: &RigState,
    config: &Configuration,
    connection: Box<dyn SerialConnection>,
    port: &str,
) -> RigResult<RigInfo> {
    let mut rig = Ar7030Plus::new(connection).with_post_write_delay(config.post_write_delay());
    rig.open()?;

    // Auto-detect: read ident, frequency and mode from the receiver
    let ident = rig.get_info()?;
    let frequency_hz = rig.get_frequency(Vfo::Current)?.as_hz();
    let (mode, _) = rig.get_mode(Vfo::Current)?;

    let info = RigInfo {
        port: port.to_string(),
        baud_rate: config.baud_rate,
        ident,
        frequency_hz,
        mode: mode.to_string(),
        connected: true,
    };
    log::info!("Connected to {} on {port}", info.ident);

    // Store receiver, port name and profile in shared state
    *state
        .rig
        .lock()
        .map_err(|_| RigError::Config("Receiver state corrupted".into()))? = Some(Box::new(rig));
    *state
        .port_name
        .lock()
        .map_err(|_| RigError::Config("Serial port state corrupted".into()))? = Some(port.to_string());
    *state
        .config
        .lock()
        .map_err(|_| RigError::Config("Configuration state corrupted".into()))? = config.clone();

    Ok(info)
}

pub fn disconnect(state: &RigState) -> RigResult<()> {
    let mut slot = state
        .rig
        .lock()
        .map_err(|_| RigError::Config("Receiver state corrupted".into()))?;
    if let Some(mut rig) = slot.take() {
        rig.close()?;
    }
    *state
        .port_name
        .lock()
        .map_err(|_| RigError::Config("Serial port state corrupted".into()))? = None;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulated_config() -> Configuration {
        Configuration {
            simulate: true,
            post_write_delay_ms: 0,
            ..Configuration::default()
        }
    }

    #[test]
    fn connect_simulated_reports_receiver() {
        let state = RigState::new();
        let info = connect(&state, &simulated_config()).unwrap();
        assert_eq!(info.port, SIMULATED_PORT);
        assert_eq!(info.ident, "7030_14B");
        assert_eq!(info.mode, "USB");
        assert!((info.frequency_hz - 14_070_000.0).abs() < 3.0);
        assert!(state.is_connected());
        assert_eq!(
            state.port_name.lock().unwrap().as_deref(),
            Some(SIMULATED_PORT)
        );
    }

    #[test]
    fn connect_without_port_is_config_error() {
        let state = RigState::new();
        let err = connect(&state, &Configuration::default()).unwrap_err();
        assert!(matches!(err, RigError::Config(_)));
        assert!(!state.is_connected());
    }

    #[test]
    fn disconnect_clears_state() {
        let state = RigState::new();
        connect(&state, &simulated_config()).unwrap();
        disconnect(&state).unwrap();
        assert!(!state.is_connected());
        assert_eq!(*state.port_name.lock().unwrap(), None);
        // idempotent
        disconnect(&state).unwrap();
    }
}
