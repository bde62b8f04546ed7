//! Core domain types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::RigError;

/// Frequency in Hz
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frequency(pub f64);

impl Frequency {
    pub fn hz(hz: f64) -> Self {
        Self(hz)
    }

    pub fn khz(khz: f64) -> Self {
        Self(khz * 1_000.0)
    }

    pub fn mhz(mhz: f64) -> Self {
        Self(mhz * 1_000_000.0)
    }

    pub fn as_hz(&self) -> f64 {
        self.0
    }
}

/// Which of the receiver's two tuning memories an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vfo {
    /// Whatever VFO is active; on the AR7030 this is always VFO A's working area
    Current,
    A,
    B,
}

impl FromStr for Vfo {
    type Err = RigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CURR" | "CURRENT" => Ok(Vfo::Current),
            "A" | "VFOA" => Ok(Vfo::A),
            "B" | "VFOB" => Ok(Vfo::B),
            _ => Err(RigError::InvalidArgument(format!("Unknown VFO '{s}'"))),
        }
    }
}

/// Demodulator modes supported by the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Am,
    /// Synchronous AM
    Sam,
    Fm,
    /// Data (RTTY) - USB with the data filter set
    Data,
    Cw,
    Lsb,
    Usb,
}

/// Mode ↔ display name. Single source of truth for parsing and printing.
const MODE_NAMES: &[(Mode, &str)] = &[
    (Mode::Am, "AM"),
    (Mode::Sam, "SAM"),
    (Mode::Fm, "FM"),
    (Mode::Data, "DATA"),
    (Mode::Cw, "CW"),
    (Mode::Lsb, "LSB"),
    (Mode::Usb, "USB"),
];

impl Mode {
    pub fn name(&self) -> &'static str {
        MODE_NAMES
            .iter()
            .find(|(m, _)| m == self)
            .map(|(_, n)| *n)
            .unwrap_or("?")
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = RigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        MODE_NAMES
            .iter()
            .find(|(_, n)| *n == upper)
            .map(|(m, _)| *m)
            .ok_or_else(|| RigError::InvalidArgument(format!("Unknown mode '{s}'")))
    }
}

/// AGC decay speeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgcSpeed {
    Fast,
    Medium,
    Slow,
    Off,
}

impl FromStr for AgcSpeed {
    type Err = RigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(AgcSpeed::Fast),
            "medium" | "med" => Ok(AgcSpeed::Medium),
            "slow" => Ok(AgcSpeed::Slow),
            "off" => Ok(AgcSpeed::Off),
            _ => Err(RigError::InvalidArgument(format!("Unknown AGC speed '{s}'"))),
        }
    }
}

/// Receiver levels that can be read and (mostly) written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelKind {
    /// Preamplifier gain in dB (0 or 10)
    Preamp,
    /// RF attenuation in dB
    Attenuator,
    /// Audio volume, 0.0 to 1.0
    AudioGain,
    /// IF gain, 0.0 to 1.0
    RfGain,
    /// Squelch threshold, 0.0 to 1.0
    Squelch,
    /// Passband shift in Hz
    PassbandShift,
    /// BFO offset in Hz
    CwPitch,
    Agc,
    /// Notch filter frequency in Hz
    NotchFrequency,
    /// Uncalibrated AGC voltage, 0 to 255
    RawSignalStrength,
    /// Calibrated signal level in dB relative to S9
    SignalStrength,
}

impl LevelKind {
    /// Parse a textual value into the representation this level expects
    pub fn parse_value(&self, s: &str) -> Result<LevelValue, RigError> {
        let bad = || RigError::InvalidArgument(format!("Invalid value '{s}' for {self:?}"));
        match self {
            LevelKind::Agc => s.parse().map(LevelValue::Agc),
            LevelKind::AudioGain
            | LevelKind::RfGain
            | LevelKind::Squelch
            | LevelKind::PassbandShift
            | LevelKind::CwPitch => s.trim().parse().map(LevelValue::Float).map_err(|_| bad()),
            _ => s.trim().parse().map(LevelValue::Int).map_err(|_| bad()),
        }
    }
}

impl FromStr for LevelKind {
    type Err = RigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use LevelKind::*;
        match s.to_ascii_uppercase().as_str() {
            "PREAMP" => Ok(Preamp),
            "ATT" => Ok(Attenuator),
            "AF" => Ok(AudioGain),
            "RF" => Ok(RfGain),
            "SQL" => Ok(Squelch),
            "PBT_IN" | "PBS" => Ok(PassbandShift),
            "CWPITCH" | "BFO" => Ok(CwPitch),
            "AGC" => Ok(Agc),
            "NOTCHF" => Ok(NotchFrequency),
            "RAWSTR" => Ok(RawSignalStrength),
            "STRENGTH" => Ok(SignalStrength),
            _ => Err(RigError::InvalidArgument(format!("Unknown level '{s}'"))),
        }
    }
}

/// Value carried by a level get/set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LevelValue {
    Int(i32),
    Float(f32),
    Agc(AgcSpeed),
}

impl LevelValue {
    pub fn as_i32(&self) -> Result<i32, RigError> {
        match self {
            LevelValue::Int(i) => Ok(*i),
            other => Err(RigError::InvalidArgument(format!(
                "Expected integer level value, got {other:?}"
            ))),
        }
    }

    pub fn as_f32(&self) -> Result<f32, RigError> {
        match self {
            LevelValue::Float(f) => Ok(*f),
            LevelValue::Int(i) => Ok(*i as f32),
            other => Err(RigError::InvalidArgument(format!(
                "Expected numeric level value, got {other:?}"
            ))),
        }
    }

    pub fn as_agc(&self) -> Result<AgcSpeed, RigError> {
        match self {
            LevelValue::Agc(a) => Ok(*a),
            other => Err(RigError::InvalidArgument(format!(
                "Expected AGC speed, got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for LevelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelValue::Int(i) => write!(f, "{i}"),
            LevelValue::Float(v) => write!(f, "{v:.3}"),
            LevelValue::Agc(a) => write!(f, "{a:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerStatus {
    On,
    Off,
}

/// Carrier detect: `Open` while the squelch passes audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dcd {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetKind {
    /// Re-run the receiver's switch-on setup
    Soft,
    Vfo,
    MemoryClear,
    Master,
}

/// Receiver real-time clock reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockTime {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
}

/// One stored frequency memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelData {
    pub channel: u16,
    pub frequency_hz: f64,
    /// `None` when the stored mode nibble is not a known mode (e.g. empty memory)
    pub mode: Option<Mode>,
    /// Filter number 1..=6 (0 for an empty memory)
    pub filter: u8,
    /// Bandwidth of `filter` from the receiver's filter table, 0 if unknown
    pub width_hz: u32,
    pub scan_lockout: bool,
    pub passband_shift_hz: f64,
    /// Squelch, or BFO offset for Data and CW memories
    pub squelch: u8,
    pub ident: String,
}

/// Information about a serial port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialPortInfo {
    pub name: String,
    pub port_type: String,
}

/// Receiver connection information returned after successful connect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigInfo {
    pub port: String,
    pub baud_rate: u32,
    pub ident: String,
    pub frequency_hz: f64,
    pub mode: String,
    pub connected: bool,
}
