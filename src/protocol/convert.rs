//! Pure conversions between raw receiver memory values and receiver units.
//!
//! No I/O, no side effects. Mappings over small closed sets (mode, AGC)
//! never fail: unknown raw values come back as `None`.

use crate::domain::{AgcSpeed, Mode, RigError, RigResult};

use super::memory::{working, CALIBRATION_LEN, FILTER_COUNT};

/// Reference clock of the DDS synthesiser
pub const DDS_CLOCK_HZ: f64 = 44_545_000.0;
/// 2^24: one full turn of the 24-bit phase accumulator
pub const DDS_MODULUS: f64 = 16_777_216.0;
/// 2.655 Hz per DDS step
pub const HZ_PER_STEP: f64 = DDS_CLOCK_HZ / DDS_MODULUS;
/// PBS and BFO offsets count in 12.5 DDS steps (33.19 Hz)
pub const PBS_STEP_HZ: f64 = HZ_PER_STEP * 12.5;
/// Notch frequency register counts 6.5536 steps per Hz
pub const NOTCH_STEPS_PER_HZ: f64 = 6.5536;

pub const MIN_FREQ_HZ: f64 = 10_000.0;
pub const MAX_FREQ_HZ: f64 = 32_010_000.0;

pub const VOL_MIN: u8 = 15;
pub const VOL_MAX: u8 = 63;

/// Native mode byte for "no mode" (empty memory, corrupted register)
pub const MODE_NONE: u8 = 0;

/// Receiver mode ↔ native mode byte
const MODE_TABLE: &[(Mode, u8)] = &[
    (Mode::Am, 1),
    (Mode::Sam, 2),
    (Mode::Fm, 3),
    (Mode::Data, 4),
    (Mode::Cw, 5),
    (Mode::Lsb, 6),
    (Mode::Usb, 7),
];

/// AGC speed ↔ native agcspd byte
const AGC_TABLE: &[(AgcSpeed, u8)] = &[
    (AgcSpeed::Fast, 0),
    (AgcSpeed::Medium, 1),
    (AgcSpeed::Slow, 2),
    (AgcSpeed::Off, 3),
];

/// Convert a DDS step count to Hz
pub fn dds_to_hz(steps: u32) -> f64 {
    steps as f64 * DDS_CLOCK_HZ / DDS_MODULUS
}

/// Convert Hz to the DDS step count whose frequency is nearest.
///
/// The step size is irrational relative to 1 Hz, so the rounded estimate is
/// checked against its neighbours and the closest of the three wins. Ties
/// stay with the estimate.
pub fn hz_to_dds(freq: f64) -> u32 {
    let estimate = (freq * DDS_MODULUS / DDS_CLOCK_HZ)
        .round()
        .clamp(0.0, u32::MAX as f64) as u32;
    let error = |steps: u32| (freq - dds_to_hz(steps)).abs();

    let mut best = estimate;
    let mut best_err = error(estimate);
    for candidate in [estimate.checked_sub(1), estimate.checked_add(1)]
        .into_iter()
        .flatten()
    {
        let err = error(candidate);
        if err < best_err {
            best = candidate;
            best_err = err;
        }
    }

    log::debug!("hz_to_dds: {freq} Hz -> 0x{best:06x} (error {best_err:.3} Hz)");
    best
}

/// Decode two BCD digits
pub fn bcd_to_int(bcd: u8) -> RigResult<u8> {
    let hi = bcd >> 4;
    let lo = bcd & 0x0f;
    if hi > 9 || lo > 9 {
        return Err(RigError::InvalidBcd(bcd));
    }
    Ok(hi * 10 + lo)
}

/// Encode 0..=99 as two BCD digits
pub fn int_to_bcd(value: u8) -> RigResult<u8> {
    if value > 99 {
        return Err(RigError::InvalidArgument(format!(
            "{value} does not fit in two BCD digits"
        )));
    }
    Ok(((value / 10) << 4) | (value % 10))
}

/// Decode a PBS/BFO byte to Hz.
///
/// The receiver stores these offsets in one's complement: bit 7 set means
/// negative, magnitude is the inverted low seven bits.
pub fn pbs_steps_to_hz(steps: u8) -> f64 {
    if steps < 0x80 {
        steps as f64 * PBS_STEP_HZ
    } else {
        -((!steps & 0x7f) as f64) * PBS_STEP_HZ
    }
}

/// Encode Hz as a one's-complement PBS/BFO byte, clamped to ±127 steps
pub fn hz_to_pbs_steps(hz: f64) -> u8 {
    let magnitude = (hz.abs() / PBS_STEP_HZ).round().min(127.0) as u8;
    if hz < 0.0 && magnitude > 0 {
        !magnitude
    } else {
        magnitude
    }
}

pub fn mode_to_native(mode: Mode) -> u8 {
    MODE_TABLE
        .iter()
        .find(|(m, _)| *m == mode)
        .map(|(_, n)| *n)
        .unwrap_or(MODE_NONE)
}

/// Low nibble of the byte is the mode; anything unknown is `None`
pub fn native_to_mode(native: u8) -> Option<Mode> {
    MODE_TABLE
        .iter()
        .find(|(_, n)| *n == native & 0x0f)
        .map(|(m, _)| *m)
}

/// Mode of a stored memory: only bits 0-2 of its mode/filter byte
pub fn channel_mode(mode_byte: u8) -> Option<Mode> {
    native_to_mode(mode_byte & 0x07)
}

pub fn agc_to_native(agc: AgcSpeed) -> u8 {
    AGC_TABLE
        .iter()
        .find(|(a, _)| *a == agc)
        .map(|(_, n)| *n)
        .unwrap_or(1)
}

pub fn native_to_agc(native: u8) -> Option<AgcSpeed> {
    AGC_TABLE
        .iter()
        .find(|(_, n)| *n == native)
        .map(|(a, _)| *a)
}

/// Volume 0.0..=1.0 → af_vol (6 bits, 15 is silent, 63 is full)
pub fn volume_to_native(level: f32) -> u8 {
    let span = (VOL_MAX - VOL_MIN) as f32;
    let v = (level.clamp(0.0, 1.0) * span) as u8 + VOL_MIN;
    v & 0x3f
}

pub fn native_to_volume(native: u8) -> f32 {
    let v = (native & 0x3f) as f32;
    ((v - VOL_MIN as f32) / (VOL_MAX - VOL_MIN) as f32).clamp(0.0, 1.0)
}

/// Left/right balance registers carry half the main volume
pub fn volume_to_balance(af_vol: u8) -> u8 {
    (af_vol >> 1) & 0x1f
}

/// IF gain 0.0..=1.0 → ifgain byte, 0 (max gain) to 134
pub fn if_gain_to_native(level: f32) -> u8 {
    134u32.saturating_sub((level.clamp(0.0, 1.0) * 135.0) as u32) as u8
}

pub fn native_to_if_gain(native: u8) -> f32 {
    ((134 - native as i32) as f32 / 135.0).clamp(0.0, 1.0)
}

pub fn squelch_to_native(level: f32) -> u8 {
    (level.clamp(0.0, 1.0) * 255.0).round() as u8
}

pub fn native_to_squelch(native: u8) -> f32 {
    native as f32 / 255.0
}

/// rfgain 0 is the preamp stage; 1 bypasses it
pub fn preamp_to_rfgain(db: i32) -> u8 {
    if db >= 10 {
        0
    } else {
        1
    }
}

pub fn rfgain_to_preamp(rfgain: u8) -> i32 {
    if rfgain == 0 {
        10
    } else {
        0
    }
}

/// Attenuation in dB → rfgain steps 1 (none) to 5
pub fn attenuation_to_rfgain(db: i32) -> u8 {
    match db {
        i32::MIN..=9 => 1,
        10..=19 => 2,
        20..=39 => 3,
        40..=79 => 4,
        _ => 5,
    }
}

pub fn rfgain_to_attenuation(rfgain: u8) -> i32 {
    match rfgain {
        2 => 10,
        3 => 20,
        4 => 40,
        5 => 80,
        _ => 0,
    }
}

pub fn notch_steps_to_hz(steps: u16) -> f64 {
    steps as f64 / NOTCH_STEPS_PER_HZ
}

/// Tuning step in Hz → 16-bit chnstp DDS count
pub fn hz_to_step_count(step_hz: u32) -> RigResult<u16> {
    u16::try_from(hz_to_dds(step_hz as f64)).map_err(|_| {
        RigError::InvalidArgument(format!("Tuning step {step_hz} Hz is too large"))
    })
}

pub fn step_count_to_hz(steps: u16) -> u32 {
    dds_to_hz(steps as u32).round() as u32
}

/// Filter bandwidth byte (two BCD digits of x.x kHz) → Hz
pub fn filter_width_from_bcd(bcd: u8) -> RigResult<u32> {
    Ok(bcd_to_int(bcd)? as u32 * 100)
}

/// dBm of calibration entry 0 (S1)
const S1_DBM: i32 = -113;

/// dB spanned by each calibration entry. Entry 0 covers the region below
/// S1 and is treated as a 20 dB step.
const CAL_STEP_DB: [u8; CALIBRATION_LEN] = [20, 10, 10, 10, 10, 10, 20, 20];

/// Offset that moves dBm onto the S9 = 0 scale
const S9_DBM_OFFSET: i32 = 73;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationStep {
    /// dB covered by this entry
    pub step_db: u8,
    /// AGC counts covered by this entry
    pub raw: u8,
}

/// S-meter calibration from the receiver's EEPROM.
///
/// Entry 0 holds the AGC reading for S1 (-113 dBm); each later entry holds
/// the AGC increment for the next 10 or 20 dB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalibrationTable {
    steps: [CalibrationStep; CALIBRATION_LEN],
}

impl CalibrationTable {
    pub fn from_eeprom(raw: [u8; CALIBRATION_LEN]) -> Self {
        let mut steps = [CalibrationStep { step_db: 0, raw: 0 }; CALIBRATION_LEN];
        for (i, step) in steps.iter_mut().enumerate() {
            *step = CalibrationStep {
                step_db: CAL_STEP_DB[i],
                raw: raw[i],
            };
        }
        Self { steps }
    }

    pub fn steps(&self) -> &[CalibrationStep] {
        &self.steps
    }

    /// Signal level in dBm at the top of entry `index`
    pub fn dbm_at(&self, index: usize) -> i32 {
        S1_DBM
            + self.steps[1..=index.min(CALIBRATION_LEN - 1)]
                .iter()
                .map(|s| s.step_db as i32)
                .sum::<i32>()
    }
}

/// Convert a raw AGC reading into dB relative to S9.
///
/// Table entries are subtracted from the reading until the next one would
/// leave it negative. The level is the dBm of the last entry fully passed,
/// plus the remainder proportioned into the entry that stopped the walk.
/// `rxcon` is the first RXCON byte (address 40): an enabled attenuator adds
/// 10 dB (20 dB at the high setting) and the preamp takes 10 dB off.
pub fn get_calibrated_level(raw_agc: u8, table: &CalibrationTable, rxcon: u8) -> i32 {
    let last = CALIBRATION_LEN - 1;
    let mut remainder = raw_agc as i32;
    let mut dbm = table.dbm_at(last);

    for (i, step) in table.steps().iter().enumerate() {
        let threshold = step.raw as i32;
        if remainder < threshold {
            let base = if i == 0 {
                S1_DBM - step.step_db as i32
            } else {
                table.dbm_at(i - 1)
            };
            let fine = (remainder as f64 * step.step_db as f64 / threshold as f64).round() as i32;
            log::debug!(
                "calibration: raw {raw_agc} stops at entry {i}, base {base} dBm, remainder {remainder}, fine {fine} dB"
            );
            dbm = base + fine;
            break;
        }
        remainder -= threshold;
    }

    if rxcon & working::RX_ATN != 0 {
        dbm += if rxcon & working::RX_ATR != 0 { 20 } else { 10 };
    }
    if rxcon & working::RX_PRE != 0 {
        dbm -= 10;
    }

    dbm + S9_DBM_OFFSET
}

/// Bandwidths of filters 1..=6 in Hz, read once at open. Zero marks a
/// position with no filter fitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterBandwidthTable {
    widths: [u32; FILTER_COUNT],
}

impl FilterBandwidthTable {
    pub fn new(widths: [u32; FILTER_COUNT]) -> Self {
        Self { widths }
    }

    pub fn widths(&self) -> &[u32; FILTER_COUNT] {
        &self.widths
    }

    /// Bandwidth of filter number 1..=6
    pub fn bandwidth(&self, filter: u8) -> Option<u32> {
        match filter {
            1..=6 => Some(self.widths[filter as usize - 1]),
            _ => None,
        }
    }

    /// Filter number of the narrowest fitted filter at least `width_hz`
    /// wide, or of the widest filter when none is wide enough.
    pub fn select(&self, width_hz: u32) -> u8 {
        let mut narrowest: Option<(u8, u32)> = None;
        let mut widest: (u8, u32) = (1, self.widths[0]);

        for (i, &w) in self.widths.iter().enumerate() {
            let filter = i as u8 + 1;
            if w > widest.1 {
                widest = (filter, w);
            }
            if w > 0 && w >= width_hz && narrowest.map_or(true, |(_, best)| w < best) {
                narrowest = Some((filter, w));
            }
        }

        narrowest.unwrap_or(widest).0
    }
}
