//! AOR AR7030 Plus receiver adapter
//!
//! Everything the receiver does is driven by reading and writing its
//! memory, then running a firmware routine so the new values take effect:
//! - every operation runs under lock level 1 so the front panel and IR
//!   remote cannot touch memory mid-transaction
//! - setters write registers then execute `SetAll` (or `SetAudio`)
//! - the S-meter calibration and filter bandwidths are per unit; they are
//!   read once at `open` and kept for the session

use std::time::Duration;

use crate::domain::{
    ChannelData, ClockTime, Dcd, Frequency, LevelKind, LevelValue, Mode, PowerStatus, ResetKind,
    RigError, RigResult, Vfo,
};
use crate::ports::{RigControl, SerialConnection};
use crate::protocol::convert::{self, CalibrationTable, FilterBandwidthTable};
use crate::protocol::memory::{
    bbram, eeprom1, eeprom2, eeprom3, rom, working, CALIBRATION_LEN, FILTER_COUNT,
    IDENT_TEXT_LEN, MAX_CHANNEL,
};
use crate::protocol::{Button, DeviceSessionState, LockLevel, MemoryPage, ProtocolSession, Routine};

/// Lock level documented as the minimum for safe multi-byte access
const ACCESS_LOCK: LockLevel = LockLevel::Level1;

/// Per-unit tables loaded at open
#[derive(Debug, Clone)]
struct ReceiverTables {
    calibration: CalibrationTable,
    filters: FilterBandwidthTable,
}

/// Where one memory channel's fields live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChannelLayout {
    squelch: (MemoryPage, u16),
    /// 3-byte frequency followed by the mode/filter byte
    frequency: (MemoryPage, u16),
    passband: (MemoryPage, u16),
    ident: (MemoryPage, u16),
}

impl ChannelLayout {
    /// Memories 0-99 live on EEPROM page 2 with their squelch in battery
    /// RAM; 100-399 on page 3. Idents and the extended squelch/PBS records
    /// run past the end of page 3 from memory 176 onwards.
    fn of(channel: u16) -> Self {
        use MemoryPage::*;

        let record = |ch: u16, offset: u16| {
            if ch < 176 {
                (Eeprom2, eeprom2::MEX_SQ + ch * eeprom2::IDENT_STRIDE + offset)
            } else {
                (Eeprom3, eeprom3::MEY_SQ + (ch - 176) * eeprom2::IDENT_STRIDE + offset)
            }
        };

        if channel < 100 {
            Self {
                squelch: (BatterySustained, bbram::MEM_SQ + channel),
                frequency: (Eeprom1, eeprom1::MEM_FR + channel * eeprom1::MEM_STRIDE),
                passband: (Eeprom1, eeprom1::MEM_PB + channel),
                ident: record(channel, 2),
            }
        } else {
            Self {
                squelch: record(channel, 0),
                frequency: (Eeprom2, eeprom2::MEX_FR + (channel - 100) * eeprom1::MEM_STRIDE),
                passband: record(channel, 1),
                ident: record(channel, 2),
            }
        }
    }
}

/// AR7030 Plus driver. Owns the protocol session and the per-unit tables.
pub struct Ar7030Plus {
    session: ProtocolSession,
    tables: Option<ReceiverTables>,
    /// Active VFO as last switched by this driver; the receiver has no
    /// register reporting it
    active_vfo: Vfo,
}

impl Ar7030Plus {
    pub fn new(serial: Box<dyn SerialConnection>) -> Self {
        Self {
            session: ProtocolSession::new(serial),
            tables: None,
            active_vfo: Vfo::A,
        }
    }

    pub fn with_post_write_delay(mut self, delay: Duration) -> Self {
        self.session = self.session.with_post_write_delay(delay);
        self
    }

    pub fn session_state(&self) -> &DeviceSessionState {
        self.session.state()
    }

    pub fn calibration(&self) -> Option<&CalibrationTable> {
        self.tables.as_ref().map(|t| &t.calibration)
    }

    pub fn filters(&self) -> Option<&FilterBandwidthTable> {
        self.tables.as_ref().map(|t| &t.filters)
    }

    fn ensure_open(&self) -> RigResult<()> {
        self.tables.as_ref().map(|_| ()).ok_or(RigError::NotOpen)
    }

    fn frequency_register(vfo: Vfo) -> u16 {
        match vfo {
            Vfo::Current | Vfo::A => working::FREQU,
            Vfo::B => working::FREQU_B,
        }
    }

    fn mode_register(vfo: Vfo) -> u16 {
        match vfo {
            Vfo::Current | Vfo::A => working::MODE,
            Vfo::B => working::MODE_B,
        }
    }

    fn filter_register(vfo: Vfo) -> u16 {
        match vfo {
            Vfo::Current | Vfo::A => working::FILTER,
            Vfo::B => working::FILTER_B,
        }
    }

    /// Run `body` under the access lock against the working page
    fn locked<T>(&mut self, body: impl FnOnce(&mut ProtocolSession) -> RigResult<T>) -> RigResult<T> {
        self.ensure_open()?;
        self.session.with_lock(ACCESS_LOCK, body)
    }

    fn read_working(&mut self, register: u16) -> RigResult<u8> {
        self.locked(|s| s.read_byte(MemoryPage::Working, register))
    }

    /// Write working registers then run `routine` so they take effect
    fn apply(&mut self, writes: &[(u16, u8)], routine: Routine) -> RigResult<()> {
        self.locked(|s| {
            for &(register, value) in writes {
                s.write_byte(MemoryPage::Working, register, value)?;
            }
            s.execute(routine)
        })
    }
}

impl RigControl for Ar7030Plus {
    fn open(&mut self) -> RigResult<()> {
        self.tables = None;
        self.active_vfo = Vfo::A;
        self.session.reset_state();

        let tables = self.session.with_lock(ACCESS_LOCK, |s| {
            let cal = s.read_block(MemoryPage::Eeprom1, eeprom1::SM_CAL, CALIBRATION_LEN)?;
            let mut raw = [0u8; CALIBRATION_LEN];
            raw.copy_from_slice(&cal);

            let mut widths = [0u32; FILTER_COUNT];
            for (i, width) in widths.iter_mut().enumerate() {
                let address = bbram::FL_BW + i as u16 * bbram::FILTER_STRIDE;
                let bcd = s.read_byte(MemoryPage::BatterySustained, address)?;
                *width = convert::filter_width_from_bcd(bcd)?;
            }

            Ok(ReceiverTables {
                calibration: CalibrationTable::from_eeprom(raw),
                filters: FilterBandwidthTable::new(widths),
            })
        })?;

        log::info!(
            "AR7030 opened: calibration {:?}, filters {:?} Hz",
            tables.calibration.steps().iter().map(|s| s.raw).collect::<Vec<_>>(),
            tables.filters.widths()
        );
        self.tables = Some(tables);
        Ok(())
    }

    fn close(&mut self) -> RigResult<()> {
        self.tables = None;
        log::info!("AR7030 closed");
        Ok(())
    }

    fn set_frequency(&mut self, vfo: Vfo, freq: Frequency) -> RigResult<()> {
        let hz = freq.as_hz();
        if !(convert::MIN_FREQ_HZ..=convert::MAX_FREQ_HZ).contains(&hz) {
            return Err(RigError::InvalidArgument(format!(
                "Frequency {hz} Hz outside receive range"
            )));
        }
        let steps = convert::hz_to_dds(hz);
        let register = Self::frequency_register(vfo);

        self.locked(|s| {
            s.write_u24(MemoryPage::Working, register, steps)?;
            s.execute(Routine::SetAll)
        })
    }

    fn get_frequency(&mut self, vfo: Vfo) -> RigResult<Frequency> {
        let register = Self::frequency_register(vfo);
        let steps = self.locked(|s| s.read_u24(MemoryPage::Working, register))?;
        Ok(Frequency::hz(convert::dds_to_hz(steps)))
    }

    fn set_mode(&mut self, vfo: Vfo, mode: Mode, width_hz: Option<u32>) -> RigResult<()> {
        self.ensure_open()?;
        let filter = match (width_hz, &self.tables) {
            (Some(width), Some(tables)) => Some(tables.filters.select(width)),
            _ => None,
        };
        let mode_register = Self::mode_register(vfo);
        let filter_register = Self::filter_register(vfo);

        self.locked(|s| {
            s.write_byte(MemoryPage::Working, mode_register, convert::mode_to_native(mode))?;
            if let Some(filter) = filter {
                s.write_byte(MemoryPage::Working, filter_register, filter)?;
            }
            s.execute(Routine::SetAll)
        })
    }

    fn get_mode(&mut self, vfo: Vfo) -> RigResult<(Mode, u32)> {
        self.ensure_open()?;
        let filters = match &self.tables {
            Some(tables) => tables.filters.clone(),
            None => return Err(RigError::NotOpen),
        };

        let (native, width) = self.locked(|s| {
            let native = s.read_byte(MemoryPage::Working, Self::mode_register(vfo))?;
            let width = match vfo {
                Vfo::Current | Vfo::A => {
                    convert::filter_width_from_bcd(s.read_byte(MemoryPage::Working, working::FLTBW)?)?
                }
                Vfo::B => {
                    let filter = s.read_byte(MemoryPage::Working, working::FILTER_B)?;
                    filters.bandwidth(filter).unwrap_or(0)
                }
            };
            Ok((native, width))
        })?;

        let mode = convert::native_to_mode(native)
            .ok_or_else(|| RigError::Protocol(format!("Unknown mode byte 0x{native:02x}")))?;
        Ok((mode, width))
    }

    fn set_level(&mut self, level: LevelKind, value: LevelValue) -> RigResult<()> {
        use working::*;

        match level {
            LevelKind::Preamp => {
                let rfgain = convert::preamp_to_rfgain(value.as_i32()?);
                self.apply(&[(RFGAIN, rfgain)], Routine::SetAll)
            }
            LevelKind::Attenuator => {
                let rfgain = convert::attenuation_to_rfgain(value.as_i32()?);
                self.apply(&[(RFGAIN, rfgain)], Routine::SetAll)
            }
            LevelKind::AudioGain => {
                let vol = convert::volume_to_native(value.as_f32()?);
                let balance = convert::volume_to_balance(vol);
                self.apply(
                    &[(AF_VOL, vol), (AF_VLL, balance), (AF_VLR, balance)],
                    Routine::SetAudio,
                )
            }
            LevelKind::RfGain => {
                let gain = convert::if_gain_to_native(value.as_f32()?);
                self.apply(&[(IFGAIN, gain)], Routine::SetAll)
            }
            LevelKind::Squelch => {
                let sql = convert::squelch_to_native(value.as_f32()?);
                self.apply(&[(SQLVAL, sql)], Routine::SetAll)
            }
            LevelKind::PassbandShift => {
                let steps = convert::hz_to_pbs_steps(value.as_f32()? as f64);
                self.apply(&[(PBSVAL, steps)], Routine::SetAll)
            }
            LevelKind::CwPitch => {
                let steps = convert::hz_to_pbs_steps(value.as_f32()? as f64);
                self.apply(&[(BFOVAL, steps)], Routine::SetAll)
            }
            LevelKind::Agc => {
                let agc = convert::agc_to_native(value.as_agc()?);
                self.apply(&[(AGCSPD, agc)], Routine::SetAll)
            }
            LevelKind::NotchFrequency
            | LevelKind::RawSignalStrength
            | LevelKind::SignalStrength => Err(RigError::Unimplemented(format!(
                "Setting level {level:?}"
            ))),
        }
    }

    fn get_level(&mut self, level: LevelKind) -> RigResult<LevelValue> {
        use working::*;

        Ok(match level {
            LevelKind::Preamp => LevelValue::Int(convert::rfgain_to_preamp(self.read_working(RFGAIN)?)),
            LevelKind::Attenuator => {
                LevelValue::Int(convert::rfgain_to_attenuation(self.read_working(RFGAIN)?))
            }
            LevelKind::AudioGain => {
                LevelValue::Float(convert::native_to_volume(self.read_working(AF_VOL)?))
            }
            LevelKind::RfGain => {
                LevelValue::Float(convert::native_to_if_gain(self.read_working(IFGAIN)?))
            }
            LevelKind::Squelch => {
                LevelValue::Float(convert::native_to_squelch(self.read_working(SQLVAL)?))
            }
            LevelKind::PassbandShift => {
                LevelValue::Float(convert::pbs_steps_to_hz(self.read_working(PBSVAL)?) as f32)
            }
            LevelKind::CwPitch => {
                LevelValue::Float(convert::pbs_steps_to_hz(self.read_working(BFOVAL)?) as f32)
            }
            LevelKind::Agc => {
                let native = self.read_working(AGCSPD)?;
                let agc = convert::native_to_agc(native)
                    .ok_or_else(|| RigError::Protocol(format!("Unknown AGC byte 0x{native:02x}")))?;
                LevelValue::Agc(agc)
            }
            LevelKind::NotchFrequency => {
                let steps = self.locked(|s| s.read_u16(MemoryPage::Working, NCHFR))?;
                LevelValue::Int(convert::notch_steps_to_hz(steps) as i32)
            }
            LevelKind::RawSignalStrength => LevelValue::Int(self.locked(|s| s.read_signal())? as i32),
            LevelKind::SignalStrength => {
                let calibration = match &self.tables {
                    Some(tables) => tables.calibration.clone(),
                    None => return Err(RigError::NotOpen),
                };
                let (raw, rxcon) = self.locked(|s| {
                    let raw = s.read_signal()?;
                    let rxcon = s.read_byte(MemoryPage::Working, RXCON)?;
                    Ok((raw, rxcon))
                })?;
                LevelValue::Int(convert::get_calibrated_level(raw, &calibration, rxcon))
            }
        })
    }

    fn set_tuning_step(&mut self, step_hz: u32) -> RigResult<()> {
        let count = convert::hz_to_step_count(step_hz)?;
        self.locked(|s| {
            s.write_u16(MemoryPage::Working, working::CHNSTP, count)?;
            s.execute(Routine::SetAll)
        })
    }

    fn get_tuning_step(&mut self) -> RigResult<u32> {
        let count = self.locked(|s| s.read_u16(MemoryPage::Working, working::CHNSTP))?;
        Ok(convert::step_count_to_hz(count))
    }

    fn get_power_status(&mut self) -> RigResult<PowerStatus> {
        let flags = self.read_working(working::PDFLGS)?;
        Ok(if flags & working::PD_POWER != 0 {
            PowerStatus::On
        } else {
            PowerStatus::Off
        })
    }

    /// Button 0 only ever switches on; the power button toggles, so it is
    /// pressed only when the receiver reports itself on.
    fn set_power_status(&mut self, status: PowerStatus) -> RigResult<()> {
        self.locked(|s| match status {
            PowerStatus::On => s.operate_button(Button::None),
            PowerStatus::Off => {
                let flags = s.read_byte(MemoryPage::Working, working::PDFLGS)?;
                if flags & working::PD_POWER != 0 {
                    s.operate_button(Button::Power)
                } else {
                    Ok(())
                }
            }
        })
    }

    fn reset(&mut self, kind: ResetKind) -> RigResult<()> {
        match kind {
            ResetKind::Soft => {
                self.ensure_open()?;
                self.session.execute(Routine::Reset)
            }
            other => Err(RigError::Unimplemented(format!("Reset {other:?}"))),
        }
    }

    fn set_vfo(&mut self, vfo: Vfo) -> RigResult<()> {
        self.ensure_open()?;
        let target = match vfo {
            Vfo::Current | Vfo::A => Vfo::A,
            Vfo::B => Vfo::B,
        };
        if target != self.active_vfo {
            self.toggle_vfo()?;
        }
        Ok(())
    }

    fn get_vfo(&mut self) -> RigResult<Vfo> {
        self.ensure_open()?;
        Ok(self.active_vfo)
    }

    /// Press the IR remote's VFO key
    fn toggle_vfo(&mut self) -> RigResult<()> {
        self.locked(|s| s.send_ir_code(working::IR_VFO))?;
        self.active_vfo = match self.active_vfo {
            Vfo::B => Vfo::A,
            _ => Vfo::B,
        };
        Ok(())
    }

    fn get_dcd(&mut self) -> RigResult<Dcd> {
        let bits = self.read_working(working::BITS + 2)?;
        let closed = bits & working::SQL_ACTIVE != 0 && bits & working::SQL_CLOSED != 0;
        Ok(if closed { Dcd::Closed } else { Dcd::Open })
    }

    fn get_channel(&mut self, channel: u16) -> RigResult<ChannelData> {
        if channel > MAX_CHANNEL {
            return Err(RigError::InvalidArgument(format!(
                "Channel {channel} outside 0..={MAX_CHANNEL}"
            )));
        }
        let filters = match &self.tables {
            Some(tables) => tables.filters.clone(),
            None => return Err(RigError::NotOpen),
        };
        let layout = ChannelLayout::of(channel);

        let (squelch, steps, mode_byte, pbs, ident) = self.locked(|s| {
            let squelch = s.read_byte(layout.squelch.0, layout.squelch.1)?;
            let (page, address) = layout.frequency;
            let steps = s.read_u24(page, address)?;
            let mode_byte = s.read_byte(page, address + 3)?;
            let pbs = s.read_byte(layout.passband.0, layout.passband.1)?;
            let ident = s.read_block(layout.ident.0, layout.ident.1, IDENT_TEXT_LEN)?;
            Ok((squelch, steps, mode_byte, pbs, ident))
        })?;

        let filter = (mode_byte & 0x70) >> 4;
        let ident_end = ident.iter().position(|&b| b == 0).unwrap_or(ident.len());

        Ok(ChannelData {
            channel,
            frequency_hz: convert::dds_to_hz(steps),
            mode: convert::channel_mode(mode_byte),
            filter,
            width_hz: filters.bandwidth(filter).unwrap_or(0),
            scan_lockout: mode_byte & 0x80 != 0,
            passband_shift_hz: convert::pbs_steps_to_hz(pbs),
            squelch,
            ident: String::from_utf8_lossy(&ident[..ident_end])
                .trim_end()
                .to_string(),
        })
    }

    fn get_info(&mut self) -> RigResult<String> {
        let ident = self.locked(|s| s.read_block(MemoryPage::Rom, rom::IDENT, rom::IDENT_LEN))?;
        let end = ident.iter().position(|&b| b == 0).unwrap_or(ident.len());
        Ok(String::from_utf8_lossy(&ident[..end]).to_string())
    }

    fn get_clock(&mut self) -> RigResult<ClockTime> {
        let raw = self.locked(|s| s.read_block(MemoryPage::BatterySustained, bbram::RT_SEC, 3))?;
        Ok(ClockTime {
            seconds: convert::bcd_to_int(raw[0])?,
            minutes: convert::bcd_to_int(raw[1])?,
            hours: convert::bcd_to_int(raw[2])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SimulatedAr7030;
    use crate::domain::AgcSpeed;

    fn open_rig() -> (Ar7030Plus, SimulatedAr7030) {
        let sim = SimulatedAr7030::new();
        let mut rig = Ar7030Plus::new(Box::new(sim.clone())).with_post_write_delay(Duration::ZERO);
        rig.open().unwrap();
        sim.clear_trace();
        (rig, sim)
    }

    fn unopened_rig() -> (Ar7030Plus, SimulatedAr7030) {
        let sim = SimulatedAr7030::new();
        let rig = Ar7030Plus::new(Box::new(sim.clone())).with_post_write_delay(Duration::ZERO);
        (rig, sim)
    }

    // --- Open ---

    #[test]
    fn open_loads_unit_tables() {
        let (mut rig, sim) = unopened_rig();
        rig.open().unwrap();

        let raw: Vec<u8> = rig.calibration().unwrap().steps().iter().map(|s| s.raw).collect();
        assert_eq!(raw, vec![64, 10, 10, 12, 12, 15, 30, 20]);
        assert_eq!(
            rig.filters().unwrap().widths(),
            &[1400, 2000, 3700, 5300, 6500, 9500]
        );

        let trace = sim.trace();
        assert_eq!(trace.first(), Some(&0x81));
        assert_eq!(trace.last(), Some(&0x80));
        assert_eq!(sim.lock_level(), 0);
    }

    #[test]
    fn operations_before_open_fail() {
        let (mut rig, sim) = unopened_rig();
        assert_eq!(rig.get_frequency(Vfo::A), Err(RigError::NotOpen));
        assert_eq!(rig.get_level(LevelKind::Squelch), Err(RigError::NotOpen));
        assert!(sim.trace().is_empty());
    }

    #[test]
    fn open_aborts_on_bad_filter_bcd() {
        let (mut rig, sim) = unopened_rig();
        sim.poke(MemoryPage::BatterySustained, bbram::FL_BW + 8, 0x9a);
        assert_eq!(rig.open(), Err(RigError::InvalidBcd(0x9a)));
        assert!(rig.filters().is_none());
        assert_eq!(sim.lock_level(), 0, "unlocked after failed open");
    }

    #[test]
    fn close_forgets_tables() {
        let (mut rig, _) = open_rig();
        rig.close().unwrap();
        assert_eq!(rig.get_tuning_step(), Err(RigError::NotOpen));
    }

    // --- Frequency ---

    #[test]
    fn set_frequency_writes_dds_and_applies() {
        let (mut rig, sim) = open_rig();
        rig.set_frequency(Vfo::A, Frequency::mhz(9.5)).unwrap();
        assert_eq!(
            sim.peek_u24(MemoryPage::Working, working::FREQU),
            convert::hz_to_dds(9_500_000.0)
        );
        assert_eq!(sim.routines(), vec![Routine::SetAll]);
        assert_eq!(sim.lock_level(), 0);
    }

    #[test]
    fn set_frequency_vfo_b() {
        let (mut rig, sim) = open_rig();
        rig.set_frequency(Vfo::B, Frequency::khz(198.0)).unwrap();
        assert_eq!(
            sim.peek_u24(MemoryPage::Working, working::FREQU_B),
            convert::hz_to_dds(198_000.0)
        );
    }

    #[test]
    fn set_frequency_out_of_range_rejected_without_io() {
        let (mut rig, sim) = open_rig();
        for hz in [9_999.0, 32_010_001.0, -1.0] {
            let err = rig.set_frequency(Vfo::A, Frequency::hz(hz)).unwrap_err();
            assert!(matches!(err, RigError::InvalidArgument(_)));
        }
        assert!(sim.trace().is_empty());
    }

    #[test]
    fn get_frequency_reads_both_vfos() {
        let (mut rig, _) = open_rig();
        let a = rig.get_frequency(Vfo::Current).unwrap().as_hz();
        let b = rig.get_frequency(Vfo::B).unwrap().as_hz();
        assert!((a - 14_070_000.0).abs() <= convert::HZ_PER_STEP);
        assert!((b - 7_100_000.0).abs() <= convert::HZ_PER_STEP);
    }

    // --- Mode ---

    #[test]
    fn set_mode_selects_narrowest_sufficient_filter() {
        let (mut rig, sim) = unopened_rig();
        for (i, bcd) in [0x95u8, 0x00, 0x00, 0x65, 0x53, 0x95].into_iter().enumerate() {
            sim.poke(
                MemoryPage::BatterySustained,
                bbram::FL_BW + i as u16 * bbram::FILTER_STRIDE,
                bcd,
            );
        }
        rig.open().unwrap();
        sim.clear_trace();

        rig.set_mode(Vfo::A, Mode::Am, Some(6500)).unwrap();

        assert_eq!(sim.peek(MemoryPage::Working, working::MODE), 1);
        assert_eq!(sim.peek(MemoryPage::Working, working::FILTER), 4);
        let trace = sim.trace();
        // filter register, filter 4, SetAll, unlock
        assert_eq!(
            &trace[trace.len() - 6..],
            &[0x33, 0x44, 0x30, 0x64, 0x24, 0x80]
        );
    }

    #[test]
    fn set_mode_without_width_keeps_filter() {
        let (mut rig, sim) = open_rig();
        rig.set_mode(Vfo::B, Mode::Cw, None).unwrap();
        assert_eq!(sim.peek(MemoryPage::Working, working::MODE_B), 5);
        assert_eq!(sim.peek(MemoryPage::Working, working::FILTER_B), 5);
        assert_eq!(sim.routines(), vec![Routine::SetAll]);
    }

    #[test]
    fn get_mode_reports_width() {
        let (mut rig, _) = open_rig();
        assert_eq!(rig.get_mode(Vfo::A).unwrap(), (Mode::Usb, 3700));
        assert_eq!(rig.get_mode(Vfo::B).unwrap(), (Mode::Am, 5300));
    }

    #[test]
    fn get_mode_unknown_byte_is_protocol_error() {
        let (mut rig, sim) = open_rig();
        sim.poke(MemoryPage::Working, working::MODE, 0);
        assert!(matches!(rig.get_mode(Vfo::A), Err(RigError::Protocol(_))));
        assert_eq!(sim.lock_level(), 0);
    }

    // --- Levels ---

    #[test]
    fn audio_gain_sets_volume_and_balance() {
        let (mut rig, sim) = open_rig();
        rig.set_level(LevelKind::AudioGain, LevelValue::Float(1.0)).unwrap();
        assert_eq!(
            sim.peek_block(MemoryPage::Working, working::AF_VOL, 3),
            vec![63, 31, 31]
        );
        assert_eq!(sim.routines(), vec![Routine::SetAudio]);
        assert_eq!(
            rig.get_level(LevelKind::AudioGain).unwrap(),
            LevelValue::Float(1.0)
        );
    }

    #[test]
    fn preamp_and_attenuator_share_rfgain() {
        let (mut rig, sim) = open_rig();
        rig.set_level(LevelKind::Preamp, LevelValue::Int(10)).unwrap();
        assert_eq!(sim.peek(MemoryPage::Working, working::RFGAIN), 0);
        assert_eq!(rig.get_level(LevelKind::Preamp).unwrap(), LevelValue::Int(10));
        assert_eq!(rig.get_level(LevelKind::Attenuator).unwrap(), LevelValue::Int(0));

        rig.set_level(LevelKind::Attenuator, LevelValue::Int(20)).unwrap();
        assert_eq!(sim.peek(MemoryPage::Working, working::RFGAIN), 3);
        assert_eq!(rig.get_level(LevelKind::Attenuator).unwrap(), LevelValue::Int(20));
        assert_eq!(rig.get_level(LevelKind::Preamp).unwrap(), LevelValue::Int(0));
    }

    #[test]
    fn gain_and_squelch_levels() {
        let (mut rig, sim) = open_rig();
        rig.set_level(LevelKind::RfGain, LevelValue::Float(0.0)).unwrap();
        assert_eq!(sim.peek(MemoryPage::Working, working::IFGAIN), 134);
        rig.set_level(LevelKind::Squelch, LevelValue::Float(1.0)).unwrap();
        assert_eq!(sim.peek(MemoryPage::Working, working::SQLVAL), 255);
        assert_eq!(
            rig.get_level(LevelKind::Squelch).unwrap(),
            LevelValue::Float(1.0)
        );
    }

    #[test]
    fn passband_shift_uses_ones_complement() {
        let (mut rig, sim) = open_rig();
        let hz = -3.0 * convert::PBS_STEP_HZ as f32;
        rig.set_level(LevelKind::PassbandShift, LevelValue::Float(hz)).unwrap();
        assert_eq!(sim.peek(MemoryPage::Working, working::PBSVAL), 0xfc);

        let back = rig.get_level(LevelKind::PassbandShift).unwrap().as_f32().unwrap();
        assert!((back - hz).abs() < 0.01);
    }

    #[test]
    fn agc_level() {
        let (mut rig, sim) = open_rig();
        assert_eq!(
            rig.get_level(LevelKind::Agc).unwrap(),
            LevelValue::Agc(AgcSpeed::Medium)
        );
        rig.set_level(LevelKind::Agc, LevelValue::Agc(AgcSpeed::Slow)).unwrap();
        assert_eq!(sim.peek(MemoryPage::Working, working::AGCSPD), 2);
        assert!(rig.set_level(LevelKind::Agc, LevelValue::Int(2)).is_err());
    }

    #[test]
    fn notch_frequency_read_only() {
        let (mut rig, _) = open_rig();
        assert_eq!(
            rig.get_level(LevelKind::NotchFrequency).unwrap(),
            LevelValue::Int(1000)
        );
        assert!(matches!(
            rig.set_level(LevelKind::NotchFrequency, LevelValue::Int(500)),
            Err(RigError::Unimplemented(_))
        ));
    }

    #[test]
    fn raw_signal_strength_runs_read_signal() {
        let (mut rig, sim) = open_rig();
        sim.set_signal(0x55);
        assert_eq!(
            rig.get_level(LevelKind::RawSignalStrength).unwrap(),
            LevelValue::Int(0x55)
        );
        assert_eq!(sim.routines(), vec![Routine::ReadSignal]);
    }

    #[test]
    fn calibrated_signal_strength() {
        let (mut rig, sim) = open_rig();
        sim.set_signal(100);
        assert_eq!(
            rig.get_level(LevelKind::SignalStrength).unwrap(),
            LevelValue::Int(-7)
        );

        // AGC bits in the second byte do not move the reading
        sim.poke(MemoryPage::Working, working::RXCON + 1, 0xff);
        assert_eq!(
            rig.get_level(LevelKind::SignalStrength).unwrap(),
            LevelValue::Int(-7)
        );

        sim.poke(MemoryPage::Working, working::RXCON, working::RX_ATN);
        assert_eq!(
            rig.get_level(LevelKind::SignalStrength).unwrap(),
            LevelValue::Int(3)
        );

        sim.poke(MemoryPage::Working, working::RXCON, working::RX_PRE);
        assert_eq!(
            rig.get_level(LevelKind::SignalStrength).unwrap(),
            LevelValue::Int(-17)
        );
    }

    // --- Tuning step, power, reset ---

    #[test]
    fn tuning_step_roundtrip() {
        let (mut rig, sim) = open_rig();
        assert_eq!(rig.get_tuning_step().unwrap(), 5_000);

        rig.set_tuning_step(10_000).unwrap();
        let count = convert::hz_to_step_count(10_000).unwrap();
        assert_eq!(
            sim.peek_block(MemoryPage::Working, working::CHNSTP, 2),
            count.to_be_bytes().to_vec()
        );
        // quantised to whole DDS steps
        assert!(rig.get_tuning_step().unwrap().abs_diff(10_000) <= 2);

        assert!(matches!(
            rig.set_tuning_step(500_000),
            Err(RigError::InvalidArgument(_))
        ));
    }

    #[test]
    fn power_off_then_on() {
        let (mut rig, sim) = open_rig();
        assert_eq!(rig.get_power_status().unwrap(), PowerStatus::On);

        rig.set_power_status(PowerStatus::Off).unwrap();
        assert_eq!(rig.get_power_status().unwrap(), PowerStatus::Off);
        // already off: the toggle is not pressed again
        rig.set_power_status(PowerStatus::Off).unwrap();
        rig.set_power_status(PowerStatus::On).unwrap();

        assert_eq!(sim.buttons(), vec![Button::Power, Button::None]);
        assert_eq!(rig.get_power_status().unwrap(), PowerStatus::On);
    }

    #[test]
    fn soft_reset_runs_routine_zero() {
        let (mut rig, sim) = open_rig();
        rig.reset(ResetKind::Soft).unwrap();
        assert_eq!(sim.trace(), vec![0x20]);
        assert!(matches!(
            rig.reset(ResetKind::Master),
            Err(RigError::Unimplemented(_))
        ));
    }

    // --- Info, clock, memories ---

    #[test]
    fn info_and_clock() {
        let (mut rig, _) = open_rig();
        assert_eq!(rig.get_info().unwrap(), "7030_14B");
        assert_eq!(
            rig.get_clock().unwrap(),
            ClockTime {
                hours: 12,
                minutes: 45,
                seconds: 30
            }
        );
    }

    #[test]
    fn channel_layout_regions() {
        assert_eq!(
            ChannelLayout::of(5),
            ChannelLayout {
                squelch: (MemoryPage::BatterySustained, 161),
                frequency: (MemoryPage::Eeprom1, 20),
                passband: (MemoryPage::Eeprom1, 405),
                ident: (MemoryPage::Eeprom2, 1362),
            }
        );
        assert_eq!(ChannelLayout::of(175).ident, (MemoryPage::Eeprom2, 4082));
        assert_eq!(ChannelLayout::of(176).squelch, (MemoryPage::Eeprom3, 0));
        assert_eq!(ChannelLayout::of(399).frequency, (MemoryPage::Eeprom2, 1196));
        assert_eq!(ChannelLayout::of(399).ident, (MemoryPage::Eeprom3, 3570));
    }

    #[test]
    fn get_channel_low_bank() {
        let (mut rig, _) = open_rig();
        let ch = rig.get_channel(0).unwrap();
        assert!((ch.frequency_hz - 14_070_000.0).abs() <= convert::HZ_PER_STEP);
        assert_eq!(ch.mode, Some(Mode::Usb));
        assert_eq!(ch.filter, 3);
        assert_eq!(ch.width_hz, 3700);
        assert!(!ch.scan_lockout);
        assert!((ch.passband_shift_hz - 3.0 * convert::PBS_STEP_HZ).abs() < 1e-9);
        assert_eq!(ch.squelch, 40);
        assert_eq!(ch.ident, "PSK31 20m");
    }

    #[test]
    fn get_channel_extended_banks() {
        let (mut rig, _) = open_rig();

        let ch = rig.get_channel(150).unwrap();
        assert_eq!(ch.mode, Some(Mode::Am));
        assert_eq!(ch.filter, 5);
        assert!(ch.scan_lockout);
        assert_eq!(ch.squelch, 25);
        assert!((ch.passband_shift_hz + 2.0 * convert::PBS_STEP_HZ).abs() < 1e-9);
        assert_eq!(ch.ident, "BBC WS");

        let ch = rig.get_channel(300).unwrap();
        assert!((ch.frequency_hz - 5_000_000.0).abs() <= convert::HZ_PER_STEP);
        assert_eq!(ch.width_hz, 5300);
        assert_eq!(ch.ident, "WWV");
    }

    #[test]
    fn empty_channel_has_no_mode() {
        let (mut rig, _) = open_rig();
        let ch = rig.get_channel(42).unwrap();
        assert_eq!(ch.mode, None);
        assert_eq!(ch.filter, 0);
        assert_eq!(ch.width_hz, 0);
        assert_eq!(ch.ident, "");
    }

    #[test]
    fn channel_out_of_range_rejected_without_io() {
        let (mut rig, sim) = open_rig();
        assert!(matches!(
            rig.get_channel(400),
            Err(RigError::InvalidArgument(_))
        ));
        assert!(sim.trace().is_empty());
    }

    #[test]
    fn unsupported_operations() {
        let (mut rig, _) = open_rig();
        let ch = rig.get_channel(0).unwrap();
        assert!(matches!(rig.set_channel(&ch), Err(RigError::Unimplemented(_))));
    }

    #[test]
    fn channel_mode_ignores_bit_3() {
        let (mut rig, sim) = open_rig();
        let (page, address) = ChannelLayout::of(300).frequency;
        sim.poke(page, address + 3, 0x4d);
        let ch = rig.get_channel(300).unwrap();
        assert_eq!(ch.mode, Some(Mode::Cw));
        assert_eq!(ch.filter, 4);
    }

    // --- VFO, squelch ---

    #[test]
    fn set_vfo_sends_ir_vfo_key_only_on_change() {
        let (mut rig, sim) = open_rig();
        assert_eq!(rig.get_vfo().unwrap(), Vfo::A);

        rig.set_vfo(Vfo::A).unwrap();
        assert!(sim.trace().is_empty());

        rig.set_vfo(Vfo::B).unwrap();
        assert_eq!(sim.peek(MemoryPage::Working, working::IRCODE), working::IR_VFO);
        assert_eq!(sim.routines(), vec![Routine::SetAll]);
        assert_eq!(sim.lock_level(), 0);
        assert_eq!(rig.get_vfo().unwrap(), Vfo::B);

        sim.clear_trace();
        rig.set_vfo(Vfo::B).unwrap();
        assert!(sim.routines().is_empty());

        rig.set_vfo(Vfo::Current).unwrap();
        assert_eq!(sim.routines(), vec![Routine::SetAll]);
        assert_eq!(rig.get_vfo().unwrap(), Vfo::A);
    }

    #[test]
    fn toggle_vfo_flips_tracked_vfo() {
        let (mut rig, sim) = open_rig();
        rig.toggle_vfo().unwrap();
        rig.toggle_vfo().unwrap();
        assert_eq!(rig.get_vfo().unwrap(), Vfo::A);
        assert_eq!(sim.routines(), vec![Routine::SetAll, Routine::SetAll]);
    }

    #[test]
    fn failed_vfo_switch_keeps_tracked_vfo() {
        let (mut rig, sim) = open_rig();
        sim.fail_after(0);
        assert!(rig.set_vfo(Vfo::B).is_err());
        sim.restore_line();
        assert_eq!(rig.get_vfo().unwrap(), Vfo::A);
    }

    #[test]
    fn reopen_resets_vfo_to_a() {
        let (mut rig, _) = open_rig();
        rig.set_vfo(Vfo::B).unwrap();
        rig.open().unwrap();
        assert_eq!(rig.get_vfo().unwrap(), Vfo::A);
    }

    #[test]
    fn dcd_follows_squelch_bits() {
        let (mut rig, sim) = open_rig();
        let status = working::BITS + 2;

        // squelch not in use: always open
        sim.poke(MemoryPage::Working, status, working::SQL_CLOSED);
        assert_eq!(rig.get_dcd().unwrap(), Dcd::Open);

        sim.poke(MemoryPage::Working, status, working::SQL_ACTIVE | working::SQL_CLOSED);
        assert_eq!(rig.get_dcd().unwrap(), Dcd::Closed);

        sim.poke(MemoryPage::Working, status, working::SQL_ACTIVE);
        assert_eq!(rig.get_dcd().unwrap(), Dcd::Open);
        assert_eq!(sim.lock_level(), 0);
    }

    #[test]
    fn vfo_and_dcd_need_open() {
        let (mut rig, sim) = unopened_rig();
        assert_eq!(rig.get_vfo(), Err(RigError::NotOpen));
        assert_eq!(rig.set_vfo(Vfo::B), Err(RigError::NotOpen));
        assert_eq!(rig.get_dcd(), Err(RigError::NotOpen));
        assert!(sim.trace().is_empty());
    }

    // --- Transport failure ---

    #[test]
    fn failed_write_resynchronises_next_operation() {
        let (mut rig, sim) = open_rig();
        sim.fail_after(3);
        let err = rig.set_frequency(Vfo::A, Frequency::mhz(10.0)).unwrap_err();
        assert!(err.is_transport());
        assert!(rig.session_state().is_unknown());
        assert!(!sim.routines().contains(&Routine::SetAll));

        sim.restore_line();
        sim.clear_trace();
        rig.get_frequency(Vfo::A).unwrap();
        // lock, page and address all sent again
        assert_eq!(&sim.trace()[..4], &[0x81, 0x50, 0x31, 0x4a]);
    }
}
