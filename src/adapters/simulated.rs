//! Simulated AR7030 Plus for development and testing without hardware.
//!
//! Interprets the nibble protocol byte by byte against in-memory pages, so
//! everything above the serial port runs unchanged. Activate from the
//! command line with `--simulate`:
//!
//!   RUST_LOG=ar7030_remote=info ar7030ctl --simulate get-freq
//!
//! Clones share the same receiver, so a test can keep one handle for
//! inspection while the driver owns the other.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::{RigError, RigResult};
use crate::ports::SerialConnection;
use crate::protocol::convert::{hz_to_dds, hz_to_step_count};
use crate::protocol::memory::{bbram, eeprom1, eeprom2, eeprom3, rom, working};
use crate::protocol::{Button, MemoryPage, OpKind, Routine};

/// Gain calibration as fitted to a typical unit
const DEFAULT_CALIBRATION: [u8; 8] = [64, 10, 10, 12, 12, 15, 30, 20];
/// Filters 1..=6: 1.4, 2.0, 3.7, 5.3, 6.5 and 9.5 kHz
const DEFAULT_FILTERS_BCD: [u8; 6] = [0x14, 0x20, 0x37, 0x53, 0x65, 0x95];
const DEFAULT_IDENT: &[u8; 8] = b"7030_14B";
const DEFAULT_FREQ_HZ: f64 = 14_070_000.0;
const DEFAULT_FREQ_B_HZ: f64 = 7_100_000.0;
const DEFAULT_SIGNAL: u8 = 100;

#[derive(Clone)]
pub struct SimulatedAr7030 {
    inner: Arc<Mutex<Receiver>>,
}

struct Receiver {
    pages: HashMap<MemoryPage, Vec<u8>>,
    page: u8,
    address: u16,
    h: u8,
    mask: u8,
    lock: u8,
    output: VecDeque<u8>,
    /// Every byte received, in order
    trace: Vec<u8>,
    routines: Vec<Routine>,
    buttons: Vec<Button>,
    signal: u8,
    held_button: Button,
    /// Writes to accept before the line starts failing
    writes_before_failure: Option<usize>,
    connected: bool,
}

impl SimulatedAr7030 {
    /// A switched-on receiver with calibration, filters, clock and a few
    /// memories filled in.
    pub fn new() -> Self {
        let mut pages = HashMap::new();
        for page in MemoryPage::ALL {
            pages.insert(page, vec![0u8; page.capacity() as usize]);
        }
        let sim = Self {
            inner: Arc::new(Mutex::new(Receiver {
                pages,
                page: 0,
                address: 0,
                h: 0,
                mask: 0,
                lock: 0,
                output: VecDeque::new(),
                trace: Vec::new(),
                routines: Vec::new(),
                buttons: Vec::new(),
                signal: DEFAULT_SIGNAL,
                held_button: Button::None,
                writes_before_failure: None,
                connected: true,
            })),
        };
        sim.seed();
        log::info!(
            "[SIMULATED AR7030] Initialized at {:.3} MHz, USB",
            DEFAULT_FREQ_HZ / 1e6
        );
        sim
    }

    fn seed(&self) {
        use MemoryPage::*;

        self.poke_u24(Working, working::FREQU, hz_to_dds(DEFAULT_FREQ_HZ));
        self.poke(Working, working::MODE, 7);
        self.poke(Working, working::FILTER, 3);
        self.poke(Working, working::FLTBW, 0x37);
        self.poke_u24(Working, working::FREQU_B, hz_to_dds(DEFAULT_FREQ_B_HZ));
        self.poke(Working, working::MODE_B, 1);
        self.poke(Working, working::FILTER_B, 5);
        let step = hz_to_step_count(5_000).unwrap_or(0);
        self.poke_block(Working, working::CHNSTP, &step.to_be_bytes());
        self.poke(Working, working::AF_VOL, 39);
        self.poke(Working, working::AF_VLL, 19);
        self.poke(Working, working::AF_VLR, 19);
        self.poke(Working, working::RFGAIN, 1);
        self.poke(Working, working::AGCSPD, 1);
        self.poke(Working, working::PDFLGS, working::PD_POWER);
        self.poke_block(Working, working::NCHFR, &6554u16.to_be_bytes());

        self.poke_block(BatterySustained, bbram::RT_SEC, &[0x30, 0x45, 0x12]);
        for (i, &bcd) in DEFAULT_FILTERS_BCD.iter().enumerate() {
            self.poke(
                BatterySustained,
                bbram::FL_BW + i as u16 * bbram::FILTER_STRIDE,
                bcd,
            );
        }

        self.poke_block(Eeprom1, eeprom1::SM_CAL, &DEFAULT_CALIBRATION);
        self.poke_block(Rom, rom::IDENT, DEFAULT_IDENT);

        // memory 0: 14.070 MHz USB, filter 3
        self.poke_u24(Eeprom1, eeprom1::MEM_FR, hz_to_dds(14_070_000.0));
        self.poke(Eeprom1, eeprom1::MEM_FR + 3, 0x37);
        self.poke(Eeprom1, eeprom1::MEM_PB, 0x03);
        self.poke(BatterySustained, bbram::MEM_SQ, 40);
        self.poke_ident(Eeprom2, eeprom2::MEX_SQ + 2, "PSK31 20m");

        // memory 150: 9.410 MHz AM, filter 5, scan lockout
        let addr = eeprom2::MEX_FR + 50 * eeprom1::MEM_STRIDE;
        self.poke_u24(Eeprom2, addr, hz_to_dds(9_410_000.0));
        self.poke(Eeprom2, addr + 3, 0xd1);
        let addr = eeprom2::MEX_SQ + 150 * eeprom2::IDENT_STRIDE;
        self.poke_block(Eeprom2, addr, &[25, 0xfd]);
        self.poke_ident(Eeprom2, addr + 2, "BBC WS");

        // memory 300: 5.000 MHz AM, filter 4
        let addr = eeprom2::MEX_FR + 200 * eeprom1::MEM_STRIDE;
        self.poke_u24(Eeprom2, addr, hz_to_dds(5_000_000.0));
        self.poke(Eeprom2, addr + 3, 0x41);
        let addr = eeprom3::MEY_SQ + (300 - 176) * eeprom2::IDENT_STRIDE;
        self.poke_block(Eeprom3, addr, &[0, 0]);
        self.poke_ident(Eeprom3, addr + 2, "WWV");
    }

    fn receiver(&self) -> MutexGuard<'_, Receiver> {
        // A panic while holding the lock leaves plain data behind; keep using it
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // --- Inspection ---

    pub fn peek(&self, page: MemoryPage, address: u16) -> u8 {
        self.receiver()
            .pages
            .get(&page)
            .and_then(|m| m.get(address as usize).copied())
            .unwrap_or(0)
    }

    pub fn peek_block(&self, page: MemoryPage, address: u16, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| self.peek(page, address + i as u16))
            .collect()
    }

    pub fn peek_u24(&self, page: MemoryPage, address: u16) -> u32 {
        let b = self.peek_block(page, address, 3);
        u32::from_be_bytes([0, b[0], b[1], b[2]])
    }

    pub fn poke(&self, page: MemoryPage, address: u16, value: u8) {
        if let Some(cell) = self
            .receiver()
            .pages
            .get_mut(&page)
            .and_then(|m| m.get_mut(address as usize))
        {
            *cell = value;
        }
    }

    pub fn poke_block(&self, page: MemoryPage, address: u16, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            self.poke(page, address + i as u16, b);
        }
    }

    pub fn poke_u24(&self, page: MemoryPage, address: u16, value: u32) {
        self.poke_block(page, address, &value.to_be_bytes()[1..]);
    }

    /// Store a memory ident, space padded to 14 characters
    pub fn poke_ident(&self, page: MemoryPage, address: u16, text: &str) {
        let mut bytes = [b' '; 14];
        for (dst, src) in bytes.iter_mut().zip(text.bytes()) {
            *dst = src;
        }
        self.poke_block(page, address, &bytes);
    }

    /// All bytes received so far
    pub fn trace(&self) -> Vec<u8> {
        self.receiver().trace.clone()
    }

    pub fn clear_trace(&self) {
        let mut rx = self.receiver();
        rx.trace.clear();
        rx.routines.clear();
        rx.buttons.clear();
    }

    /// Routines executed so far
    pub fn routines(&self) -> Vec<Routine> {
        self.receiver().routines.clone()
    }

    /// Buttons operated so far
    pub fn buttons(&self) -> Vec<Button> {
        self.receiver().buttons.clone()
    }

    pub fn lock_level(&self) -> u8 {
        self.receiver().lock
    }

    /// AGC voltage returned by the ReadSignal routine
    pub fn set_signal(&self, raw: u8) {
        self.receiver().signal = raw;
    }

    /// Button reported by the ReadButtons routine
    pub fn hold_button(&self, button: Button) {
        self.receiver().held_button = button;
    }

    /// Accept `count` more bytes, then fail every write until `restore_line`
    pub fn fail_after(&self, count: usize) {
        self.receiver().writes_before_failure = Some(count);
    }

    pub fn restore_line(&self) {
        self.receiver().writes_before_failure = None;
    }
}

impl Default for SimulatedAr7030 {
    fn default() -> Self {
        Self::new()
    }
}

impl Receiver {
    fn current_cell(&mut self) -> Option<&mut u8> {
        let page = MemoryPage::try_from(self.page).ok()?;
        self.pages
            .get_mut(&page)
            .and_then(|m| m.get_mut(self.address as usize))
    }

    fn power_on(&self) -> bool {
        self.pages
            .get(&MemoryPage::Working)
            .map_or(false, |m| m[working::PDFLGS as usize] & working::PD_POWER != 0)
    }

    fn set_power(&mut self, on: bool) {
        if let Some(m) = self.pages.get_mut(&MemoryPage::Working) {
            let flags = &mut m[working::PDFLGS as usize];
            if on {
                *flags |= working::PD_POWER;
            } else {
                *flags &= !working::PD_POWER;
            }
        }
    }

    /// Apply one received byte
    fn interpret(&mut self, byte: u8) {
        self.trace.push(byte);
        let x = byte & 0x0f;

        match OpKind::of(byte) {
            Some(OpKind::Nop) | None => {}
            Some(OpKind::SetAddressHigh) => {
                self.address = (self.address & 0x00ff) | ((x as u16) << 8);
            }
            Some(OpKind::ExecuteRoutine) => self.execute(x),
            Some(OpKind::SetHRegister) => self.h = x,
            Some(OpKind::SetAddress) => {
                self.address = ((self.h as u16) << 4) | x as u16;
                self.h = 0;
            }
            Some(OpKind::SetPage) => self.page = x,
            Some(OpKind::WriteData) => {
                let value = (self.h << 4) | x;
                let mask = if self.page == 0 { self.mask } else { 0 };
                if let Some(cell) = self.current_cell() {
                    *cell = (*cell & mask) | (value & !mask);
                }
                self.address = self.address.wrapping_add(1);
                self.h = 0;
                self.mask = 0;
            }
            Some(OpKind::ReadData) => {
                let value = self.current_cell().map_or(0, |c| *c);
                self.output.push_back(value);
                self.address = self.address.wrapping_add(x as u16);
            }
            Some(OpKind::SetLock) => self.lock = x,
            Some(OpKind::SetMask) => {
                self.mask = (self.h << 4) | x;
                self.h = 0;
            }
            Some(OpKind::OperateButton) => {
                if let Ok(button) = Button::try_from(x) {
                    log::info!("[SIMULATED AR7030] Button {button:?}");
                    self.buttons.push(button);
                    match button {
                        Button::None => self.set_power(true),
                        Button::Power => {
                            let on = self.power_on();
                            self.set_power(!on);
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    fn execute(&mut self, code: u8) {
        let Ok(routine) = Routine::try_from(code) else {
            return;
        };
        log::info!("[SIMULATED AR7030] Execute {routine:?}");
        self.routines.push(routine);
        match routine {
            Routine::ReadSignal => self.output.push_back(self.signal),
            Routine::ReadButtons => self.output.push_back(self.held_button.code() + 48),
            _ => {}
        }
    }
}

impl SerialConnection for SimulatedAr7030 {
    fn write(&mut self, data: &[u8]) -> RigResult<usize> {
        let mut rx = self.receiver();
        if !rx.connected {
            return Err(RigError::Io("Simulated port closed".into()));
        }
        if let Some(remaining) = rx.writes_before_failure.as_mut() {
            if *remaining < data.len() {
                return Err(RigError::Io("Simulated line failure".into()));
            }
            *remaining -= data.len();
        }
        for &byte in data {
            rx.interpret(byte);
        }
        Ok(data.len())
    }

    fn read(&mut self, buffer: &mut [u8]) -> RigResult<usize> {
        let mut rx = self.receiver();
        let mut n = 0;
        while n < buffer.len() {
            match rx.output.pop_front() {
                Some(b) => {
                    buffer[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }

    fn close(&mut self) -> RigResult<()> {
        self.receiver().connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.receiver().connected
    }
}
