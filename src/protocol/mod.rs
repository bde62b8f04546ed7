//! AR7030 Plus remote memory-access protocol.
//!
//! The receiver exposes its whole internal state as paged memory. Every byte
//! sent is one command: the high nibble is the operation, the low nibble is
//! four bits of data. Eight-bit values are assembled through the receiver's
//! H-register.
//!
//! This module separates the concerns the same way for every layer:
//! - `encode`: operation + operand → wire byte (pure, no I/O)
//! - `convert`: raw memory values ↔ receiver units (pure, no I/O)
//! - `memory`: the register map
//! - `session`: own the serial port, the address/page shadow cache and the
//!   lock level; drive timing and I/O

pub mod convert;
pub mod encode;
pub mod memory;
pub mod session;

pub use encode::encode;
pub use session::{DeviceSessionState, ProtocolSession};

use crate::domain::RigError;

/// Operation classes. The discriminant is the opcode's high nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Nop = 0x00,
    /// Set address high 4 bits
    SetAddressHigh = 0x10,
    ExecuteRoutine = 0x20,
    /// H-register ← operand
    SetHRegister = 0x30,
    /// Address ← H:operand, H ← 0
    SetAddress = 0x40,
    SetPage = 0x50,
    /// [page, address] ← H:operand, address += 1
    WriteData = 0x60,
    /// Serial output ← [page, address], address += operand
    ReadData = 0x70,
    SetLock = 0x80,
    /// Mask ← H:operand (page 0 only)
    SetMask = 0x90,
    OperateButton = 0xa0,
}

impl OpKind {
    pub fn base(self) -> u8 {
        self as u8
    }

    /// Classify a wire byte by its high nibble
    pub fn of(byte: u8) -> Option<OpKind> {
        use OpKind::*;
        Some(match byte & 0xf0 {
            0x00 => Nop,
            0x10 => SetAddressHigh,
            0x20 => ExecuteRoutine,
            0x30 => SetHRegister,
            0x40 => SetAddress,
            0x50 => SetPage,
            0x60 => WriteData,
            0x70 => ReadData,
            0x80 => SetLock,
            0x90 => SetMask,
            0xa0 => OperateButton,
            _ => return None,
        })
    }
}

/// Addressable memory pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryPage {
    /// Volatile working RAM (page 0)
    Working,
    /// Battery sustained RAM (page 1)
    BatterySustained,
    /// EEPROM page 2
    Eeprom1,
    /// EEPROM page 3 (type B firmware)
    Eeprom2,
    /// EEPROM page 4 (type B firmware)
    Eeprom3,
    /// Receiver ident (page 15)
    Rom,
}

impl MemoryPage {
    pub const ALL: [MemoryPage; 6] = [
        MemoryPage::Working,
        MemoryPage::BatterySustained,
        MemoryPage::Eeprom1,
        MemoryPage::Eeprom2,
        MemoryPage::Eeprom3,
        MemoryPage::Rom,
    ];

    /// Page number as sent in the SetPage operand
    pub fn number(self) -> u8 {
        match self {
            MemoryPage::Working => 0,
            MemoryPage::BatterySustained => 1,
            MemoryPage::Eeprom1 => 2,
            MemoryPage::Eeprom2 => 3,
            MemoryPage::Eeprom3 => 4,
            MemoryPage::Rom => 15,
        }
    }

    /// Size of the page in bytes
    pub fn capacity(self) -> u16 {
        match self {
            MemoryPage::Working => 256,
            MemoryPage::BatterySustained => 256,
            MemoryPage::Eeprom1 => 512,
            MemoryPage::Eeprom2 => 4096,
            MemoryPage::Eeprom3 => 4096,
            MemoryPage::Rom => 8,
        }
    }
}

impl TryFrom<u8> for MemoryPage {
    type Error = RigError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        MemoryPage::ALL
            .into_iter()
            .find(|p| p.number() == n)
            .ok_or_else(|| RigError::InvalidArgument(format!("Invalid page {n}")))
    }
}

/// Remote lock levels. Higher levels shut out more local control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LockLevel {
    /// Normal operation
    Unlocked = 0,
    /// IR remote and front panel buttons ignored, display still updates
    Level1 = 1,
    /// As level 1, display update suspended
    Level2 = 2,
    /// Remote operation exclusively
    Level3 = 3,
}

impl LockLevel {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Receiver firmware routines run by the ExecuteRoutine operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routine {
    /// Setup receiver as at switch-on
    Reset = 0,
    SetFrequency = 1,
    SetMode = 2,
    SetPassband = 3,
    /// Set all receiver parameters from current memory values
    SetAll = 4,
    SetAudio = 5,
    /// RF gain, IF gain, AGC speed, notch and noise blanker
    SetRfIf = 6,
    DirectRxControl = 9,
    DirectDdsControl = 10,
    DisplayMenus = 11,
    DisplayFrequency = 12,
    DisplayBuffer = 13,
    /// Replies with one byte of AGC voltage
    ReadSignal = 14,
    /// Replies with one byte of button state, offset by 48
    ReadButtons = 15,
}

impl Routine {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether the receiver answers this routine with a reply byte
    pub fn has_reply(self) -> bool {
        matches!(self, Routine::ReadSignal | Routine::ReadButtons)
    }
}

impl TryFrom<u8> for Routine {
    type Error = RigError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        use Routine::*;
        Ok(match n {
            0 => Reset,
            1 => SetFrequency,
            2 => SetMode,
            3 => SetPassband,
            4 => SetAll,
            5 => SetAudio,
            6 => SetRfIf,
            9 => DirectRxControl,
            10 => DirectDdsControl,
            11 => DisplayMenus,
            12 => DisplayFrequency,
            13 => DisplayBuffer,
            14 => ReadSignal,
            15 => ReadButtons,
            _ => return Err(RigError::InvalidArgument(format!("Invalid routine {n}"))),
        })
    }
}

/// Front panel button codes for the OperateButton operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Operates power, but only ever switches the receiver on
    None = 0,
    ModeUp = 1,
    ModeDown = 2,
    Fast = 3,
    Filter = 4,
    RfIf = 5,
    Memory = 6,
    Star = 7,
    Menu = 8,
    Power = 9,
}

impl Button {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Button {
    type Error = RigError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        use Button::*;
        Ok(match n {
            0 => None,
            1 => ModeUp,
            2 => ModeDown,
            3 => Fast,
            4 => Filter,
            5 => RfIf,
            6 => Memory,
            7 => Star,
            8 => Menu,
            9 => Power,
            _ => return Err(RigError::InvalidArgument(format!("Invalid button {n}"))),
        })
    }
}
