//! Receiver memory map (firmware 1.1A to 1.4B).
//!
//! All multi-byte values are stored MSB first.

/// Page 0: volatile working memory
pub mod working {
    /// 16-bit channel step, DDS steps
    pub const CHNSTP: u16 = 0x15;
    /// IF gain, zero is max gain
    pub const IFGAIN: u16 = 0x18;
    /// 24-bit tuned frequency, DDS steps
    pub const FREQU: u16 = 0x1a;
    pub const MODE: u16 = 0x1d;
    /// Main volume, followed by left and right balance
    pub const AF_VOL: u16 = 0x1e;
    pub const AF_VLL: u16 = 0x1f;
    pub const AF_VLR: u16 = 0x20;
    /// Receiver control register, 3 bytes; attenuator and preamp bits in
    /// the first
    pub const RXCON: u16 = 0x28;
    /// Status bits, 3 bytes; squelch state in the third
    pub const BITS: u16 = 0x2b;
    /// Flags saved at power-down, bit 0 is power on
    pub const PDFLGS: u16 = 0x2e;
    /// RF gain, 0 to 5, 0 is max gain with preamp
    pub const RFGAIN: u16 = 0x30;
    pub const RFAGC: u16 = 0x31;
    pub const AGCSPD: u16 = 0x32;
    pub const SQLVAL: u16 = 0x33;
    /// Current filter number, 1 to 6
    pub const FILTER: u16 = 0x34;
    pub const PBSVAL: u16 = 0x35;
    pub const BFOVAL: u16 = 0x36;
    /// Filter bandwidth, 2 BCD digits of x.x kHz
    pub const FLTBW: u16 = 0x38;
    /// Written with an IR remote key code, acted on by `SetAll`
    pub const IRCODE: u16 = 0x39;
    pub const FREQU_B: u16 = 0xa1;
    pub const MODE_B: u16 = 0xa4;
    pub const FILTER_B: u16 = 0xae;
    /// 16-bit notch frequency, 6.5536 steps per Hz
    pub const NCHFR: u16 = 0xde;

    /// RXCON first byte bits
    pub const RX_PRE: u8 = 0x10;
    pub const RX_ATR: u8 = 0x20;
    pub const RX_ATN: u8 = 0x80;

    /// BITS+2: squelch in use, and closed while set
    pub const SQL_ACTIVE: u8 = 0x02;
    pub const SQL_CLOSED: u8 = 0x01;

    /// IR remote VFO A/B key
    pub const IR_VFO: u8 = 0x0f;

    pub const PD_POWER: u8 = 0x01;
}

/// Page 1: battery sustained memory
pub mod bbram {
    pub const RT_SEC: u16 = 2;
    pub const RT_MIN: u16 = 3;
    pub const RT_HRS: u16 = 4;
    /// Filter 1 bandwidth (BCD x.x kHz); filters 2..6 follow every 4 bytes
    pub const FL_BW: u16 = 133;
    pub const FILTER_STRIDE: u16 = 4;
    /// Squelch / BFO for memories 0 to 99
    pub const MEM_SQ: u16 = 156;
}

/// Page 2: EEPROM, memories 0 to 99 and calibration
pub mod eeprom1 {
    /// 3 bytes frequency + 1 byte mode/filter per memory
    pub const MEM_FR: u16 = 0;
    pub const MEM_STRIDE: u16 = 4;
    pub const MEM_PB: u16 = 400;
    /// S-meter calibration, 8 bytes
    pub const SM_CAL: u16 = 500;
}

/// Page 3: EEPROM, memories 100 to 399 and idents 0 to 175
pub mod eeprom2 {
    pub const MEX_FR: u16 = 0;
    pub const MEX_SQ: u16 = 1280;
    pub const IDENT_STRIDE: u16 = 16;
}

/// Page 4: EEPROM, idents 176 to 399
pub mod eeprom3 {
    pub const MEY_SQ: u16 = 0;
}

/// Page 15: model, revision and type letter
pub mod rom {
    pub const IDENT: u16 = 0;
    pub const IDENT_LEN: usize = 8;
}

pub const IDENT_TEXT_LEN: usize = 14;
pub const CALIBRATION_LEN: usize = 8;
pub const FILTER_COUNT: usize = 6;
pub const MAX_CHANNEL: u16 = 399;
