//! Pure encoding: operation + 4-bit operand → wire byte.
//!
//! No I/O, no side effects. The operand is masked to its low nibble, so any
//! value is accepted and silently truncated; range checks belong to callers.

use super::OpKind;

/// Encode one command byte: `(op base) | (operand & 0x0f)`.
pub fn encode(op: OpKind, operand: u8) -> u8 {
    op.base() | (operand & 0x0f)
}

/// High and low nibble of a byte
pub fn nibbles(value: u8) -> (u8, u8) {
    (value >> 4, value & 0x0f)
}

/// The SRH + WRD pair that writes one data byte.
/// Always sent together, even when H is already right, so EEPROM writes get
/// their settle time.
pub fn data_pair(value: u8) -> [u8; 2] {
    let (hi, lo) = nibbles(value);
    [encode(OpKind::SetHRegister, hi), encode(OpKind::WriteData, lo)]
}

/// The SRH + MSK pair that loads the write mask
pub fn mask_pair(mask: u8) -> [u8; 2] {
    let (hi, lo) = nibbles(mask);
    [encode(OpKind::SetHRegister, hi), encode(OpKind::SetMask, lo)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use OpKind::*;

    #[test]
    fn encode_set_page_2() {
        assert_eq!(encode(SetPage, 2), 0x52);
    }

    #[test]
    fn encode_set_h_register_15() {
        assert_eq!(encode(SetHRegister, 15), 0x3f);
    }

    #[test]
    fn encode_set_address() {
        assert_eq!(encode(SetAddress, 4), 0x44);
        assert_eq!(encode(SetAddressHigh, 1), 0x11);
    }

    #[test]
    fn encode_read_one() {
        assert_eq!(encode(ReadData, 1), 0x71);
    }

    #[test]
    fn encode_read_signal_routine() {
        assert_eq!(encode(ExecuteRoutine, 14), 0x2e);
    }

    #[test]
    fn encode_lock_levels() {
        assert_eq!(encode(SetLock, 0), 0x80);
        assert_eq!(encode(SetLock, 1), 0x81);
    }

    #[test]
    fn encode_button_and_mask() {
        assert_eq!(encode(OperateButton, 9), 0xa9);
        assert_eq!(encode(SetMask, 0xc), 0x9c);
    }

    #[test]
    fn encode_truncates_operand_to_low_nibble() {
        assert_eq!(encode(SetPage, 0xf2), 0x52);
        assert_eq!(encode(WriteData, 0x1f), 0x6f);
        assert_eq!(encode(Nop, 0xff), 0x0f);
    }

    #[test]
    fn data_pair_splits_nibbles() {
        assert_eq!(data_pair(0xa5), [0x3a, 0x65]);
        assert_eq!(data_pair(0x00), [0x30, 0x60]);
    }

    #[test]
    fn mask_pair_splits_nibbles() {
        assert_eq!(mask_pair(0x80), [0x38, 0x90]);
    }
}
