//! ProtocolSession: owns a serial connection and the receiver's shadow state.
//!
//! Pure encoding lives in `encode`. ProtocolSession handles I/O, write
//! pacing, the page/address/lock shadow cache and its invalidation.

use std::time::{Duration, Instant};

use crate::domain::{RigError, RigResult};
use crate::ports::SerialConnection;

use super::encode::{data_pair, encode, mask_pair};
use super::memory::working;
use super::{Button, LockLevel, MemoryPage, OpKind, Routine};

/// Inter-byte write delay recommended for the receiver's serial input
pub const POST_WRITE_DELAY_MS: u64 = 12;

/// ReadButtons replies with the button code offset into ASCII digits
const BUTTON_REPLY_OFFSET: u8 = 48;

/// Last known state of the receiver's page, address and lock registers.
///
/// A cache, not a query: `None` means unknown, and the next access sends
/// the full addressing sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSessionState {
    pub current_page: Option<MemoryPage>,
    pub current_address: Option<u16>,
    pub current_lock: Option<LockLevel>,
}

impl DeviceSessionState {
    /// Forget everything; the next access resynchronises
    pub fn poison(&mut self) {
        *self = Self::default();
    }

    pub fn is_unknown(&self) -> bool {
        self.current_page.is_none() && self.current_address.is_none() && self.current_lock.is_none()
    }
}

/// Owns a serial connection and executes memory accesses against the AR7030 Plus.
pub struct ProtocolSession {
    serial: Box<dyn SerialConnection>,
    state: DeviceSessionState,
    post_write_delay: Duration,
    last_write: Option<Instant>,
}

impl ProtocolSession {
    pub fn new(serial: Box<dyn SerialConnection>) -> Self {
        Self {
            serial,
            state: DeviceSessionState::default(),
            post_write_delay: Duration::from_millis(POST_WRITE_DELAY_MS),
            last_write: None,
        }
    }

    pub fn with_post_write_delay(mut self, delay: Duration) -> Self {
        self.post_write_delay = delay;
        self
    }

    pub fn state(&self) -> &DeviceSessionState {
        &self.state
    }

    /// Mark the shadow cache unknown, e.g. after reconnecting
    pub fn reset_state(&mut self) {
        self.state.poison();
    }

    pub fn is_connected(&self) -> bool {
        self.serial.is_connected()
    }

    pub fn close(&mut self) -> RigResult<()> {
        self.state.poison();
        self.serial.close()
    }

    // --- Addressing ---

    /// Point the receiver at `(page, address)`, sending only what the
    /// shadow cache says has changed.
    pub fn set_address(&mut self, page: MemoryPage, address: u16) -> RigResult<()> {
        check_range(page, address, 1)?;

        if self.state.current_page != Some(page) {
            self.state.current_page = None;
            self.send_opcode(OpKind::SetPage, page.number())?;
            self.state.current_page = Some(page);
        }

        if self.state.current_address != Some(address) {
            self.state.current_address = None;
            let low = (address & 0xff) as u8;
            self.send_opcode(OpKind::SetHRegister, low >> 4)?;
            self.send_opcode(OpKind::SetAddress, low)?;
            if address > 0xff {
                self.send_opcode(OpKind::SetAddressHigh, (address >> 8) as u8)?;
            }
            self.state.current_address = Some(address);
        }

        Ok(())
    }

    // --- Writes ---

    /// Write one byte. The receiver advances its address by one.
    pub fn write_byte(&mut self, page: MemoryPage, address: u16, value: u8) -> RigResult<()> {
        self.set_address(page, address)?;
        for byte in data_pair(value) {
            self.send(byte)?;
        }
        self.advance(1);
        Ok(())
    }

    pub fn write_u16(&mut self, page: MemoryPage, address: u16, value: u16) -> RigResult<()> {
        self.write_bytes(page, address, &value.to_be_bytes())
    }

    /// Write a 24-bit value, MSB first
    pub fn write_u24(&mut self, page: MemoryPage, address: u16, value: u32) -> RigResult<()> {
        if value > 0x00ff_ffff {
            return Err(RigError::InvalidArgument(format!(
                "0x{value:x} does not fit in 24 bits"
            )));
        }
        self.write_bytes(page, address, &value.to_be_bytes()[1..])
    }

    pub fn write_u32(&mut self, page: MemoryPage, address: u16, value: u32) -> RigResult<()> {
        self.write_bytes(page, address, &value.to_be_bytes())
    }

    /// Sequential byte writes. A failure stops the sequence; bytes already
    /// written stay written.
    fn write_bytes(&mut self, page: MemoryPage, address: u16, bytes: &[u8]) -> RigResult<()> {
        check_range(page, address, bytes.len())?;
        for (offset, &value) in bytes.iter().enumerate() {
            self.write_byte(page, address + offset as u16, value)?;
        }
        Ok(())
    }

    /// Write `value`, leaving the bits set in `mask` unchanged.
    ///
    /// The mask register exists for the working page only and clears
    /// itself after the write.
    pub fn write_masked(
        &mut self,
        page: MemoryPage,
        address: u16,
        value: u8,
        mask: u8,
    ) -> RigResult<()> {
        if page != MemoryPage::Working {
            return Err(RigError::InvalidArgument(format!(
                "Masked write needs the working page, not {page:?}"
            )));
        }
        self.set_address(page, address)?;
        for byte in mask_pair(mask).into_iter().chain(data_pair(value)) {
            self.send(byte)?;
        }
        self.advance(1);
        Ok(())
    }

    // --- Reads ---

    /// Read one byte. The receiver advances its address by one.
    pub fn read_byte(&mut self, page: MemoryPage, address: u16) -> RigResult<u8> {
        self.set_address(page, address)?;
        self.send_opcode(OpKind::ReadData, 1)?;
        let reply = self.receive(1)?;
        self.advance(1);
        Ok(reply[0])
    }

    pub fn read_u16(&mut self, page: MemoryPage, address: u16) -> RigResult<u16> {
        let b = self.read_block(page, address, 2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u24(&mut self, page: MemoryPage, address: u16) -> RigResult<u32> {
        let b = self.read_block(page, address, 3)?;
        Ok(u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    pub fn read_u32(&mut self, page: MemoryPage, address: u16) -> RigResult<u32> {
        let b = self.read_block(page, address, 4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read `len` consecutive bytes
    pub fn read_block(&mut self, page: MemoryPage, address: u16, len: usize) -> RigResult<Vec<u8>> {
        check_range(page, address, len)?;
        let mut out = Vec::with_capacity(len);
        for offset in 0..len {
            out.push(self.read_byte(page, address + offset as u16)?);
        }
        Ok(out)
    }

    // --- Locking ---

    /// Set the lock level, skipping the command when it is already in force
    pub fn set_lock(&mut self, level: LockLevel) -> RigResult<()> {
        if self.state.current_lock == Some(level) {
            return Ok(());
        }
        self.state.current_lock = None;
        self.send_opcode(OpKind::SetLock, level.code())?;
        self.state.current_lock = Some(level);
        Ok(())
    }

    /// Run `body` with the receiver locked at `level`, then unlock.
    ///
    /// The unlock is always attempted. An error from `body` wins over an
    /// error from the unlock.
    pub fn with_lock<T>(
        &mut self,
        level: LockLevel,
        body: impl FnOnce(&mut Self) -> RigResult<T>,
    ) -> RigResult<T> {
        let result = self.set_lock(level).and_then(|_| body(self));
        let unlock = self.set_lock(LockLevel::Unlocked);

        match (result, unlock) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(unlock_err)) => {
                log::warn!("AR7030 unlock after failed operation also failed: {unlock_err}");
                Err(e)
            }
        }
    }

    // --- Routines and buttons ---

    /// Run a receiver routine. Only ReadSignal and ReadButtons answer;
    /// use `execute_with_reply` for those.
    pub fn execute(&mut self, routine: Routine) -> RigResult<()> {
        self.send_opcode(OpKind::ExecuteRoutine, routine.code())
    }

    pub fn execute_with_reply(&mut self, routine: Routine) -> RigResult<u8> {
        if !routine.has_reply() {
            return Err(RigError::InvalidArgument(format!(
                "Routine {routine:?} has no reply"
            )));
        }
        self.execute(routine)?;
        let reply = self.receive(1)?;
        Ok(reply[0])
    }

    /// Raw AGC voltage, 0..=255
    pub fn read_signal(&mut self) -> RigResult<u8> {
        self.execute_with_reply(Routine::ReadSignal)
    }

    /// Front panel button currently held
    pub fn read_buttons(&mut self) -> RigResult<Button> {
        let reply = self.execute_with_reply(Routine::ReadButtons)?;
        reply
            .checked_sub(BUTTON_REPLY_OFFSET)
            .and_then(|code| Button::try_from(code).ok())
            .ok_or_else(|| RigError::Protocol(format!("Unexpected button reply 0x{reply:02x}")))
    }

    pub fn operate_button(&mut self, button: Button) -> RigResult<()> {
        self.send_opcode(OpKind::OperateButton, button.code())
    }

    /// Act as if `code` came from the IR remote: write IRCODE, then SetAll
    pub fn send_ir_code(&mut self, code: u8) -> RigResult<()> {
        self.write_byte(MemoryPage::Working, working::IRCODE, code)?;
        self.execute(Routine::SetAll)?;
        log::debug!("AR7030 IR code 0x{code:02x}");
        Ok(())
    }

    // --- Wire ---

    fn send_opcode(&mut self, op: OpKind, operand: u8) -> RigResult<()> {
        self.send(encode(op, operand))
    }

    fn send(&mut self, byte: u8) -> RigResult<()> {
        self.ensure_write_delay();
        log::debug!("AR7030 TX 0x{byte:02x}");

        let result = self.serial.write_all(&[byte]);
        // Update timestamp even on error so the next byte still respects the delay
        self.last_write = Some(Instant::now());

        result.map_err(|e| self.invalidate(e))
    }

    fn receive(&mut self, len: usize) -> RigResult<Vec<u8>> {
        let reply = self.serial.read_reply(len).map_err(|e| self.invalidate(e))?;
        log::debug!("AR7030 RX {reply:02x?}");
        Ok(reply)
    }

    /// Any failed transfer leaves the receiver's registers unknown
    fn invalidate(&mut self, err: RigError) -> RigError {
        log::warn!("AR7030 session state invalidated: {err}");
        self.state.poison();
        err
    }

    fn advance(&mut self, count: u16) {
        self.state.current_address = self
            .state
            .current_address
            .and_then(|a| a.checked_add(count));
    }

    /// Sleep if needed to keep the minimum gap between written bytes.
    fn ensure_write_delay(&self) {
        if let Some(last) = self.last_write {
            let elapsed = last.elapsed();
            if elapsed < self.post_write_delay {
                std::thread::sleep(self.post_write_delay - elapsed);
            }
        }
    }
}

fn check_range(page: MemoryPage, address: u16, len: usize) -> RigResult<()> {
    if address as usize + len > page.capacity() as usize {
        return Err(RigError::InvalidArgument(format!(
            "Address {address} (+{len}) outside page {page:?} of {} bytes",
            page.capacity()
        )));
    }
    Ok(())
}
