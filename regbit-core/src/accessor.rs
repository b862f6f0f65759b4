//! Register accessor
//!
//! Combines a [`BusTransport`] with the bit-field codec to provide the full
//! read/write surface for 8-bit and 16-bit register devices:
//!
//! | Unit        | Read                         | Write                              |
//! |-------------|------------------------------|------------------------------------|
//! | bit / field | read register, extract       | read register, inject, write back  |
//! | byte / word | single-unit transfer         | single-unit transfer               |
//! | arrays      | block transfer (units count) | block transfer                     |
//!
//! # Read-modify-write
//!
//! Bit and field writes read the full register, splice in the new bits and
//! write the full value back. If the read fails nothing is written. The two
//! transactions are not atomic: another bus master (or another accessor on
//! the same bus) can modify the register in between. Callers needing
//! atomicity must serialize access themselves.
//!
//! # Word order
//!
//! 16-bit registers travel most significant byte first.

use heapless::Vec;
use regbit_hal::{BusTransport, Timeout};

use crate::codec::{extract_bit, extract_field, inject_bit, inject_field, FieldSpec, RegisterWord};
use crate::config::AccessConfig;
use crate::error::Error;

/// Maximum number of units (bytes or words) in a single block read
pub const MAX_READ_UNITS: usize = 255;

/// Staging buffer for block writes (127 bytes or 63 words)
const WRITE_STAGING_SIZE: usize = 127;

/// Register access over a bus transport
///
/// One accessor serves every device on its bus; the device address is
/// passed to each call. Reads take an optional timeout that falls back to
/// [`AccessConfig::default_timeout`].
pub struct RegisterAccessor<T> {
    transport: T,
    config: AccessConfig,
}

impl<T: BusTransport> RegisterAccessor<T> {
    /// Create an accessor with the default configuration
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, AccessConfig::default())
    }

    /// Create an accessor with an explicit configuration
    pub fn with_config(transport: T, config: AccessConfig) -> Self {
        Self { transport, config }
    }

    /// Get the configuration
    pub fn config(&self) -> &AccessConfig {
        &self.config
    }

    /// Change the timeout used by reads that do not pass one
    pub fn set_default_timeout(&mut self, timeout: Timeout) {
        self.config.default_timeout = timeout;
    }

    /// Borrow the underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrow the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the accessor and return the underlying transport
    pub fn release(self) -> T {
        self.transport
    }

    /// Bind a device address for a sequence of calls
    pub fn device(&mut self, address: u8) -> Device<'_, T> {
        Device {
            regs: self,
            address,
        }
    }

    // ------------------------------------------------------------------
    // Width-generic operations
    // ------------------------------------------------------------------

    /// Read a full register
    pub fn read_register<W: RegisterWord>(
        &mut self,
        dev: u8,
        reg: u8,
        timeout: Option<Timeout>,
    ) -> Result<W, Error<T::Error>> {
        let mut raw = [0u8; 2];
        let raw = &mut raw[..W::BYTES];
        let transferred = self.read_raw(dev, Some(reg), raw, timeout)?;
        if transferred < W::BYTES {
            return Err(Error::ShortRead {
                expected: W::BYTES,
                transferred,
            });
        }
        Ok(W::decode_be(raw))
    }

    /// Write a full register
    pub fn write_register<W: RegisterWord>(
        &mut self,
        dev: u8,
        reg: u8,
        value: W,
    ) -> Result<(), Error<T::Error>> {
        let mut raw = [0u8; 2];
        value.encode_be(&mut raw);
        self.write_raw(dev, reg, &raw[..W::BYTES])
    }

    /// Read a bit field as a right-aligned value
    pub fn read_field<W: RegisterWord>(
        &mut self,
        dev: u8,
        reg: u8,
        field: FieldSpec,
        timeout: Option<Timeout>,
    ) -> Result<W, Error<T::Error>> {
        ensure_fits::<W, T::Error>(field)?;
        let value = self.read_register::<W>(dev, reg, timeout)?;
        Ok(extract_field(value, field))
    }

    /// Replace a bit field, leaving the rest of the register untouched
    pub fn write_field<W: RegisterWord>(
        &mut self,
        dev: u8,
        reg: u8,
        field: FieldSpec,
        value: W,
    ) -> Result<(), Error<T::Error>> {
        ensure_fits::<W, T::Error>(field)?;
        let current = self.read_for_update::<W>(dev, reg)?;
        self.write_register(dev, reg, inject_field(current, field, value))
    }

    /// Read a single bit
    pub fn read_flag<W: RegisterWord>(
        &mut self,
        dev: u8,
        reg: u8,
        bit: u8,
        timeout: Option<Timeout>,
    ) -> Result<bool, Error<T::Error>> {
        ensure_fits::<W, T::Error>(bit_field::<T::Error>(bit)?)?;
        let value = self.read_register::<W>(dev, reg, timeout)?;
        Ok(extract_bit(value, bit))
    }

    /// Set or clear a single bit, leaving the rest of the register untouched
    pub fn write_flag<W: RegisterWord>(
        &mut self,
        dev: u8,
        reg: u8,
        bit: u8,
        value: bool,
    ) -> Result<(), Error<T::Error>> {
        ensure_fits::<W, T::Error>(bit_field::<T::Error>(bit)?)?;
        let current = self.read_for_update::<W>(dev, reg)?;
        self.write_register(dev, reg, inject_bit(current, bit, value))
    }

    /// Read consecutive registers starting at `reg`
    ///
    /// Returns the number of whole units transferred; `Ok(0)` means nothing
    /// was transferred. An empty `buf` returns `Ok(0)` without bus traffic.
    pub fn read_registers<W: RegisterWord>(
        &mut self,
        dev: u8,
        reg: u8,
        buf: &mut [W],
        timeout: Option<Timeout>,
    ) -> Result<usize, Error<T::Error>> {
        self.read_units(dev, Some(reg), buf, timeout)
    }

    /// Write consecutive registers starting at `reg`
    pub fn write_registers<W: RegisterWord>(
        &mut self,
        dev: u8,
        reg: u8,
        data: &[W],
    ) -> Result<(), Error<T::Error>> {
        if data.len() > W::MAX_BLOCK_WRITE {
            return Err(Error::TooLong {
                len: data.len(),
                max: W::MAX_BLOCK_WRITE,
            });
        }

        let mut staged: Vec<u8, WRITE_STAGING_SIZE> = Vec::new();
        for &unit in data {
            let mut raw = [0u8; 2];
            unit.encode_be(&mut raw);
            staged
                .extend_from_slice(&raw[..W::BYTES])
                .map_err(|_| Error::<T::Error>::TooLong {
                    len: data.len(),
                    max: W::MAX_BLOCK_WRITE,
                })?;
        }

        self.write_raw(dev, reg, &staged)
    }

    // ------------------------------------------------------------------
    // 8-bit register devices
    // ------------------------------------------------------------------

    /// Read a single bit (0-7) from an 8-bit register
    pub fn read_bit(
        &mut self,
        dev: u8,
        reg: u8,
        bit_num: u8,
        timeout: Option<Timeout>,
    ) -> Result<bool, Error<T::Error>> {
        self.read_flag::<u8>(dev, reg, bit_num, timeout)
    }

    /// Read `length` bits starting at `bit_start` from an 8-bit register
    ///
    /// The result is right-aligned: `0b101` read from any position is `5`.
    pub fn read_bits(
        &mut self,
        dev: u8,
        reg: u8,
        bit_start: u8,
        length: u8,
        timeout: Option<Timeout>,
    ) -> Result<u8, Error<T::Error>> {
        let field = checked_field::<u8, T::Error>(bit_start, length)?;
        self.read_field(dev, reg, field, timeout)
    }

    /// Read an 8-bit register
    pub fn read_byte(
        &mut self,
        dev: u8,
        reg: u8,
        timeout: Option<Timeout>,
    ) -> Result<u8, Error<T::Error>> {
        self.read_register(dev, reg, timeout)
    }

    /// Read consecutive 8-bit registers into `buf`
    pub fn read_bytes(
        &mut self,
        dev: u8,
        reg: u8,
        buf: &mut [u8],
        timeout: Option<Timeout>,
    ) -> Result<usize, Error<T::Error>> {
        self.read_units(dev, Some(reg), buf, timeout)
    }

    /// Read bytes without sending a register address first
    ///
    /// Reads continue from the device's internal address pointer. Required
    /// by auto-incrementing memories such as the MB85RC256 FRAM.
    pub fn read_bytes_no_reg_address(
        &mut self,
        dev: u8,
        buf: &mut [u8],
        timeout: Option<Timeout>,
    ) -> Result<usize, Error<T::Error>> {
        self.read_units(dev, None, buf, timeout)
    }

    /// Set or clear a single bit (0-7) of an 8-bit register
    pub fn write_bit(
        &mut self,
        dev: u8,
        reg: u8,
        bit_num: u8,
        value: bool,
    ) -> Result<(), Error<T::Error>> {
        self.write_flag::<u8>(dev, reg, bit_num, value)
    }

    /// Write the right-aligned `value` into `length` bits at `bit_start`
    pub fn write_bits(
        &mut self,
        dev: u8,
        reg: u8,
        bit_start: u8,
        length: u8,
        value: u8,
    ) -> Result<(), Error<T::Error>> {
        let field = checked_field::<u8, T::Error>(bit_start, length)?;
        self.write_field(dev, reg, field, value)
    }

    /// Write an 8-bit register
    pub fn write_byte(&mut self, dev: u8, reg: u8, value: u8) -> Result<(), Error<T::Error>> {
        self.write_register(dev, reg, value)
    }

    /// Write consecutive 8-bit registers (at most 127 bytes)
    pub fn write_bytes(&mut self, dev: u8, reg: u8, data: &[u8]) -> Result<(), Error<T::Error>> {
        self.write_registers(dev, reg, data)
    }

    // ------------------------------------------------------------------
    // 16-bit register devices
    // ------------------------------------------------------------------

    /// Read a single bit (0-15) from a 16-bit register
    pub fn read_bit_w(
        &mut self,
        dev: u8,
        reg: u8,
        bit_num: u8,
        timeout: Option<Timeout>,
    ) -> Result<bool, Error<T::Error>> {
        self.read_flag::<u16>(dev, reg, bit_num, timeout)
    }

    /// Read `length` bits starting at `bit_start` from a 16-bit register
    pub fn read_bits_w(
        &mut self,
        dev: u8,
        reg: u8,
        bit_start: u8,
        length: u8,
        timeout: Option<Timeout>,
    ) -> Result<u16, Error<T::Error>> {
        let field = checked_field::<u16, T::Error>(bit_start, length)?;
        self.read_field(dev, reg, field, timeout)
    }

    /// Read a 16-bit register
    pub fn read_word(
        &mut self,
        dev: u8,
        reg: u8,
        timeout: Option<Timeout>,
    ) -> Result<u16, Error<T::Error>> {
        self.read_register(dev, reg, timeout)
    }

    /// Read consecutive 16-bit registers into `buf`
    pub fn read_words(
        &mut self,
        dev: u8,
        reg: u8,
        buf: &mut [u16],
        timeout: Option<Timeout>,
    ) -> Result<usize, Error<T::Error>> {
        self.read_units(dev, Some(reg), buf, timeout)
    }

    /// Set or clear a single bit (0-15) of a 16-bit register
    pub fn write_bit_w(
        &mut self,
        dev: u8,
        reg: u8,
        bit_num: u8,
        value: bool,
    ) -> Result<(), Error<T::Error>> {
        self.write_flag::<u16>(dev, reg, bit_num, value)
    }

    /// Write the right-aligned `value` into `length` bits at `bit_start`
    pub fn write_bits_w(
        &mut self,
        dev: u8,
        reg: u8,
        bit_start: u8,
        length: u8,
        value: u16,
    ) -> Result<(), Error<T::Error>> {
        let field = checked_field::<u16, T::Error>(bit_start, length)?;
        self.write_field(dev, reg, field, value)
    }

    /// Write a 16-bit register
    pub fn write_word(&mut self, dev: u8, reg: u8, value: u16) -> Result<(), Error<T::Error>> {
        self.write_register(dev, reg, value)
    }

    /// Write consecutive 16-bit registers (at most 63 words)
    pub fn write_words(&mut self, dev: u8, reg: u8, data: &[u16]) -> Result<(), Error<T::Error>> {
        self.write_registers(dev, reg, data)
    }

    // ------------------------------------------------------------------
    // Bus plumbing
    // ------------------------------------------------------------------

    /// First half of a read-modify-write; uses the default timeout
    fn read_for_update<W: RegisterWord>(&mut self, dev: u8, reg: u8) -> Result<W, Error<T::Error>> {
        self.read_register::<W>(dev, reg, None).map_err(|e| {
            #[cfg(feature = "defmt")]
            defmt::debug!(
                "i2c {=u8:#x} reg {=u8:#x}: read failed, update aborted",
                dev,
                reg
            );
            e
        })
    }

    fn read_units<W: RegisterWord>(
        &mut self,
        dev: u8,
        reg: Option<u8>,
        buf: &mut [W],
        timeout: Option<Timeout>,
    ) -> Result<usize, Error<T::Error>> {
        if buf.is_empty() {
            return Ok(0);
        }
        if buf.len() > MAX_READ_UNITS {
            return Err(Error::TooLong {
                len: buf.len(),
                max: MAX_READ_UNITS,
            });
        }

        let mut raw = [0u8; MAX_READ_UNITS * 2];
        let raw = &mut raw[..buf.len() * W::BYTES];
        let transferred = self.read_raw(dev, reg, raw, timeout)?;

        let units = transferred.min(raw.len()) / W::BYTES;
        for (slot, chunk) in buf.iter_mut().zip(raw.chunks_exact(W::BYTES)).take(units) {
            *slot = W::decode_be(chunk);
        }
        Ok(units)
    }

    fn read_raw(
        &mut self,
        dev: u8,
        reg: Option<u8>,
        buf: &mut [u8],
        timeout: Option<Timeout>,
    ) -> Result<usize, Error<T::Error>> {
        let timeout = self.config.resolve_timeout(timeout);
        self.transport
            .read_block(dev, reg, buf, timeout)
            .map_err(|e| {
                #[cfg(feature = "defmt")]
                defmt::trace!(
                    "i2c {=u8:#x} reg {:?}: read of {=usize} bytes failed",
                    dev,
                    reg,
                    buf.len()
                );
                Error::from(e)
            })
    }

    fn write_raw(&mut self, dev: u8, reg: u8, data: &[u8]) -> Result<(), Error<T::Error>> {
        self.transport.write_block(dev, reg, data).map_err(|e| {
            #[cfg(feature = "defmt")]
            defmt::trace!(
                "i2c {=u8:#x} reg {=u8:#x}: write of {=usize} bytes failed",
                dev,
                reg,
                data.len()
            );
            Error::from(e)
        })
    }
}

/// Build a field and check it against width `W`
fn checked_field<W: RegisterWord, E>(bit_start: u8, length: u8) -> Result<FieldSpec, Error<E>> {
    FieldSpec::new(bit_start, length)
        .filter(|field| field.fits::<W>())
        .ok_or(Error::InvalidField { bit_start, length })
}

fn bit_field<E>(bit: u8) -> Result<FieldSpec, Error<E>> {
    FieldSpec::bit(bit).ok_or(Error::InvalidField {
        bit_start: bit,
        length: 1,
    })
}

fn ensure_fits<W: RegisterWord, E>(field: FieldSpec) -> Result<(), Error<E>> {
    if field.fits::<W>() {
        Ok(())
    } else {
        Err(Error::InvalidField {
            bit_start: field.bit_start(),
            length: field.length(),
        })
    }
}

/// Register access bound to one device address
///
/// Created by [`RegisterAccessor::device`]. Drivers typically hold one for
/// the duration of an init sequence.
pub struct Device<'a, T> {
    regs: &'a mut RegisterAccessor<T>,
    address: u8,
}

impl<T: BusTransport> Device<'_, T> {
    /// Device address
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Read a full register
    pub fn read_register<W: RegisterWord>(
        &mut self,
        reg: u8,
        timeout: Option<Timeout>,
    ) -> Result<W, Error<T::Error>> {
        self.regs.read_register(self.address, reg, timeout)
    }

    /// Write a full register
    pub fn write_register<W: RegisterWord>(
        &mut self,
        reg: u8,
        value: W,
    ) -> Result<(), Error<T::Error>> {
        self.regs.write_register(self.address, reg, value)
    }

    /// Read a bit field as a right-aligned value
    pub fn read_field<W: RegisterWord>(
        &mut self,
        reg: u8,
        field: FieldSpec,
        timeout: Option<Timeout>,
    ) -> Result<W, Error<T::Error>> {
        self.regs.read_field(self.address, reg, field, timeout)
    }

    /// Replace a bit field
    pub fn write_field<W: RegisterWord>(
        &mut self,
        reg: u8,
        field: FieldSpec,
        value: W,
    ) -> Result<(), Error<T::Error>> {
        self.regs.write_field(self.address, reg, field, value)
    }

    /// Read a single bit
    pub fn read_flag<W: RegisterWord>(
        &mut self,
        reg: u8,
        bit: u8,
        timeout: Option<Timeout>,
    ) -> Result<bool, Error<T::Error>> {
        self.regs.read_flag::<W>(self.address, reg, bit, timeout)
    }

    /// Set or clear a single bit
    pub fn write_flag<W: RegisterWord>(
        &mut self,
        reg: u8,
        bit: u8,
        value: bool,
    ) -> Result<(), Error<T::Error>> {
        self.regs.write_flag::<W>(self.address, reg, bit, value)
    }

    /// Read consecutive registers
    pub fn read_registers<W: RegisterWord>(
        &mut self,
        reg: u8,
        buf: &mut [W],
        timeout: Option<Timeout>,
    ) -> Result<usize, Error<T::Error>> {
        self.regs.read_registers(self.address, reg, buf, timeout)
    }

    /// Write consecutive registers
    pub fn write_registers<W: RegisterWord>(
        &mut self,
        reg: u8,
        data: &[W],
    ) -> Result<(), Error<T::Error>> {
        self.regs.write_registers(self.address, reg, data)
    }

    /// Read bytes from the device's current address pointer
    pub fn read_bytes_no_reg_address(
        &mut self,
        buf: &mut [u8],
        timeout: Option<Timeout>,
    ) -> Result<usize, Error<T::Error>> {
        self.regs
            .read_bytes_no_reg_address(self.address, buf, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regbit_hal::TransferError;

    const DEV: u8 = 0x68;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct FakeError;

    /// Auto-incrementing 256-byte register file
    struct FakeBus {
        regs: [u8; 256],
        pointer: u8,
        reads: usize,
        writes: usize,
        last_address: Option<u8>,
        last_timeout: Option<Timeout>,
        fail_reads: bool,
        fail_writes: bool,
        timeout_reads: bool,
        short_by: usize,
    }

    impl FakeBus {
        fn new() -> Self {
            Self {
                regs: [0; 256],
                pointer: 0,
                reads: 0,
                writes: 0,
                last_address: None,
                last_timeout: None,
                fail_reads: false,
                fail_writes: false,
                timeout_reads: false,
                short_by: 0,
            }
        }

        fn with_register(reg: u8, value: u8) -> Self {
            let mut bus = Self::new();
            bus.regs[usize::from(reg)] = value;
            bus
        }
    }

    impl BusTransport for FakeBus {
        type Error = FakeError;

        fn read_block(
            &mut self,
            address: u8,
            register: Option<u8>,
            buf: &mut [u8],
            timeout: Timeout,
        ) -> Result<usize, TransferError<FakeError>> {
            self.reads += 1;
            self.last_address = Some(address);
            self.last_timeout = Some(timeout);
            if self.fail_reads {
                return Err(TransferError::Bus(FakeError));
            }
            if self.timeout_reads {
                return Err(TransferError::Timeout);
            }

            let start = register.unwrap_or(self.pointer);
            let count = buf.len().saturating_sub(self.short_by);
            for (i, b) in buf[..count].iter_mut().enumerate() {
                *b = self.regs[usize::from(start.wrapping_add(i as u8))];
            }
            self.pointer = start.wrapping_add(count as u8);
            Ok(count)
        }

        fn write_block(
            &mut self,
            address: u8,
            register: u8,
            data: &[u8],
        ) -> Result<(), TransferError<FakeError>> {
            self.writes += 1;
            self.last_address = Some(address);
            if self.fail_writes {
                return Err(TransferError::Bus(FakeError));
            }

            for (i, &b) in data.iter().enumerate() {
                self.regs[usize::from(register.wrapping_add(i as u8))] = b;
            }
            self.pointer = register.wrapping_add(data.len() as u8);
            Ok(())
        }
    }

    #[test]
    fn test_read_bits_right_aligned() {
        let mut regs = RegisterAccessor::new(FakeBus::with_register(0x1A, 0b1011_0100));

        let value = regs.read_bits(DEV, 0x1A, 2, 3, None).unwrap();

        assert_eq!(value, 5);
        assert_eq!(regs.transport().reads, 1);
        assert_eq!(regs.transport().last_address, Some(DEV));
    }

    #[test]
    fn test_write_bits_read_modify_write() {
        let mut regs = RegisterAccessor::new(FakeBus::with_register(0x1B, 0x00));

        regs.write_bits(DEV, 0x1B, 4, 4, 0x0F).unwrap();

        let bus = regs.transport();
        assert_eq!(bus.reads, 1);
        assert_eq!(bus.writes, 1);
        assert_eq!(bus.regs[0x1B], 0xF0);
    }

    #[test]
    fn test_write_bit_preserves_other_bits() {
        let mut regs = RegisterAccessor::new(FakeBus::with_register(0x6B, 0b0100_0001));

        regs.write_bit(DEV, 0x6B, 6, false).unwrap();
        assert_eq!(regs.transport().regs[0x6B], 0b0000_0001);

        regs.write_bit(DEV, 0x6B, 7, true).unwrap();
        assert_eq!(regs.transport().regs[0x6B], 0b1000_0001);

        assert!(regs.read_bit(DEV, 0x6B, 7, None).unwrap());
        assert!(!regs.read_bit(DEV, 0x6B, 6, None).unwrap());
    }

    #[test]
    fn test_bit_round_trip_every_position_u8() {
        for bit in 0..8u8 {
            for value in [false, true] {
                let mut regs = RegisterAccessor::new(FakeBus::with_register(0x21, 0x5A));

                regs.write_bit(DEV, 0x21, bit, value).unwrap();

                assert_eq!(regs.read_bit(DEV, 0x21, bit, None).unwrap(), value);
                let outside = !(1u8 << bit);
                assert_eq!(regs.transport().regs[0x21] & outside, 0x5A & outside);
                assert_eq!(regs.transport().writes, 1);
            }
        }
    }

    #[test]
    fn test_bit_round_trip_every_position_u16() {
        for bit in 0..16u8 {
            for value in [false, true] {
                let mut regs = RegisterAccessor::new(FakeBus::new());
                regs.write_word(DEV, 0x32, 0x3C3C).unwrap();

                regs.write_bit_w(DEV, 0x32, bit, value).unwrap();

                assert_eq!(regs.read_bit_w(DEV, 0x32, bit, None).unwrap(), value);
                let outside = !(1u16 << bit);
                let word = regs.read_word(DEV, 0x32, None).unwrap();
                assert_eq!(word & outside, 0x3C3C & outside);
                assert_eq!(regs.transport().writes, 2);
            }
        }
    }

    #[test]
    fn test_field_round_trip_every_position_u8() {
        for start in 0..8u8 {
            for len in 1..=(8 - start) {
                let mask = ((1u16 << len) - 1) as u8;
                for value in [0x00u8, 0xFF, 0xAA] {
                    let mut regs = RegisterAccessor::new(FakeBus::with_register(0x20, 0x5A));

                    regs.write_bits(DEV, 0x20, start, len, value).unwrap();

                    assert_eq!(
                        regs.read_bits(DEV, 0x20, start, len, None).unwrap(),
                        value & mask
                    );
                    let outside = !(mask << start);
                    assert_eq!(regs.transport().regs[0x20] & outside, 0x5A & outside);
                }
            }
        }
    }

    #[test]
    fn test_field_round_trip_every_position_u16() {
        for start in 0..16u8 {
            for len in 1..=(16 - start) {
                let mask = ((1u32 << len) - 1) as u16;
                for value in [0x0000u16, 0xFFFF, 0xA5A5] {
                    let mut regs = RegisterAccessor::new(FakeBus::new());
                    regs.write_word(DEV, 0x30, 0x3C3C).unwrap();

                    regs.write_bits_w(DEV, 0x30, start, len, value).unwrap();

                    assert_eq!(
                        regs.read_bits_w(DEV, 0x30, start, len, None).unwrap(),
                        value & mask
                    );
                    let outside = !(mask << start);
                    let word = regs.read_word(DEV, 0x30, None).unwrap();
                    assert_eq!(word & outside, 0x3C3C & outside);
                }
            }
        }
    }

    #[test]
    fn test_failed_read_prevents_write() {
        let mut bus = FakeBus::new();
        bus.fail_reads = true;
        let mut regs = RegisterAccessor::new(bus);

        assert_eq!(
            regs.write_bit(DEV, 0x10, 3, true),
            Err(Error::Transport(FakeError))
        );
        assert_eq!(
            regs.write_bits(DEV, 0x10, 0, 4, 0x3),
            Err(Error::Transport(FakeError))
        );
        assert_eq!(
            regs.write_bit_w(DEV, 0x10, 12, true),
            Err(Error::Transport(FakeError))
        );
        assert_eq!(
            regs.write_bits_w(DEV, 0x10, 8, 8, 0xAB),
            Err(Error::Transport(FakeError))
        );

        assert_eq!(regs.transport().reads, 4);
        assert_eq!(regs.transport().writes, 0);
    }

    #[test]
    fn test_timeout_prevents_write() {
        let mut bus = FakeBus::with_register(0x10, 0x81);
        bus.timeout_reads = true;
        let mut regs = RegisterAccessor::new(bus);

        assert_eq!(regs.read_byte(DEV, 0x10, None), Err(Error::Timeout));
        assert_eq!(regs.read_word(DEV, 0x10, None), Err(Error::Timeout));
        assert_eq!(regs.write_bit(DEV, 0x10, 3, true), Err(Error::Timeout));
        assert_eq!(regs.write_bits_w(DEV, 0x10, 8, 8, 0xAB), Err(Error::Timeout));

        assert_eq!(regs.transport().reads, 4);
        assert_eq!(regs.transport().writes, 0);
        assert_eq!(regs.transport().regs[0x10], 0x81);
    }

    #[test]
    fn test_short_read_prevents_write() {
        let mut bus = FakeBus::new();
        bus.short_by = 1;
        let mut regs = RegisterAccessor::new(bus);

        assert_eq!(
            regs.write_bits_w(DEV, 0x10, 0, 4, 0x3),
            Err(Error::ShortRead {
                expected: 2,
                transferred: 1
            })
        );
        assert_eq!(regs.transport().writes, 0);
    }

    #[test]
    fn test_write_failure_reported() {
        let mut bus = FakeBus::with_register(0x40, 0x0F);
        bus.fail_writes = true;
        let mut regs = RegisterAccessor::new(bus);

        assert_eq!(
            regs.write_bits(DEV, 0x40, 4, 4, 0x0A),
            Err(Error::Transport(FakeError))
        );
        assert_eq!(regs.transport().reads, 1);
        assert_eq!(regs.transport().writes, 1);
        assert_eq!(regs.transport().regs[0x40], 0x0F);
    }

    #[test]
    fn test_invalid_field_rejected_before_bus() {
        let mut regs = RegisterAccessor::new(FakeBus::new());

        assert_eq!(
            regs.read_bits(DEV, 0x00, 6, 3, None),
            Err(Error::InvalidField {
                bit_start: 6,
                length: 3
            })
        );
        assert_eq!(
            regs.write_bits(DEV, 0x00, 4, 5, 0x1F),
            Err(Error::InvalidField {
                bit_start: 4,
                length: 5
            })
        );
        assert_eq!(
            regs.write_bits(DEV, 0x00, 0, 0, 0x00),
            Err(Error::InvalidField {
                bit_start: 0,
                length: 0
            })
        );
        assert_eq!(
            regs.write_bit(DEV, 0x00, 8, true),
            Err(Error::InvalidField {
                bit_start: 8,
                length: 1
            })
        );
        assert_eq!(
            regs.read_bits_w(DEV, 0x00, 15, 2, None),
            Err(Error::InvalidField {
                bit_start: 15,
                length: 2
            })
        );
        assert_eq!(
            regs.read_bit_w(DEV, 0x00, 16, None),
            Err(Error::InvalidField {
                bit_start: 16,
                length: 1
            })
        );

        assert_eq!(regs.transport().reads, 0);
        assert_eq!(regs.transport().writes, 0);
    }

    #[test]
    fn test_byte_and_word_access() {
        let mut regs = RegisterAccessor::new(FakeBus::new());

        regs.write_byte(DEV, 0x05, 0xC3).unwrap();
        assert_eq!(regs.read_byte(DEV, 0x05, None).unwrap(), 0xC3);

        regs.write_word(DEV, 0x10, 0x1234).unwrap();
        assert_eq!(regs.transport().regs[0x10], 0x12);
        assert_eq!(regs.transport().regs[0x11], 0x34);
        assert_eq!(regs.read_word(DEV, 0x10, None).unwrap(), 0x1234);
    }

    #[test]
    fn test_word_arrays_big_endian() {
        let mut regs = RegisterAccessor::new(FakeBus::new());

        regs.write_words(DEV, 0x40, &[0x1234, 0xABCD]).unwrap();
        assert_eq!(&regs.transport().regs[0x40..0x44], &[0x12, 0x34, 0xAB, 0xCD]);

        let mut words = [0u16; 2];
        assert_eq!(regs.read_words(DEV, 0x40, &mut words, None).unwrap(), 2);
        assert_eq!(words, [0x1234, 0xABCD]);
    }

    #[test]
    fn test_byte_arrays() {
        let mut regs = RegisterAccessor::new(FakeBus::new());

        regs.write_bytes(DEV, 0x3B, &[1, 2, 3, 4, 5, 6]).unwrap();

        let mut buf = [0u8; 6];
        assert_eq!(regs.read_bytes(DEV, 0x3B, &mut buf, None).unwrap(), 6);
        assert_eq!(buf, [1, 2, 3, 4, 5, 6]);
        assert_eq!(regs.transport().writes, 1);
    }

    #[test]
    fn test_zero_length_read_returns_zero() {
        let mut regs = RegisterAccessor::new(FakeBus::new());

        assert_eq!(regs.read_bytes(DEV, 0x00, &mut [], None), Ok(0));
        assert_eq!(regs.read_words(DEV, 0x00, &mut [], None), Ok(0));
        assert_eq!(regs.read_bytes_no_reg_address(DEV, &mut [], None), Ok(0));
        assert_eq!(regs.transport().reads, 0);
    }

    #[test]
    fn test_partial_array_read_counts_whole_units() {
        let mut bus = FakeBus::new();
        bus.short_by = 1;
        let mut regs = RegisterAccessor::new(bus);

        let mut bytes = [0u8; 4];
        assert_eq!(regs.read_bytes(DEV, 0x00, &mut bytes, None), Ok(3));

        // 5 of 6 bytes arrive: two whole words
        let mut words = [0u16; 3];
        assert_eq!(regs.read_words(DEV, 0x00, &mut words, None), Ok(2));
    }

    #[test]
    fn test_array_read_errors_are_distinct() {
        let mut bus = FakeBus::new();
        bus.timeout_reads = true;
        let mut regs = RegisterAccessor::new(bus);
        let mut buf = [0u8; 4];

        let err = regs.read_bytes(DEV, 0x00, &mut buf, None).unwrap_err();
        assert!(err.is_timeout());

        regs.transport_mut().timeout_reads = false;
        regs.transport_mut().fail_reads = true;
        assert_eq!(
            regs.read_bytes(DEV, 0x00, &mut buf, None),
            Err(Error::Transport(FakeError))
        );
    }

    #[test]
    fn test_block_length_limits() {
        let mut regs = RegisterAccessor::new(FakeBus::new());

        regs.write_bytes(DEV, 0x00, &[0xEE; 127]).unwrap();
        assert_eq!(
            regs.write_bytes(DEV, 0x00, &[0xEE; 128]),
            Err(Error::TooLong { len: 128, max: 127 })
        );
        regs.write_words(DEV, 0x00, &[0xBEEF; 63]).unwrap();
        assert_eq!(
            regs.write_words(DEV, 0x00, &[0xBEEF; 64]),
            Err(Error::TooLong { len: 64, max: 63 })
        );

        let mut buf = [0u8; 256];
        assert_eq!(
            regs.read_bytes(DEV, 0x00, &mut buf, None),
            Err(Error::TooLong { len: 256, max: 255 })
        );
        assert_eq!(regs.read_bytes(DEV, 0x00, &mut buf[..255], None), Ok(255));

        assert_eq!(regs.transport().writes, 2);
    }

    #[test]
    fn test_default_timeout_fallback() {
        let config = AccessConfig::with_timeout(Timeout::from_millis(50));
        let mut regs = RegisterAccessor::with_config(FakeBus::new(), config);

        regs.read_byte(DEV, 0x00, None).unwrap();
        assert_eq!(regs.transport().last_timeout, Some(Timeout::from_millis(50)));

        regs.read_byte(DEV, 0x00, Some(Timeout::DISABLED)).unwrap();
        assert_eq!(regs.transport().last_timeout, Some(Timeout::DISABLED));

        regs.set_default_timeout(Timeout::from_millis(7));
        assert_eq!(regs.config().default_timeout, Timeout::from_millis(7));

        // The read half of a read-modify-write uses the default
        regs.write_bit(DEV, 0x00, 0, true).unwrap();
        assert_eq!(regs.transport().last_timeout, Some(Timeout::from_millis(7)));
    }

    #[test]
    fn test_read_without_register_address() {
        let mut regs = RegisterAccessor::new(FakeBus::new());
        regs.write_bytes(0x50, 0x20, &[0xA0, 0xA1, 0xA2, 0xA3]).unwrap();

        let mut head = [0u8; 2];
        regs.read_bytes(0x50, 0x20, &mut head, None).unwrap();

        // Continues from the internal pointer left by the previous read
        let mut tail = [0u8; 2];
        assert_eq!(
            regs.read_bytes_no_reg_address(0x50, &mut tail, None),
            Ok(2)
        );
        assert_eq!(head, [0xA0, 0xA1]);
        assert_eq!(tail, [0xA2, 0xA3]);
    }

    #[test]
    fn test_device_view() {
        let mut regs = RegisterAccessor::new(FakeBus::new());
        let field = FieldSpec::from_msb(4, 2).unwrap();

        {
            let mut dev = regs.device(0x77);
            assert_eq!(dev.address(), 0x77);
            dev.write_register::<u8>(0x1B, 0x00).unwrap();
            dev.write_field::<u8>(0x1B, field, 0b11).unwrap();
            dev.write_flag::<u8>(0x1B, 0, true).unwrap();
            assert_eq!(dev.read_field::<u8>(0x1B, field, None).unwrap(), 0b11);
            assert!(dev.read_flag::<u8>(0x1B, 0, None).unwrap());
            assert_eq!(dev.read_register::<u8>(0x1B, None).unwrap(), 0b0001_1001);

            dev.write_registers::<u16>(0x80, &[0x0102]).unwrap();
            let mut words = [0u16; 1];
            assert_eq!(dev.read_registers(0x80, &mut words, None).unwrap(), 1);
            assert_eq!(words, [0x0102]);

            let mut next = [0u8; 1];
            dev.read_registers::<u8>(0x80, &mut next, None).unwrap();
            dev.read_bytes_no_reg_address(&mut next, None).unwrap();
            assert_eq!(next, [0x02]);
        }

        assert_eq!(regs.release().last_address, Some(0x77));
    }
}
