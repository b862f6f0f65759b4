//! `embedded-hal` transport adapter
//!
//! Wraps any blocking [`embedded_hal::i2c::I2c`] bus so register access can
//! run on every chip HAL that implements the `embedded-hal` 1.0 traits.
//!
//! Blocking `embedded-hal` has no notion of a per-transfer timeout; the bus
//! implementation's own timeout (if any) applies and the `timeout` argument
//! is ignored.

use embedded_hal::i2c::{I2c, Operation};

use crate::i2c::{BusTransport, Timeout, TransferError};

/// [`BusTransport`] over an `embedded-hal` I2C bus
pub struct HalTransport<I2C> {
    i2c: I2C,
}

impl<I2C: I2c> HalTransport<I2C> {
    /// Wrap an I2C bus
    pub fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    /// Consume this adapter and return the underlying bus
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C: I2c> BusTransport for HalTransport<I2C> {
    type Error = I2C::Error;

    fn read_block(
        &mut self,
        address: u8,
        register: Option<u8>,
        buf: &mut [u8],
        _timeout: Timeout,
    ) -> Result<usize, TransferError<Self::Error>> {
        match register {
            // Repeated start between the register pointer and the data
            Some(reg) => self.i2c.write_read(address, &[reg], buf),
            None => self.i2c.read(address, buf),
        }
        .map_err(TransferError::Bus)?;

        Ok(buf.len())
    }

    fn write_block(
        &mut self,
        address: u8,
        register: u8,
        data: &[u8],
    ) -> Result<(), TransferError<Self::Error>> {
        // Adjacent writes are merged into one transfer without a restart
        self.i2c
            .transaction(
                address,
                &mut [Operation::Write(&[register]), Operation::Write(data)],
            )
            .map_err(TransferError::Bus)
    }
}
