//! Linux userspace I2C transport
//!
//! Talks to devices through the kernel's `/dev/i2c-N` character devices.
//! The device node is opened for every transaction and closed again when
//! the transaction completes; no file handles are cached between calls.
//!
//! The i2c-dev interface has no per-read timeout, so the `timeout` argument
//! is ignored and the kernel adapter's own timeout applies.

use std::path::{Path, PathBuf};

use i2cdev::core::I2CDevice;
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError};

use crate::i2c::{BusTransport, Timeout, TransferError};

/// I2C bus 0 on Raspberry Pi boards
pub const RPI_I2C_0: &str = "/dev/i2c-0";

/// I2C bus 1 on Raspberry Pi boards (the header pins)
pub const RPI_I2C_1: &str = "/dev/i2c-1";

/// [`BusTransport`] over a `/dev/i2c-N` device node
#[derive(Debug, Clone)]
pub struct LinuxTransport {
    path: PathBuf,
}

impl LinuxTransport {
    /// Create a transport for the bus at `path` (e.g. [`RPI_I2C_1`])
    ///
    /// The node is not opened until the first transaction.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the bus device node
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self, address: u8) -> Result<LinuxI2CDevice, TransferError<LinuxI2CError>> {
        LinuxI2CDevice::new(&self.path, u16::from(address)).map_err(TransferError::Bus)
    }
}

impl BusTransport for LinuxTransport {
    type Error = LinuxI2CError;

    fn read_block(
        &mut self,
        address: u8,
        register: Option<u8>,
        buf: &mut [u8],
        _timeout: Timeout,
    ) -> Result<usize, TransferError<Self::Error>> {
        let mut dev = self.open(address)?;
        if let Some(reg) = register {
            dev.write(&[reg]).map_err(TransferError::Bus)?;
        }
        dev.read(buf).map_err(TransferError::Bus)?;
        Ok(buf.len())
    }

    fn write_block(
        &mut self,
        address: u8,
        register: u8,
        data: &[u8],
    ) -> Result<(), TransferError<Self::Error>> {
        let mut dev = self.open(address)?;

        // Register pointer and payload must go out in a single write()
        let mut frame = Vec::with_capacity(data.len() + 1);
        frame.push(register);
        frame.extend_from_slice(data);

        dev.write(&frame).map_err(TransferError::Bus)
    }
}
