//! I2C bus transport abstractions
//!
//! Provides the block-level transport that register access is built on.
//! A transport instance stands for one bus; the device address and register
//! address are supplied per transaction.

use embedded_hal::i2c::ErrorKind;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Read timeout in milliseconds
///
/// `Timeout::DISABLED` (zero) means the transport waits indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct Timeout(pub u16);

impl Timeout {
    /// No timeout enforcement
    pub const DISABLED: Self = Self(0);

    /// Create a timeout from milliseconds
    pub const fn from_millis(ms: u16) -> Self {
        Self(ms)
    }

    /// Timeout in milliseconds (0 when disabled)
    pub const fn as_millis(self) -> u16 {
        self.0
    }

    /// Check if timeout enforcement is disabled
    pub const fn is_disabled(self) -> bool {
        self.0 == 0
    }
}

/// Failure of a single bus transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferError<E> {
    /// The bus or device rejected the transaction
    Bus(E),
    /// The transaction did not complete within the timeout
    Timeout,
}

impl<E: embedded_hal::i2c::Error> TransferError<E> {
    /// Classify the failure independently of the bus implementation
    pub fn classify(&self) -> BusError {
        match self {
            TransferError::Bus(e) => BusError::from(e.kind()),
            TransferError::Timeout => BusError::Timeout,
        }
    }
}

/// Bus-independent classification of I2C failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// Bus error
    Bus,
    /// Arbitration lost
    ArbitrationLost,
    /// NACK received
    Nack,
    /// Timeout
    Timeout,
    /// Overrun
    Overrun,
    /// Other error
    Other,
}

impl From<ErrorKind> for BusError {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Bus => BusError::Bus,
            ErrorKind::ArbitrationLoss => BusError::ArbitrationLost,
            ErrorKind::NoAcknowledge(_) => BusError::Nack,
            ErrorKind::Overrun => BusError::Overrun,
            _ => BusError::Other,
        }
    }
}

/// Block-level I2C transport
///
/// Implementations perform raw block transfers; they know nothing about
/// register widths or bit fields. Every call is an independent transaction
/// and no retries are performed.
pub trait BusTransport {
    /// Error type for failed transactions
    type Error;

    /// Read a block of bytes from a device
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `register` - Register to read from, or `None` to read from the
    ///   device's current internal pointer (auto-increment devices such as FRAM)
    /// * `buf` - Buffer to read into
    /// * `timeout` - Read timeout (`Timeout::DISABLED` waits indefinitely)
    ///
    /// # Returns
    /// The number of bytes actually transferred.
    fn read_block(
        &mut self,
        address: u8,
        register: Option<u8>,
        buf: &mut [u8],
        timeout: Timeout,
    ) -> Result<usize, TransferError<Self::Error>>;

    /// Write a block of bytes to a device register
    ///
    /// The register address is sent first, followed by `data` in the same
    /// transaction.
    ///
    /// # Arguments
    /// * `address` - 7-bit I2C address
    /// * `register` - First register to write
    /// * `data` - Bytes to write
    fn write_block(
        &mut self,
        address: u8,
        register: u8,
        data: &[u8],
    ) -> Result<(), TransferError<Self::Error>>;
}

impl<T: BusTransport + ?Sized> BusTransport for &mut T {
    type Error = T::Error;

    fn read_block(
        &mut self,
        address: u8,
        register: Option<u8>,
        buf: &mut [u8],
        timeout: Timeout,
    ) -> Result<usize, TransferError<Self::Error>> {
        (**self).read_block(address, register, buf, timeout)
    }

    fn write_block(
        &mut self,
        address: u8,
        register: u8,
        data: &[u8],
    ) -> Result<(), TransferError<Self::Error>> {
        (**self).write_block(address, register, data)
    }
}
