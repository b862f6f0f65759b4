//! Register access errors

use regbit_hal::TransferError;

/// Failure of a register access operation
///
/// `E` is the error type of the underlying [`regbit_hal::BusTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The bus or device rejected the transaction (NACK, I/O error)
    Transport(E),
    /// The transaction did not complete within the timeout
    Timeout,
    /// Fewer bytes than a whole register were transferred
    ShortRead {
        /// Bytes requested
        expected: usize,
        /// Bytes actually transferred
        transferred: usize,
    },
    /// Bit field does not fit the register width
    InvalidField {
        /// Requested lowest bit
        bit_start: u8,
        /// Requested length in bits
        length: u8,
    },
    /// Block transfer exceeds the supported length
    TooLong {
        /// Requested number of units
        len: usize,
        /// Maximum number of units
        max: usize,
    },
}

impl<E> Error<E> {
    /// Check if the failure was a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }

    /// Check if the request was rejected before any bus traffic
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Error::InvalidField { .. } | Error::TooLong { .. })
    }
}

impl<E> From<TransferError<E>> for Error<E> {
    fn from(e: TransferError<E>) -> Self {
        match e {
            TransferError::Bus(e) => Error::Transport(e),
            TransferError::Timeout => Error::Timeout,
        }
    }
}
