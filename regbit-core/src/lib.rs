//! Register access for I2C peripherals
//!
//! This crate lets device drivers read and write single bits, bit fields,
//! bytes and words of 8-bit or 16-bit device registers without
//! re-implementing masking, shifting and bus transactions per driver:
//!
//! - Bit-field codec (pure mask/shift math, no I/O)
//! - Register accessor (read-modify-write on top of a [`BusTransport`])
//! - Access configuration (default read timeout)
//! - Error type shared by all operations
//!
//! # Example
//!
//! ```ignore
//! use regbit_core::{AccessConfig, RegisterAccessor};
//! use regbit_hal::LinuxTransport;
//!
//! let mut regs = RegisterAccessor::new(LinuxTransport::new("/dev/i2c-1"));
//!
//! // MPU-6050 PWR_MGMT_1: clear SLEEP (bit 6), select PLL clock (bits 0-2)
//! regs.write_bit(0x68, 0x6B, 6, false)?;
//! regs.write_bits(0x68, 0x6B, 0, 3, 0x01)?;
//! let clock = regs.read_bits(0x68, 0x6B, 0, 3, None)?;
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod accessor;
pub mod codec;
pub mod config;
pub mod error;

pub use accessor::{Device, RegisterAccessor, MAX_READ_UNITS};
pub use codec::{
    extract_bit, extract_field, field_mask, inject_bit, inject_field, FieldSpec, RegisterWord,
};
pub use config::{AccessConfig, DEFAULT_READ_TIMEOUT};
pub use error::Error;

pub use regbit_hal::{BusTransport, Timeout, TransferError};
