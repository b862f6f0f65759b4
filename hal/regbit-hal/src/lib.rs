//! regbit Hardware Abstraction Layer
//!
//! This crate defines the bus transport that the register accessor in
//! `regbit-core` is layered on, plus adapters that implement it for
//! concrete buses. The register logic never talks to hardware directly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Device drivers (IMU, baro, FRAM, ...)  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  regbit-core (bit fields, RMW)          │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  regbit-hal (this crate - transport)    │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ HalTransport  │       │LinuxTransport │
//! │ (embedded-hal)│       │ (/dev/i2c-N)  │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Features
//!
//! - `linux` - Enable [`linux::LinuxTransport`] (pulls in `std` and `i2cdev`)
//! - `defmt` - Enable debug formatting support
//! - `serde` - Serialize/deserialize [`Timeout`] in configuration files

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]

pub mod embedded;
pub mod i2c;
#[cfg(feature = "linux")]
pub mod linux;

// Re-export key types at crate root for convenience
pub use embedded::HalTransport;
pub use i2c::{BusError, BusTransport, Timeout, TransferError};
#[cfg(feature = "linux")]
pub use linux::LinuxTransport;
