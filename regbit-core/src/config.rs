//! Access configuration
//!
//! Settings consulted by the register accessor when a call does not supply
//! its own value. There is no process-wide state: each accessor owns a copy.

use regbit_hal::Timeout;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Read timeout used when a call passes `None`
pub const DEFAULT_READ_TIMEOUT: Timeout = Timeout::from_millis(1000);

/// Register accessor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AccessConfig {
    /// Read timeout for calls that omit one (`Timeout::DISABLED` waits forever)
    pub default_timeout: Timeout,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl AccessConfig {
    /// Never time out reads
    pub const NO_TIMEOUT: Self = Self {
        default_timeout: Timeout::DISABLED,
    };

    /// Configuration with the given default read timeout
    pub const fn with_timeout(default_timeout: Timeout) -> Self {
        Self { default_timeout }
    }

    /// Pick the per-call timeout, falling back to the default
    pub fn resolve_timeout(&self, timeout: Option<Timeout>) -> Timeout {
        timeout.unwrap_or(self.default_timeout)
    }
}
