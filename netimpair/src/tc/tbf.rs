//! Token Bucket Filter (TBF) leaf support.
//!
//! TBF limits the throughput of the impaired class. Its passthrough form keeps the qdisc in
//! place but raises the rate to [`UNLIMITED_RATE_KBIT`].

use std::time::Duration;

use super::core::{format_rate, format_time, UNLIMITED_RATE_KBIT};
use crate::{Error, Result};

/// Default bucket size in bytes.
pub const DEFAULT_BUFFER: u32 = 2_000;

/// Default time a packet may wait for tokens before being dropped.
pub const DEFAULT_LATENCY: Duration = Duration::from_millis(20);

/// Parameters of a tbf leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateParams {
    /// Rate limit in kbit/s.
    pub limit_kbit: u64,
    /// Bucket size in bytes.
    pub buffer: u32,
    pub latency: Duration,
}

impl RateParams {
    pub fn new(limit_kbit: u64) -> Self {
        Self { limit_kbit, buffer: DEFAULT_BUFFER, latency: DEFAULT_LATENCY }
    }

    /// A rate limit that never throttles.
    pub fn unlimited() -> Self {
        Self::new(UNLIMITED_RATE_KBIT)
    }

    pub fn with_buffer(mut self, buffer: u32) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit_kbit == 0 {
            return Err(Error::InvalidParameter {
                name: "limit",
                reason: "rate must be positive".to_string(),
            });
        }
        if self.buffer == 0 {
            return Err(Error::InvalidParameter {
                name: "buffer",
                reason: "buffer must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// The `tc qdisc ... tbf` option arguments.
    pub fn args(&self) -> Vec<String> {
        vec![
            "rate".to_string(),
            format_rate(self.limit_kbit),
            "buffer".to_string(),
            self.buffer.to_string(),
            "latency".to_string(),
            format_time(self.latency),
        ]
    }
}
