//! Netem (Network Emulator) leaf support.
//!
//! Netem provides latency, jitter, packet loss, duplication and reordering. All parameters are
//! optional and combine independently; a netem with no parameters forwards traffic untouched,
//! which is what a disabled impairment switches to.

use std::time::Duration;

use super::core::{format_percent, format_time};
use crate::{Error, Result};

/// Parameters of a netem leaf. Percentages are in `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetemParams {
    /// Base delay added to every packet.
    pub delay: Option<Duration>,
    /// Random variation around `delay`.
    pub jitter: Option<Duration>,
    /// Correlation of successive jitter values.
    pub delay_correlation: Option<f64>,
    pub loss: Option<f64>,
    pub loss_correlation: Option<f64>,
    pub duplicate: Option<f64>,
    /// Share of packets sent immediately, ahead of the delayed ones. Requires `delay`.
    pub reorder: Option<f64>,
    pub reorder_correlation: Option<f64>,
}

impl NetemParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = Some(jitter);
        self
    }

    pub fn with_delay_correlation(mut self, percent: f64) -> Self {
        self.delay_correlation = Some(percent);
        self
    }

    pub fn with_loss(mut self, percent: f64) -> Self {
        self.loss = Some(percent);
        self
    }

    pub fn with_loss_correlation(mut self, percent: f64) -> Self {
        self.loss_correlation = Some(percent);
        self
    }

    pub fn with_duplicate(mut self, percent: f64) -> Self {
        self.duplicate = Some(percent);
        self
    }

    pub fn with_reorder(mut self, percent: f64) -> Self {
        self.reorder = Some(percent);
        self
    }

    pub fn with_reorder_correlation(mut self, percent: f64) -> Self {
        self.reorder_correlation = Some(percent);
        self
    }

    /// Whether this netem leaves traffic untouched.
    pub fn is_passthrough(&self) -> bool {
        *self == Self::default()
    }

    /// Check the parameters against what netem accepts.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("delay_correlation", self.delay_correlation),
            ("loss", self.loss),
            ("loss_correlation", self.loss_correlation),
            ("duplicate", self.duplicate),
            ("reorder", self.reorder),
            ("reorder_correlation", self.reorder_correlation),
        ] {
            if let Some(value) = value {
                check_percent(name, value)?;
            }
        }

        // Positional arguments: a correlation can only follow the value it correlates.
        if self.delay_correlation.is_some() && self.jitter.is_none() {
            return Err(requires("delay_correlation", "jitter"));
        }
        if self.loss_correlation.is_some() && self.loss.is_none() {
            return Err(requires("loss_correlation", "loss"));
        }
        if self.reorder_correlation.is_some() && self.reorder.is_none() {
            return Err(requires("reorder_correlation", "reorder"));
        }
        if self.reorder.is_some() && self.delay.map_or(true, |delay| delay.is_zero()) {
            return Err(requires("reorder", "a non-zero delay"));
        }

        Ok(())
    }

    /// The `tc qdisc ... netem` option arguments, in the order `tc` expects them.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.delay.is_some() || self.jitter.is_some() {
            args.push("delay".to_string());
            args.push(format_time(self.delay.unwrap_or_default()));
            if let Some(jitter) = self.jitter {
                args.push(format_time(jitter));
                if let Some(correlation) = self.delay_correlation {
                    args.push(format_percent(correlation));
                }
            }
        }

        if let Some(loss) = self.loss {
            args.push("loss".to_string());
            args.push(format_percent(loss));
            if let Some(correlation) = self.loss_correlation {
                args.push(format_percent(correlation));
            }
        }

        if let Some(duplicate) = self.duplicate {
            args.push("duplicate".to_string());
            args.push(format_percent(duplicate));
        }

        if let Some(reorder) = self.reorder {
            args.push("reorder".to_string());
            args.push(format_percent(reorder));
            if let Some(correlation) = self.reorder_correlation {
                args.push(format_percent(correlation));
            }
        }

        args
    }
}

pub(crate) fn check_percent(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidParameter { name, reason: format!("{value} is not a percentage") })
    }
}

fn requires(name: &'static str, what: &str) -> Error {
    Error::InvalidParameter { name, reason: format!("requires {what}") }
}
