//! HTB (Hierarchical Token Bucket) qdisc and class support.
//!
//! HTB is the root classifier. It correctly handles non-work-conserving children like netem:
//! when the leaf has nothing ready to dequeue, HTB moves on to the other class instead of
//! blocking the whole device. Both classes get an effectively unlimited rate, so HTB only
//! multiplexes and never shapes.

use super::{
    core::{format_rate, UNLIMITED_RATE_KBIT},
    handle::Handle,
};

/// Options of the root HTB qdisc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtbRoot {
    /// Class receiving traffic no filter classified.
    pub default_class: Handle,
}

impl HtbRoot {
    pub fn new(default_class: Handle) -> Self {
        Self { default_class }
    }

    /// `htb default <minor>`; `tc` parses the minor as hexadecimal.
    pub fn args(&self) -> Vec<String> {
        vec!["htb".to_string(), "default".to_string(), format!("{:x}", self.default_class.minor)]
    }
}

/// Options of an HTB class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtbClass {
    pub rate_kbit: u64,
    /// Class priority; lower is served first when both classes have packets.
    pub prio: u8,
}

impl HtbClass {
    pub fn new(prio: u8) -> Self {
        Self { rate_kbit: UNLIMITED_RATE_KBIT, prio }
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            "htb".to_string(),
            "rate".to_string(),
            format_rate(self.rate_kbit),
            "prio".to_string(),
            self.prio.to_string(),
        ]
    }
}
