//! TC handle computation.
//!
//! TC handles are 32-bit values split into major:minor (16:16 bits). Only one impairment
//! configuration is active per device, so every node of the hierarchy has a fixed handle.

use std::fmt;

/// A `major:minor` traffic control handle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    pub major: u16,
    pub minor: u16,
}

impl Handle {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// The packed 32-bit representation used by the kernel.
    ///
    /// ```
    /// use netimpair::tc::handle::IMPAIRED_CLASS;
    /// assert_eq!(IMPAIRED_CLASS.as_u32(), 0x0001_0002);
    /// ```
    pub const fn as_u32(&self) -> u32 {
        (self.major as u32) << 16 | self.minor as u32
    }

    /// The qdisc this class handle belongs to (`major:0`).
    pub const fn qdisc(&self) -> Self {
        Self::new(self.major, 0)
    }
}

impl From<u32> for Handle {
    fn from(value: u32) -> Self {
        Self::new((value >> 16) as u16, (value & 0xFFFF) as u16)
    }
}

/// Formats the way `tc` expects: hexadecimal, with the minor omitted for qdisc handles.
impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.minor == 0 {
            write!(f, "{:x}:", self.major)
        } else {
            write!(f, "{:x}:{:x}", self.major, self.minor)
        }
    }
}

/// The HTB root qdisc, `1:`.
pub const ROOT: Handle = Handle::new(1, 0);

/// The passthrough (unimpaired) class, `1:1`.
pub const PASSTHROUGH_CLASS: Handle = Handle::new(1, 1);

/// The impaired class, `1:2`. The leaf qdisc hangs below it.
pub const IMPAIRED_CLASS: Handle = Handle::new(1, 2);

/// The leaf qdisc carrying the impairment parameters, `30:`.
pub const LEAF: Handle = Handle::new(0x30, 0);

/// The ingress qdisc of a physical device, `ffff:`.
pub const INGRESS: Handle = Handle::new(0xFFFF, 0);

/// Priority of the ingress redirect filter on the physical device.
pub const REDIRECT_FILTER_PRIORITY: u16 = 1;

/// Priority of the first selector filter under the root qdisc. Lower priorities are evaluated
/// first; every filter gets its own priority so evaluation order is fully determined.
pub const FIRST_FILTER_PRIORITY: u16 = 1;

/// Compute the filter priority of the `index`-th compiled predicate, or `None` if the priority
/// space is exhausted.
///
/// ```
/// use netimpair::tc::handle::filter_priority;
/// assert_eq!(filter_priority(0), Some(1));
/// assert_eq!(filter_priority(4), Some(5));
/// ```
pub fn filter_priority(index: usize) -> Option<u16> {
    u16::try_from(index).ok()?.checked_add(FIRST_FILTER_PRIORITY)
}
