//! Device topology: which device an impairment attaches to.
//!
//! Outbound impairments attach to the physical device itself. Inbound impairments attach to a
//! redirect (IFB) device whose egress path receives every ingress packet of the physical device.
//! The redirect is created lazily on the first inbound request and reused afterwards.

use std::{fmt, hash::Hasher, io};

use nix::{ifaddrs::getifaddrs, net::if_::InterfaceFlags};
use rustc_hash::{FxHashMap, FxHasher};

use crate::{
    executor::{Executor, Facility},
    ledger::{Cleanup, Ledger, Scope},
    operation::Operation,
    tc::handle::REDIRECT_FILTER_PRIORITY,
    Error, Result,
};

/// Maximum length of an interface name (`IFNAMSIZ - 1`).
pub const MAX_NAME_LEN: usize = 15;

const REDIRECT_PREFIX: &str = "ifb-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Outbound,
    Inbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outbound => f.write_str("outbound"),
            Self::Inbound => f.write_str("inbound"),
        }
    }
}

/// A resolved attachment point.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Device {
    /// The device the hierarchy is installed on.
    pub name: String,
    /// The interface the caller named.
    pub physical: String,
    pub direction: Direction,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Outbound => write!(f, "{} ({})", self.name, self.direction),
            Direction::Inbound => {
                write!(f, "{} ({} of {})", self.name, self.direction, self.physical)
            }
        }
    }
}

/// The name of the redirect device paired with `physical`.
///
/// Names that would not fit in [`MAX_NAME_LEN`] keep a short prefix of the physical name followed
/// by a hash of all of it, so distinct devices never share a redirect device.
///
/// ```
/// use netimpair::device::{redirect_name, MAX_NAME_LEN};
///
/// assert_eq!(redirect_name("eth0"), "ifb-eth0");
///
/// let long = redirect_name("enx00e04c680001");
/// assert_eq!(long.len(), MAX_NAME_LEN);
/// assert!(long.starts_with("ifb-enx"));
/// assert_ne!(long, redirect_name("enx00e04c680002"));
/// ```
pub fn redirect_name(physical: &str) -> String {
    let name = format!("{REDIRECT_PREFIX}{physical}");
    if name.len() <= MAX_NAME_LEN {
        return name;
    }

    let mut hasher = FxHasher::default();
    hasher.write(physical.as_bytes());
    let hash = hasher.finish();
    let suffix = format!("{:08x}", (hash ^ (hash >> 32)) as u32);

    let mut end = MAX_NAME_LEN - REDIRECT_PREFIX.len() - suffix.len();
    while !physical.is_char_boundary(end) {
        end -= 1;
    }
    format!("{REDIRECT_PREFIX}{}{suffix}", &physical[..end])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Up,
    Down,
    Missing,
}

/// Reports the administrative state of network interfaces.
pub trait LinkProbe {
    /// The state of `name`. An error means the state could not be determined at all.
    fn link_state(&self, name: &str) -> io::Result<LinkState>;
}

/// [`LinkProbe`] backed by `getifaddrs(3)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysLinks;

impl LinkProbe for SysLinks {
    fn link_state(&self, name: &str) -> io::Result<LinkState> {
        let addrs = getifaddrs().map_err(|errno| {
            tracing::warn!(%errno, "getifaddrs failed");
            io::Error::from(errno)
        })?;

        let mut state = LinkState::Missing;
        for addr in addrs.filter(|addr| addr.interface_name == name) {
            if addr.flags.contains(InterfaceFlags::IFF_UP) {
                return Ok(LinkState::Up);
            }
            state = LinkState::Down;
        }
        Ok(state)
    }
}

/// Tracks redirect bindings and resolves `(device, direction)` pairs.
#[derive(Debug)]
pub struct Topology<L> {
    probe: L,
    /// Physical device name to redirect device name.
    redirects: FxHashMap<String, String>,
}

impl<L: LinkProbe> Topology<L> {
    pub fn new(probe: L) -> Self {
        Self { probe, redirects: FxHashMap::default() }
    }

    /// Fail unless `physical` exists and is administratively up.
    pub fn check(&self, physical: &str) -> Result<()> {
        let reason = match self.probe.link_state(physical) {
            Ok(LinkState::Up) => return Ok(()),
            Ok(LinkState::Down) => "device is down".to_string(),
            Ok(LinkState::Missing) => "no such device".to_string(),
            Err(error) => format!("cannot query interfaces: {error}"),
        };

        Err(Error::DeviceUnavailable { device: physical.to_string(), reason })
    }

    /// The device an impairment for `(physical, direction)` attaches to, without creating it.
    pub fn target(&self, physical: &str, direction: Direction) -> Device {
        let name = match direction {
            Direction::Outbound => physical.to_string(),
            Direction::Inbound => redirect_name(physical),
        };
        Device { name, physical: physical.to_string(), direction }
    }

    pub fn redirect_of(&self, physical: &str) -> Option<&str> {
        self.redirects.get(physical).map(String::as_str)
    }

    /// Resolve `(physical, direction)`, binding a redirect device on the first inbound request.
    ///
    /// Each binding step is recorded in `ledger` as soon as it succeeds. With `purge`, leftovers
    /// of an earlier run are removed first; those removals are never recorded and their failures
    /// are ignored.
    ///
    /// A failed binding step yields [`Error::OperationFailed`] with [`Cleanup::NotAttempted`];
    /// unwinding the recorded steps is up to the caller.
    pub fn resolve<F: Facility>(
        &mut self,
        physical: &str,
        direction: Direction,
        executor: &mut Executor<F>,
        ledger: &mut Ledger,
        purge: bool,
    ) -> Result<Device> {
        self.check(physical)?;

        let device = self.target(physical, direction);
        if direction == Direction::Outbound || self.redirects.contains_key(physical) {
            return Ok(device);
        }

        let redirect = device.name.clone();
        tracing::info!(%physical, %redirect, "binding redirect device");

        if purge {
            executor.attempt(&Operation::DeleteIngressQdisc { device: physical.to_string() });
            executor.attempt(&Operation::DeleteLink { name: redirect.clone() });
        }

        let steps = [
            Operation::AddLink { name: redirect.clone() },
            Operation::SetLinkUp { name: redirect.clone() },
            Operation::AddIngressQdisc { device: physical.to_string() },
            Operation::AddRedirectFilter {
                device: physical.to_string(),
                target: redirect.clone(),
                priority: REDIRECT_FILTER_PRIORITY,
            },
        ];

        executor
            .execute(steps, &Scope::Redirect(physical.to_string()), ledger)
            .map_err(|error| Error::OperationFailed { error, cleanup: Cleanup::NotAttempted })?;

        self.redirects.insert(physical.to_string(), redirect);
        Ok(device)
    }

    /// Forget every binding. Called once their ledger records have been replayed.
    pub fn reset(&mut self) {
        self.redirects.clear();
    }
}
