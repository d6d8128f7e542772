//! Utilities and extension traits for dealing with IP addresses.

use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    str::FromStr,
};

pub trait IpAddrExt {
    /// Returns the bits of the IP address, padding with zeros in case of an IPv4 address.
    fn to_bits(&self) -> u128;
    /// The maximum prefix length for the address family (32 or 128).
    fn max_prefix(&self) -> u8;
}

impl IpAddrExt for IpAddr {
    fn to_bits(&self) -> u128 {
        match self {
            Self::V4(v4) => u32::from(*v4).into(),
            Self::V6(v6) => u128::from(*v6),
        }
    }

    fn max_prefix(&self) -> u8 {
        match self {
            Self::V4(_) => 32,
            Self::V6(_) => 128,
        }
    }
}

/// Compute an IPv4 netmask from a prefix length.
pub fn ipv4_mask(prefix_len: u8) -> Ipv4Addr {
    if prefix_len == 0 {
        return Ipv4Addr::new(0, 0, 0, 0);
    }
    let mask_u32 = u32::MAX << (32 - prefix_len.min(32));
    Ipv4Addr::from(mask_u32)
}

/// Compute an IPv6 netmask from a prefix length.
pub fn ipv6_mask(prefix_len: u8) -> Ipv6Addr {
    if prefix_len == 0 {
        return Ipv6Addr::from(0u128);
    }
    let mask_u128 = u128::MAX << (128 - prefix_len.min(128));
    Ipv6Addr::from(mask_u128)
}

/// A subnet, composed of a base IP address and a netmask.
///
/// Parsed from `addr` (a host match, full-length prefix) or `addr/prefix`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subnet {
    pub network_address: IpAddr,
    pub netmask: u8,
}

impl Subnet {
    pub fn new(address: IpAddr, mask: u8) -> Self {
        Self { network_address: address, netmask: mask }
    }

    /// A subnet matching exactly one address.
    pub fn host(address: IpAddr) -> Self {
        Self::new(address, address.max_prefix())
    }

    pub const fn is_ipv4(&self) -> bool {
        self.network_address.is_ipv4()
    }

    /// Whether `address` falls within this subnet. Addresses of the other family never match.
    pub fn contains(&self, address: &IpAddr) -> bool {
        if self.network_address.is_ipv4() != address.is_ipv4() {
            return false;
        }

        let mask = match self.network_address {
            IpAddr::V4(_) => u128::from(u32::from(ipv4_mask(self.netmask))),
            IpAddr::V6(_) => u128::from(ipv6_mask(self.netmask)),
        };

        self.network_address.to_bits() & mask == address.to_bits() & mask
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubnetError {
    #[error("`{0}` is not an IP address")]
    Address(String),
    #[error("`{0}` is not a valid prefix length")]
    Prefix(String),
}

impl FromStr for Subnet {
    type Err = SubnetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, prefix) = match s.split_once('/') {
            Some((address, prefix)) => (address, Some(prefix)),
            None => (s, None),
        };

        let address =
            IpAddr::from_str(address).map_err(|_| SubnetError::Address(address.to_string()))?;

        let Some(prefix) = prefix else {
            return Ok(Self::host(address));
        };

        match prefix.parse::<u8>() {
            Ok(netmask) if netmask <= address.max_prefix() => Ok(Self::new(address, netmask)),
            _ => Err(SubnetError::Prefix(prefix.to_string())),
        }
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.netmask == self.network_address.max_prefix() {
            write!(f, "{}", self.network_address)
        } else {
            write!(f, "{}/{}", self.network_address, self.netmask)
        }
    }
}
