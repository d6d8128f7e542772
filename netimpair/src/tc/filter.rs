//! TC filter support (u32 filters).
//!
//! Filters classify packets and route them to a class. Every selector predicate becomes one u32
//! filter for a single IP family; the ingress redirect is a u32 catch-all with a mirred action.

use std::fmt;

use crate::{
    ip::Subnet,
    selector::{Constraint, Family, Predicate},
};

/// The protocol a filter is attached for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Every ethertype.
    All,
    Ip,
    Ipv6,
}

impl Protocol {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Ip => "ip",
            Self::Ipv6 => "ipv6",
        }
    }
}

impl From<Family> for Protocol {
    fn from(value: Family) -> Self {
        match value {
            Family::Ipv4 => Self::Ip,
            Family::Ipv6 => Self::Ipv6,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The u32 match keywords of a predicate, one `match` clause per constraint.
///
/// # Example
///
/// ```
/// use netimpair::selector::{Family, Mode, Predicate};
/// use netimpair::tc::filter::u32_matches;
///
/// let predicate = Predicate {
///     selector: "src=10.0.0.0/8,dport=22".parse().unwrap(),
///     family: Family::Ipv4,
///     mode: Mode::Include,
/// };
/// assert_eq!(
///     u32_matches(&predicate).join(" "),
///     "u32 match ip src 10.0.0.0/8 match ip dport 22 0xffff"
/// );
/// ```
pub fn u32_matches(predicate: &Predicate) -> Vec<String> {
    let family = match predicate.family {
        Family::Ipv4 => "ip",
        Family::Ipv6 => "ip6",
    };

    let mut args = vec!["u32".to_string()];
    for constraint in predicate.selector.constraints() {
        args.push("match".to_string());
        args.push(family.to_string());
        match constraint {
            Constraint::Src(subnet) | Constraint::Dst(subnet) => {
                args.push(constraint.field().to_string());
                args.push(prefixed(subnet));
            }
            Constraint::Sport(port) | Constraint::Dport(port) => {
                args.push(constraint.field().to_string());
                args.push(port.to_string());
                args.push("0xffff".to_string());
            }
        }
    }

    args
}

/// A u32 clause matching every packet.
pub fn u32_catchall() -> Vec<String> {
    ["u32", "match", "u32", "0", "0"].map(String::from).to_vec()
}

/// The mirred action moving a packet onto the egress path of `target`.
pub fn mirred_redirect(target: &str) -> Vec<String> {
    ["action", "mirred", "egress", "redirect", "dev", target].map(String::from).to_vec()
}

/// u32 wants the prefix spelled out even for host matches.
fn prefixed(subnet: &Subnet) -> String {
    format!("{}/{}", subnet.network_address, subnet.netmask)
}
