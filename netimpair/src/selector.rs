//! Traffic selectors: which packets get impaired.
//!
//! A [`Selector`] is a conjunction of constraints written as comma separated `field=value`
//! tokens, e.g. `src=10.0.0.0/8,dport=22`. Supported fields are `src` and `dst` (IP address with
//! an optional prefix length) and `sport` and `dport` (port in `0..=65535`).
//!
//! A [`SelectorSet`] holds the include list and the exclude list. Compiling it yields the ordered
//! [`Predicate`]s the plan turns into classifier filters, plus the [`Route`] taken by traffic
//! that matches none of them:
//!
//! - exclude predicates come first and route to [`Route::Passthrough`];
//! - include predicates follow and route to [`Route::Impaired`];
//! - with no include selectors, unmatched traffic is impaired (implicit match-all), otherwise it
//!   passes through.

use std::{fmt, net::IpAddr, str::FromStr};

use crate::ip::{Subnet, SubnetError};

/// A selector field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Src,
    Dst,
    Sport,
    Dport,
}

impl Field {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Src => "src",
            Self::Dst => "dst",
            Self::Sport => "sport",
            Self::Dport => "dport",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "src" => Ok(Self::Src),
            "dst" => Ok(Self::Dst),
            "sport" => Ok(Self::Sport),
            "dport" => Ok(Self::Dport),
            other => Err(SelectorError::UnknownField(other.to_string())),
        }
    }
}

/// A single `field=value` constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constraint {
    Src(Subnet),
    Dst(Subnet),
    Sport(u16),
    Dport(u16),
}

impl Constraint {
    pub const fn field(&self) -> Field {
        match self {
            Self::Src(_) => Field::Src,
            Self::Dst(_) => Field::Dst,
            Self::Sport(_) => Field::Sport,
            Self::Dport(_) => Field::Dport,
        }
    }

    /// The address family this constraint pins the selector to, if any.
    fn family(&self) -> Option<Family> {
        match self {
            Self::Src(subnet) | Self::Dst(subnet) => Some(Family::of_subnet(subnet)),
            Self::Sport(_) | Self::Dport(_) => None,
        }
    }

    fn matches(&self, packet: &Packet) -> bool {
        match self {
            Self::Src(subnet) => subnet.contains(&packet.src),
            Self::Dst(subnet) => subnet.contains(&packet.dst),
            Self::Sport(port) => packet.sport == *port,
            Self::Dport(port) => packet.dport == *port,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Src(subnet) | Self::Dst(subnet) => write!(f, "{}={subnet}", self.field()),
            Self::Sport(port) | Self::Dport(port) => write!(f, "{}={port}", self.field()),
        }
    }
}

impl FromStr for Constraint {
    type Err = SelectorError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let (field, value) =
            token.split_once('=').ok_or_else(|| SelectorError::MissingValue(token.to_string()))?;
        let field = field.trim().parse::<Field>()?;
        let value = value.trim();

        if value.is_empty() {
            return Err(SelectorError::MissingValue(token.to_string()));
        }

        let port = || value.parse::<u16>().map_err(|_| SelectorError::InvalidPort(value.to_string()));

        Ok(match field {
            Field::Src => Self::Src(value.parse()?),
            Field::Dst => Self::Dst(value.parse()?),
            Field::Sport => Self::Sport(port()?),
            Field::Dport => Self::Dport(port()?),
        })
    }
}

/// Reasons a selector fails to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    #[error("selector has no constraints")]
    Empty,
    #[error("token `{0}` is not of the form field=value")]
    MissingValue(String),
    #[error("unknown field `{0}` (expected src, dst, sport or dport)")]
    UnknownField(String),
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] SubnetError),
    #[error("`{0}` is not a port in 0..=65535")]
    InvalidPort(String),
    #[error("field `{0}` given more than once")]
    DuplicateField(Field),
    #[error("selector mixes IPv4 and IPv6 addresses")]
    MixedFamilies,
}

/// The IP family a predicate applies to. Each classifier filter matches exactly one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Ipv4,
    Ipv6,
}

impl Family {
    fn of_subnet(subnet: &Subnet) -> Self {
        if subnet.is_ipv4() {
            Self::Ipv4
        } else {
            Self::Ipv6
        }
    }

    pub const fn of(address: &IpAddr) -> Self {
        match address {
            IpAddr::V4(_) => Self::Ipv4,
            IpAddr::V6(_) => Self::Ipv6,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipv4 => f.write_str("ipv4"),
            Self::Ipv6 => f.write_str("ipv6"),
        }
    }
}

/// A conjunction of constraints. A packet matches iff every constraint matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    constraints: Vec<Constraint>,
}

impl Selector {
    /// Build a selector from constraints, enforcing the same rules as parsing.
    pub fn new(constraints: Vec<Constraint>) -> Result<Self, SelectorError> {
        if constraints.is_empty() {
            return Err(SelectorError::Empty);
        }

        let mut family = None;
        for (i, constraint) in constraints.iter().enumerate() {
            if constraints[..i].iter().any(|c| c.field() == constraint.field()) {
                return Err(SelectorError::DuplicateField(constraint.field()));
            }

            match (family, constraint.family()) {
                (Some(seen), Some(this)) if seen != this => {
                    return Err(SelectorError::MixedFamilies)
                }
                (None, this @ Some(_)) => family = this,
                _ => {}
            }
        }

        Ok(Self { constraints })
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// The families this selector yields filters for. Port-only selectors apply to both.
    pub fn families(&self) -> Vec<Family> {
        match self.constraints.iter().find_map(Constraint::family) {
            Some(family) => vec![family],
            None => vec![Family::Ipv4, Family::Ipv6],
        }
    }

    pub fn matches(&self, packet: &Packet) -> bool {
        self.constraints.iter().all(|c| c.matches(packet))
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let constraints = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .map(Constraint::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(constraints)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, constraint) in self.constraints.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{constraint}")?;
        }
        Ok(())
    }
}

/// Where a packet ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// The default, unimpaired class.
    Passthrough,
    /// The class carrying the impairment leaf.
    Impaired,
}

/// Whether a predicate came from the include or the exclude list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Include,
    Exclude,
}

impl Mode {
    pub const fn route(&self) -> Route {
        match self {
            Self::Include => Route::Impaired,
            Self::Exclude => Route::Passthrough,
        }
    }
}

/// One compiled match predicate, ready to become a classifier filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub selector: Selector,
    pub family: Family,
    pub mode: Mode,
}

impl Predicate {
    pub const fn route(&self) -> Route {
        self.mode.route()
    }

    pub fn matches(&self, packet: &Packet) -> bool {
        Family::of(&packet.src) == self.family && self.selector.matches(packet)
    }
}

/// The output of the selector compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSelectors {
    /// Predicates in evaluation order: excludes, then includes, each in the order given.
    pub predicates: Vec<Predicate>,
    /// The route of traffic that matches no predicate.
    pub fallback: Route,
}

/// The include and exclude lists of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorSet {
    include: Vec<Selector>,
    exclude: Vec<Selector>,
}

impl SelectorSet {
    /// Impair everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse include and exclude selector strings. The first malformed selector aborts parsing.
    pub fn parse<I, E>(include: I, exclude: E) -> crate::Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        fn parse_all<T: IntoIterator>(items: T) -> crate::Result<Vec<Selector>>
        where
            T::Item: AsRef<str>,
        {
            items
                .into_iter()
                .map(|input| {
                    let input = input.as_ref();
                    input.parse::<Selector>().map_err(|reason| crate::Error::MalformedSelector {
                        input: input.to_string(),
                        reason,
                    })
                })
                .collect()
        }

        Ok(Self { include: parse_all(include)?, exclude: parse_all(exclude)? })
    }

    pub fn with_include(mut self, selector: Selector) -> Self {
        self.include.push(selector);
        self
    }

    pub fn with_exclude(mut self, selector: Selector) -> Self {
        self.exclude.push(selector);
        self
    }

    pub fn include(&self) -> &[Selector] {
        &self.include
    }

    pub fn exclude(&self) -> &[Selector] {
        &self.exclude
    }

    pub fn compile(&self) -> CompiledSelectors {
        let expand = |selectors: &[Selector], mode: Mode| {
            selectors
                .iter()
                .flat_map(move |selector| {
                    selector.families().into_iter().map(move |family| Predicate {
                        selector: selector.clone(),
                        family,
                        mode,
                    })
                })
                .collect::<Vec<_>>()
        };

        let mut predicates = expand(&self.exclude, Mode::Exclude);
        predicates.extend(expand(&self.include, Mode::Include));

        let fallback = if self.include.is_empty() { Route::Impaired } else { Route::Passthrough };

        CompiledSelectors { predicates, fallback }
    }
}

/// A packet header summary, used to evaluate selectors and plans offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub src: IpAddr,
    pub dst: IpAddr,
    pub sport: u16,
    pub dport: u16,
}

impl Packet {
    pub fn new(src: IpAddr, sport: u16, dst: IpAddr, dport: u16) -> Self {
        Self { src, dst, sport, dport }
    }
}
