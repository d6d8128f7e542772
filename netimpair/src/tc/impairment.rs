//! Impairment intents and the leaf they compile to.

use std::fmt;

use super::{core::UNLIMITED_RATE_KBIT, netem::NetemParams, tbf::RateParams};
use crate::{Error, Result};

/// The parameters of the single leaf discipline of a plan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImpairmentSpec {
    Netem(NetemParams),
    Rate(RateParams),
}

impl ImpairmentSpec {
    /// The `tc` qdisc kind of the leaf.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Netem(_) => "netem",
            Self::Rate(_) => "tbf",
        }
    }

    /// The same leaf kind, configured to forward traffic unimpaired.
    pub fn passthrough(&self) -> Self {
        match self {
            Self::Netem(_) => Self::Netem(NetemParams::default()),
            Self::Rate(params) => {
                Self::Rate(RateParams { limit_kbit: UNLIMITED_RATE_KBIT, ..*params })
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Netem(params) => params.validate(),
            Self::Rate(params) => params.validate(),
        }
    }

    /// The qdisc kind followed by its option arguments.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![self.kind().to_string()];
        match self {
            Self::Netem(params) => args.extend(params.args()),
            Self::Rate(params) => args.extend(params.args()),
        }
        args
    }
}

impl fmt::Display for ImpairmentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.args().join(" "))
    }
}

impl From<NetemParams> for ImpairmentSpec {
    fn from(value: NetemParams) -> Self {
        Self::Netem(value)
    }
}

impl From<RateParams> for ImpairmentSpec {
    fn from(value: RateParams) -> Self {
        Self::Rate(value)
    }
}

/// What the caller asked for. Netem and rate limiting are mutually exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImpairmentRequest {
    pub netem: Option<NetemParams>,
    pub rate: Option<RateParams>,
}

impl ImpairmentRequest {
    pub fn netem(params: NetemParams) -> Self {
        Self { netem: Some(params), rate: None }
    }

    pub fn rate(params: RateParams) -> Self {
        Self { netem: None, rate: Some(params) }
    }

    pub fn with_netem(mut self, params: NetemParams) -> Self {
        self.netem = Some(params);
        self
    }

    pub fn with_rate(mut self, params: RateParams) -> Self {
        self.rate = Some(params);
        self
    }

    /// Resolve the request into exactly one validated leaf.
    pub fn to_spec(&self) -> Result<ImpairmentSpec> {
        let spec = match (self.netem, self.rate) {
            (Some(_), Some(_)) => return Err(Error::UnsupportedCombination),
            (None, None) => {
                return Err(Error::InvalidParameter {
                    name: "impairment",
                    reason: "either netem or rate parameters are required".to_string(),
                })
            }
            (Some(netem), None) => ImpairmentSpec::Netem(netem),
            (None, Some(rate)) => ImpairmentSpec::Rate(rate),
        };

        spec.validate()?;
        Ok(spec)
    }
}

impl From<NetemParams> for ImpairmentRequest {
    fn from(value: NetemParams) -> Self {
        Self::netem(value)
    }
}

impl From<RateParams> for ImpairmentRequest {
    fn from(value: RateParams) -> Self {
        Self::rate(value)
    }
}

impl From<ImpairmentSpec> for ImpairmentRequest {
    fn from(value: ImpairmentSpec) -> Self {
        match value {
            ImpairmentSpec::Netem(params) => Self::netem(params),
            ImpairmentSpec::Rate(params) => Self::rate(params),
        }
    }
}
