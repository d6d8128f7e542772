use crate::{device::Direction, executor::OperationError, ledger::Cleanup, selector::SelectorError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed selector `{input}`: {reason}")]
    MalformedSelector {
        input: String,
        #[source]
        reason: SelectorError,
    },

    #[error("device {device} unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },

    #[error("rate limiting and netem cannot be combined")]
    UnsupportedCombination,

    #[error("invalid {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// An operation failed. The session has been torn down; `cleanup` tells whether that fully
    /// restored the devices.
    #[error("{error}; {cleanup}")]
    OperationFailed {
        #[source]
        error: OperationError,
        cleanup: Cleanup,
    },

    #[error("no active {direction} impairment on {device}")]
    NoActiveImpairment { device: String, direction: Direction },
}

pub type Result<T> = std::result::Result<T, Error>;
