#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

//! Network impairment plans for Linux traffic control.
//!
//! Turns an impairment intent (netem delay, loss, duplication and reordering, or a tbf rate
//! limit), optionally restricted by include and exclude [selectors](selector), into an ordered
//! [plan](plan::Plan) of traffic control operations, runs it, and tears it down again.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use netimpair::{
//!     executor::CommandFacility,
//!     selector::SelectorSet,
//!     session::{InstallRequest, Session},
//!     tc::netem::NetemParams,
//! };
//!
//! # fn main() -> netimpair::Result<()> {
//! let mut session = Session::new(CommandFacility::new());
//!
//! let netem = NetemParams::new().with_delay(Duration::from_millis(100)).with_loss(5.0);
//! let selectors = SelectorSet::parse(Vec::<&str>::new(), ["dport=22"])?;
//! session.install(&InstallRequest::new("eth0", netem).with_selectors(selectors))?;
//!
//! // ...
//!
//! session.teardown();
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod device;
mod error;
pub mod executor;
pub mod ip;
pub mod ledger;
pub mod operation;
pub mod plan;
pub mod schedule;
pub mod selector;
pub mod session;
pub mod tc;

pub use error::{Error, Result};
