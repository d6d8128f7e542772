//! # Traffic Control Utilities
//!
//! This module describes the traffic control (tc) hierarchy an impairment plan builds and
//! renders its nodes into `tc` arguments.
//!
//! ## Architecture Overview
//!
//! Every impaired device carries the same two-class hierarchy. Classification happens at the
//! root; only one class has an impairment leaf below it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                        HTB Root Qdisc (1:)                                  │
//! │                                                                             │
//! │   u32 filters classify packets, one priority per filter: exclude filters    │
//! │   first, include filters after. Unclassified packets go to the default      │
//! │   class: 1:2 when no include selector is given, 1:1 otherwise.              │
//! └─────────────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                    ┌───────────────┴───────────────┐
//!                    │                               │
//!                    ▼                               ▼
//!         ┌──────────────────┐            ┌──────────────────┐
//!         │  Class 1:1       │            │  Class 1:2       │
//!         │  prio 0          │            │  prio 1          │
//!         │                  │            │                  │
//!         │  Passthrough     │            │  Impaired path   │
//!         └──────────────────┘            └──────────────────┘
//!                                                  │
//!                                                  ▼
//!                                         ┌──────────────────┐
//!                                         │  Leaf (30:)      │
//!                                         │                  │
//!                                         │  netem: delay,   │
//!                                         │  loss, ...       │
//!                                         │  or tbf: rate    │
//!                                         └──────────────────┘
//! ```
//!
//! ## Inbound Traffic
//!
//! Qdiscs only shape egress. Inbound impairments are installed on an IFB device instead; the
//! physical device gets an ingress qdisc (`ffff:`) with a catch-all filter whose mirred action
//! redirects every packet to the IFB's egress path, where the hierarchy above applies.
//!
//! ```text
//! eth0 ingress ──► ffff: ──mirred──► ifb-eth0 egress ──► 1: ──► 1:1 / 1:2 ──► 30:
//! ```
//!
//! ## Handle Numbering Scheme
//!
//! | Component        | Handle   |
//! |------------------|----------|
//! | HTB root         | `1:`     |
//! | Passthrough      | `1:1`    |
//! | Impaired class   | `1:2`    |
//! | Leaf qdisc       | `30:`    |
//! | Ingress qdisc    | `ffff:`  |

pub mod core;
pub mod filter;
pub mod handle;
pub mod htb;
pub mod impairment;
pub mod netem;
pub mod requests;
pub mod tbf;
