//! Abstract traffic control operations.
//!
//! An [`Operation`] is a single action against a single device. Every create verb has exactly one
//! inverse, which is what the teardown ledger records; deletes and leaf changes have none.

use std::fmt;

use crate::{
    selector::Predicate,
    tc::{filter::Protocol, handle::Handle, impairment::ImpairmentSpec},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Create an IFB redirect device.
    AddLink { name: String },
    DeleteLink { name: String },
    SetLinkUp { name: String },
    SetLinkDown { name: String },
    AddIngressQdisc { device: String },
    DeleteIngressQdisc { device: String },
    /// Redirect every ingress packet of `device` to the egress path of `target`.
    AddRedirectFilter { device: String, target: String, priority: u16 },
    AddRootQdisc { device: String, handle: Handle, default_class: Handle },
    DeleteRootQdisc { device: String },
    AddClass { device: String, parent: Handle, classid: Handle, prio: u8 },
    DeleteClass { device: String, parent: Handle, classid: Handle },
    AddLeafQdisc { device: String, parent: Handle, handle: Handle, spec: ImpairmentSpec },
    /// Swap the parameters of an existing leaf in place.
    ChangeLeafQdisc { device: String, parent: Handle, handle: Handle, spec: ImpairmentSpec },
    DeleteLeafQdisc { device: String, parent: Handle, handle: Handle },
    AddFilter {
        device: String,
        parent: Handle,
        priority: u16,
        predicate: Predicate,
        flowid: Handle,
    },
    DeleteFilter { device: String, parent: Handle, priority: u16, protocol: Protocol },
}

/// Coarse operation categories, used to summarize plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Link,
    LinkState,
    IngressQdisc,
    RedirectFilter,
    RootQdisc,
    Class,
    LeafQdisc,
    LeafChange,
    Filter,
}

impl Operation {
    /// The device the operation acts on.
    pub fn device(&self) -> &str {
        match self {
            Self::AddLink { name }
            | Self::DeleteLink { name }
            | Self::SetLinkUp { name }
            | Self::SetLinkDown { name } => name,
            Self::AddIngressQdisc { device }
            | Self::DeleteIngressQdisc { device }
            | Self::AddRedirectFilter { device, .. }
            | Self::AddRootQdisc { device, .. }
            | Self::DeleteRootQdisc { device }
            | Self::AddClass { device, .. }
            | Self::DeleteClass { device, .. }
            | Self::AddLeafQdisc { device, .. }
            | Self::ChangeLeafQdisc { device, .. }
            | Self::DeleteLeafQdisc { device, .. }
            | Self::AddFilter { device, .. }
            | Self::DeleteFilter { device, .. } => device,
        }
    }

    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::AddLink { .. } | Self::DeleteLink { .. } => OperationKind::Link,
            Self::SetLinkUp { .. } | Self::SetLinkDown { .. } => OperationKind::LinkState,
            Self::AddIngressQdisc { .. } | Self::DeleteIngressQdisc { .. } => {
                OperationKind::IngressQdisc
            }
            Self::AddRedirectFilter { .. } => OperationKind::RedirectFilter,
            Self::AddRootQdisc { .. } | Self::DeleteRootQdisc { .. } => OperationKind::RootQdisc,
            Self::AddClass { .. } | Self::DeleteClass { .. } => OperationKind::Class,
            Self::AddLeafQdisc { .. } | Self::DeleteLeafQdisc { .. } => OperationKind::LeafQdisc,
            Self::ChangeLeafQdisc { .. } => OperationKind::LeafChange,
            Self::AddFilter { .. } | Self::DeleteFilter { .. } => OperationKind::Filter,
        }
    }

    /// The operation undoing this one, if this is a create verb.
    pub fn inverse(&self) -> Option<Self> {
        let inverse = match self {
            Self::AddLink { name } => Self::DeleteLink { name: name.clone() },
            Self::SetLinkUp { name } => Self::SetLinkDown { name: name.clone() },
            Self::AddIngressQdisc { device } => Self::DeleteIngressQdisc { device: device.clone() },
            Self::AddRedirectFilter { device, priority, .. } => Self::DeleteFilter {
                device: device.clone(),
                parent: crate::tc::handle::INGRESS,
                priority: *priority,
                protocol: Protocol::All,
            },
            Self::AddRootQdisc { device, .. } => Self::DeleteRootQdisc { device: device.clone() },
            Self::AddClass { device, parent, classid, .. } => {
                Self::DeleteClass { device: device.clone(), parent: *parent, classid: *classid }
            }
            Self::AddLeafQdisc { device, parent, handle, .. } => {
                Self::DeleteLeafQdisc { device: device.clone(), parent: *parent, handle: *handle }
            }
            Self::AddFilter { device, parent, priority, predicate, .. } => Self::DeleteFilter {
                device: device.clone(),
                parent: *parent,
                priority: *priority,
                protocol: predicate.family.into(),
            },
            Self::DeleteLink { .. }
            | Self::SetLinkDown { .. }
            | Self::DeleteIngressQdisc { .. }
            | Self::DeleteRootQdisc { .. }
            | Self::DeleteClass { .. }
            | Self::ChangeLeafQdisc { .. }
            | Self::DeleteLeafQdisc { .. }
            | Self::DeleteFilter { .. } => return None,
        };

        Some(inverse)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddLink { name } => write!(f, "add redirect device {name}"),
            Self::DeleteLink { name } => write!(f, "delete redirect device {name}"),
            Self::SetLinkUp { name } => write!(f, "set {name} up"),
            Self::SetLinkDown { name } => write!(f, "set {name} down"),
            Self::AddIngressQdisc { device } => write!(f, "add ingress qdisc on {device}"),
            Self::DeleteIngressQdisc { device } => write!(f, "delete ingress qdisc on {device}"),
            Self::AddRedirectFilter { device, target, .. } => {
                write!(f, "redirect ingress of {device} to {target}")
            }
            Self::AddRootQdisc { device, handle, default_class } => {
                write!(f, "add root qdisc {handle} on {device} (default {default_class})")
            }
            Self::DeleteRootQdisc { device } => write!(f, "delete root qdisc on {device}"),
            Self::AddClass { device, classid, .. } => write!(f, "add class {classid} on {device}"),
            Self::DeleteClass { device, classid, .. } => {
                write!(f, "delete class {classid} on {device}")
            }
            Self::AddLeafQdisc { device, handle, spec, .. } => {
                write!(f, "add leaf {handle} on {device} ({spec})")
            }
            Self::ChangeLeafQdisc { device, handle, spec, .. } => {
                write!(f, "change leaf {handle} on {device} ({spec})")
            }
            Self::DeleteLeafQdisc { device, handle, .. } => {
                write!(f, "delete leaf {handle} on {device}")
            }
            Self::AddFilter { device, priority, predicate, flowid, .. } => write!(
                f,
                "add {} filter prio {priority} on {device} ({}) -> {flowid}",
                predicate.family, predicate.selector
            ),
            Self::DeleteFilter { device, parent, priority, .. } => {
                write!(f, "delete filter prio {priority} under {parent} on {device}")
            }
        }
    }
}
