//! Helpers to render [`Operation`]s into `tc` and `ip` invocations.
//!
//! Each operation maps to exactly one invocation, so a failed command always identifies the
//! operation that failed.

use crate::{command::Invocation, operation::Operation};

use super::{
    filter::{mirred_redirect, u32_catchall, u32_matches, Protocol},
    handle::INGRESS,
    htb::{HtbClass, HtbRoot},
};

const TC: &str = "tc";
const IP: &str = "ip";

/// Build the invocation carrying out `operation`.
pub fn build(operation: &Operation) -> Invocation {
    match operation {
        Operation::AddLink { name } => {
            Invocation::new(IP).args(["link", "add", "name", name.as_str(), "type", "ifb"])
        }
        Operation::DeleteLink { name } => {
            Invocation::new(IP).args(["link", "del", "dev", name.as_str()])
        }
        Operation::SetLinkUp { name } => {
            Invocation::new(IP).args(["link", "set", "dev", name.as_str(), "up"])
        }
        Operation::SetLinkDown { name } => {
            Invocation::new(IP).args(["link", "set", "dev", name.as_str(), "down"])
        }
        Operation::AddIngressQdisc { device } => Invocation::new(TC)
            .args(["qdisc", "add", "dev", device.as_str()])
            .args(["handle".to_string(), INGRESS.to_string(), "ingress".to_string()]),
        Operation::DeleteIngressQdisc { device } => {
            Invocation::new(TC).args(["qdisc", "del", "dev", device.as_str(), "ingress"])
        }
        Operation::AddRedirectFilter { device, target, priority } => Invocation::new(TC)
            .args(["filter", "add", "dev", device.as_str()])
            .args(["parent".to_string(), INGRESS.to_string()])
            .args(["protocol", Protocol::All.as_str()])
            .args(["prio".to_string(), priority.to_string()])
            .args(u32_catchall())
            .args(mirred_redirect(target)),
        Operation::AddRootQdisc { device, handle, default_class } => Invocation::new(TC)
            .args(["qdisc", "add", "dev", device.as_str(), "root"])
            .args(["handle".to_string(), handle.to_string()])
            .args(HtbRoot::new(*default_class).args()),
        Operation::DeleteRootQdisc { device } => {
            Invocation::new(TC).args(["qdisc", "del", "dev", device.as_str(), "root"])
        }
        Operation::AddClass { device, parent, classid, prio } => Invocation::new(TC)
            .args(["class", "add", "dev", device.as_str()])
            .args(["parent".to_string(), parent.to_string()])
            .args(["classid".to_string(), classid.to_string()])
            .args(HtbClass::new(*prio).args()),
        Operation::DeleteClass { device, parent, classid } => Invocation::new(TC)
            .args(["class", "del", "dev", device.as_str()])
            .args(["parent".to_string(), parent.to_string()])
            .args(["classid".to_string(), classid.to_string()]),
        Operation::AddLeafQdisc { device, parent, handle, spec } => Invocation::new(TC)
            .args(["qdisc", "add", "dev", device.as_str()])
            .args(["parent".to_string(), parent.to_string()])
            .args(["handle".to_string(), handle.to_string()])
            .args(spec.args()),
        Operation::ChangeLeafQdisc { device, parent, handle, spec } => Invocation::new(TC)
            .args(["qdisc", "change", "dev", device.as_str()])
            .args(["parent".to_string(), parent.to_string()])
            .args(["handle".to_string(), handle.to_string()])
            .args(spec.args()),
        Operation::DeleteLeafQdisc { device, parent, handle } => Invocation::new(TC)
            .args(["qdisc", "del", "dev", device.as_str()])
            .args(["parent".to_string(), parent.to_string()])
            .args(["handle".to_string(), handle.to_string()]),
        Operation::AddFilter { device, parent, priority, predicate, flowid } => {
            let protocol = Protocol::from(predicate.family);
            Invocation::new(TC)
                .args(["filter", "add", "dev", device.as_str()])
                .args(["protocol", protocol.as_str()])
                .args(["parent".to_string(), parent.to_string()])
                .args(["prio".to_string(), priority.to_string()])
                .args(u32_matches(predicate))
                .args(["flowid".to_string(), flowid.to_string()])
        }
        Operation::DeleteFilter { device, parent, priority, protocol } => Invocation::new(TC)
            .args(["filter", "del", "dev", device.as_str()])
            .args(["parent".to_string(), parent.to_string()])
            .args(["protocol", protocol.as_str()])
            .args(["prio".to_string(), priority.to_string()]),
    }
}
