//! The plan compiler.
//!
//! A [`Plan`] is the ordered list of operations installing one impairment on one device: the HTB
//! root, its two classes, the leaf under the impaired class, then one filter per selector
//! predicate. Plans are built once and executed immediately.

use crate::{
    device::Device,
    operation::{Operation, OperationKind},
    selector::{CompiledSelectors, Packet, Route},
    tc::{
        handle::{filter_priority, Handle, IMPAIRED_CLASS, LEAF, PASSTHROUGH_CLASS, ROOT},
        impairment::{ImpairmentRequest, ImpairmentSpec},
    },
    Error, Result,
};

/// HTB class priority of the passthrough class.
const PASSTHROUGH_PRIO: u8 = 0;
/// HTB class priority of the impaired class.
const IMPAIRED_PRIO: u8 = 1;

/// The class a route ends up in.
pub const fn class_of(route: Route) -> Handle {
    match route {
        Route::Passthrough => PASSTHROUGH_CLASS,
        Route::Impaired => IMPAIRED_CLASS,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    device: Device,
    spec: ImpairmentSpec,
    default_class: Handle,
    operations: Vec<Operation>,
}

impl Plan {
    /// Compile a plan for `device`. Fails without producing any operation when the request is
    /// invalid or combines netem with rate limiting.
    pub fn compile(
        device: &Device,
        selectors: &CompiledSelectors,
        request: &ImpairmentRequest,
    ) -> Result<Self> {
        let spec = request.to_spec()?;
        let default_class = class_of(selectors.fallback);
        let name = &device.name;

        let mut operations = vec![
            Operation::AddRootQdisc { device: name.clone(), handle: ROOT, default_class },
            Operation::AddClass {
                device: name.clone(),
                parent: ROOT,
                classid: PASSTHROUGH_CLASS,
                prio: PASSTHROUGH_PRIO,
            },
            Operation::AddClass {
                device: name.clone(),
                parent: ROOT,
                classid: IMPAIRED_CLASS,
                prio: IMPAIRED_PRIO,
            },
            Operation::AddLeafQdisc {
                device: name.clone(),
                parent: IMPAIRED_CLASS,
                handle: LEAF,
                spec,
            },
        ];

        for (index, predicate) in selectors.predicates.iter().enumerate() {
            let priority = filter_priority(index).ok_or_else(|| Error::InvalidParameter {
                name: "selectors",
                reason: format!("{} filters exceed the priority range", selectors.predicates.len()),
            })?;

            operations.push(Operation::AddFilter {
                device: name.clone(),
                parent: ROOT,
                priority,
                predicate: predicate.clone(),
                flowid: class_of(predicate.route()),
            });
        }

        Ok(Self { device: device.clone(), spec, default_class, operations })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// The parameters of the plan's single leaf.
    pub fn spec(&self) -> &ImpairmentSpec {
        &self.spec
    }

    pub fn default_class(&self) -> Handle {
        self.default_class
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn into_operations(self) -> Vec<Operation> {
        self.operations
    }

    /// Number of operations of the given kind.
    pub fn count(&self, kind: OperationKind) -> usize {
        self.operations.iter().filter(|op| op.kind() == kind).count()
    }

    /// The class `packet` would land in: the first matching filter in priority order, or the
    /// default class.
    pub fn classify(&self, packet: &Packet) -> Handle {
        let mut filters: Vec<_> = self
            .operations
            .iter()
            .filter_map(|op| match op {
                Operation::AddFilter { priority, predicate, flowid, .. } => {
                    Some((*priority, predicate, *flowid))
                }
                _ => None,
            })
            .collect();
        filters.sort_by_key(|(priority, ..)| *priority);

        filters
            .into_iter()
            .find(|(_, predicate, _)| predicate.matches(packet))
            .map_or(self.default_class, |(.., flowid)| flowid)
    }
}
