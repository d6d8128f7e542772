//! The teardown ledger: an undo log of inverse operations.
//!
//! Every successful create operation appends its inverse, in creation order. Teardown drains the
//! ledger and replays the records in strict reverse order, so each record is consumed exactly
//! once and a second teardown finds nothing to do.

use std::fmt;

use crate::{executor::ExecutionError, operation::Operation};

/// What a record was created for. Scoping lets a replaced plan be torn down without touching the
/// redirect binding it was installed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// The redirect binding of a physical device.
    Redirect(String),
    /// The impairment plan installed on a target device.
    Plan(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redirect(device) => write!(f, "redirect of {device}"),
            Self::Plan(device) => write!(f, "plan on {device}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub scope: Scope,
    pub undo: Operation,
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    records: Vec<Record>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, scope: Scope, undo: Operation) {
        self.records.push(Record { scope, undo });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in creation order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn contains_scope(&self, scope: &Scope) -> bool {
        self.records.iter().any(|record| record.scope == *scope)
    }

    /// Take every record, leaving the ledger empty.
    pub fn drain_all(&mut self) -> Vec<Record> {
        std::mem::take(&mut self.records)
    }

    /// Take the records of one scope, keeping the others in place.
    pub fn drain_scope(&mut self, scope: &Scope) -> Vec<Record> {
        let records = std::mem::take(&mut self.records);
        let (taken, kept): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|record| record.scope == *scope);
        self.records = kept;
        taken
    }
}

/// An inverse operation that failed during teardown. Logged and collected, never raised.
#[derive(Debug, thiserror::Error)]
#[error("teardown of `{operation}` failed: {source}")]
pub struct TeardownWarning {
    pub operation: Operation,
    #[source]
    pub source: ExecutionError,
}

/// Outcome of replaying ledger records.
#[derive(Debug, Default)]
pub struct TeardownReport {
    /// Number of inverse operations issued.
    pub attempted: usize,
    pub warnings: Vec<TeardownWarning>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn cleanup(&self) -> Cleanup {
        if self.is_clean() {
            Cleanup::Complete { steps: self.attempted }
        } else {
            Cleanup::Partial { steps: self.attempted, failed: self.warnings.len() }
        }
    }
}

/// Whether the cleanup following a failed operation restored the devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleanup {
    /// Every inverse operation succeeded.
    Complete { steps: usize },
    /// Some inverse operations failed; see the logged teardown warnings.
    Partial { steps: usize, failed: usize },
    NotAttempted,
}

impl Cleanup {
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

impl fmt::Display for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Complete { steps } => write!(f, "cleanup complete ({steps} steps)"),
            Self::Partial { steps, failed } => {
                write!(f, "cleanup incomplete ({failed} of {steps} steps failed)")
            }
            Self::NotAttempted => f.write_str("cleanup not attempted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(name: &str) -> Operation {
        Operation::DeleteLink { name: name.to_string() }
    }

    #[test]
    fn drain_scope_keeps_other_records_in_order() {
        let redirect = Scope::Redirect("eth0".into());
        let plan = Scope::Plan("ifb-eth0".into());

        let mut ledger = Ledger::new();
        ledger.push(redirect.clone(), link("a"));
        ledger.push(plan.clone(), link("b"));
        ledger.push(redirect.clone(), link("c"));
        ledger.push(plan.clone(), link("d"));

        let devices = |records: &[Record]| {
            records.iter().map(|r| r.undo.device().to_string()).collect::<Vec<_>>()
        };

        let taken = ledger.drain_scope(&plan);
        assert_eq!(devices(&taken[..]), ["b", "d"]);
        assert_eq!(devices(ledger.records()), ["a", "c"]);
        assert!(!ledger.contains_scope(&plan));

        assert_eq!(ledger.drain_all().len(), 2);
        assert!(ledger.is_empty());
        assert!(ledger.drain_all().is_empty());
    }

    #[test]
    fn cleanup_outcome() {
        let mut report = TeardownReport { attempted: 3, warnings: Vec::new() };
        assert_eq!(report.cleanup(), Cleanup::Complete { steps: 3 });

        report.warnings.push(TeardownWarning {
            operation: link("x"),
            source: ExecutionError::Rejected("busy".into()),
        });
        assert_eq!(report.cleanup(), Cleanup::Partial { steps: 3, failed: 1 });
        assert_eq!(report.cleanup().to_string(), "cleanup incomplete (1 of 3 steps failed)");
    }
}
