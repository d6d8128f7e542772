//! Operation execution.
//!
//! The [`Facility`] trait is the boundary to the system: it carries out one [`Operation`] and
//! reports success or failure. [`CommandFacility`] does so through `tc` and `ip`. The
//! [`Executor`] drives a facility, recording the inverse of every successful create operation in
//! the [`Ledger`], and replays ledger records on teardown.

use std::fmt;

use crate::{
    command::{self, Runner},
    ledger::{Ledger, Record, Scope, TeardownReport, TeardownWarning},
    operation::Operation,
    tc::requests,
};

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("command error: {0}")]
    Command(#[from] command::Error),
    /// The facility refused the operation without running anything.
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Something that can carry out operations, one at a time.
pub trait Facility {
    fn run(&mut self, operation: &Operation) -> Result<(), ExecutionError>;
}

impl<F: Facility + ?Sized> Facility for &mut F {
    fn run(&mut self, operation: &Operation) -> Result<(), ExecutionError> {
        (**self).run(operation)
    }
}

impl<F: Facility + ?Sized> Facility for Box<F> {
    fn run(&mut self, operation: &Operation) -> Result<(), ExecutionError> {
        (**self).run(operation)
    }
}

/// Runs every operation as a `tc` or `ip` command.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandFacility {
    dry_run: bool,
}

impl CommandFacility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log the commands instead of running them.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

impl Facility for CommandFacility {
    fn run(&mut self, operation: &Operation) -> Result<(), ExecutionError> {
        let invocation = requests::build(operation);

        if self.dry_run {
            tracing::info!(command = %invocation, "dry run");
            return Ok(());
        }

        Runner::run(&invocation)?;
        Ok(())
    }
}

/// An operation that failed, halting execution.
#[derive(Debug, thiserror::Error)]
#[error("operation `{operation}` failed: {source}")]
pub struct OperationError {
    pub operation: Operation,
    #[source]
    pub source: ExecutionError,
}

pub struct Executor<F> {
    facility: F,
}

impl<F: fmt::Debug> fmt::Debug for Executor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor").field("facility", &self.facility).finish()
    }
}

impl<F: Facility> Executor<F> {
    pub fn new(facility: F) -> Self {
        Self { facility }
    }

    pub fn facility(&self) -> &F {
        &self.facility
    }

    pub fn facility_mut(&mut self) -> &mut F {
        &mut self.facility
    }

    pub fn into_inner(self) -> F {
        self.facility
    }

    /// Run one operation without recording anything.
    pub fn apply(&mut self, operation: &Operation) -> Result<(), OperationError> {
        tracing::debug!(%operation, "executing");
        self.facility.run(operation).map_err(|source| {
            tracing::debug!(%operation, ?source, "operation failed");
            OperationError { operation: operation.clone(), source }
        })
    }

    /// Run operations in order, appending the inverse of each success to `ledger` under `scope`.
    /// The first failure halts execution; records of the operations that succeeded stay in the
    /// ledger.
    pub fn execute<I>(
        &mut self,
        operations: I,
        scope: &Scope,
        ledger: &mut Ledger,
    ) -> Result<(), OperationError>
    where
        I: IntoIterator<Item = Operation>,
    {
        for operation in operations {
            self.apply(&operation)?;
            if let Some(undo) = operation.inverse() {
                ledger.push(scope.clone(), undo);
            }
        }
        Ok(())
    }

    /// Run an operation whose failure is irrelevant, such as removing leftovers of an earlier run.
    /// Returns whether it succeeded.
    pub fn attempt(&mut self, operation: &Operation) -> bool {
        match self.facility.run(operation) {
            Ok(()) => true,
            Err(error) => {
                tracing::debug!(%operation, %error, "ignoring failure");
                false
            }
        }
    }

    /// Issue the inverse operations of `records` in reverse order. Failures are logged and
    /// collected; the remaining records are still replayed.
    pub fn unwind(&mut self, records: Vec<Record>) -> TeardownReport {
        let mut report = TeardownReport::default();

        for Record { scope, undo } in records.into_iter().rev() {
            report.attempted += 1;
            tracing::debug!(%scope, operation = %undo, "undoing");

            if let Err(source) = self.facility.run(&undo) {
                let warning = TeardownWarning { operation: undo, source };
                tracing::warn!(%scope, %warning, "teardown step failed");
                report.warnings.push(warning);
            }
        }

        report
    }
}
