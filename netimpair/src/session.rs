//! Impairment sessions.
//!
//! A [`Session`] owns everything the current process installed: the executor driving the
//! facility, the teardown ledger, the redirect bindings and the installed impairments. It tears
//! all of it down on [`Session::teardown`], after any failed operation, and when dropped.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::{
    device::{Device, Direction, LinkProbe, SysLinks, Topology},
    executor::{Executor, Facility, OperationError},
    ledger::{Ledger, Scope, TeardownReport},
    operation::Operation,
    plan::Plan,
    selector::SelectorSet,
    tc::{
        handle::{IMPAIRED_CLASS, LEAF},
        impairment::{ImpairmentRequest, ImpairmentSpec},
    },
    Error, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    purge_stale: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { purge_stale: true }
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove root and ingress qdiscs left over by an earlier run before the first install on a
    /// device. Enabled by default.
    pub fn with_purge_stale(mut self, purge_stale: bool) -> Self {
        self.purge_stale = purge_stale;
        self
    }

    pub fn purge_stale(&self) -> bool {
        self.purge_stale
    }
}

/// A request to impair traffic of one device in one direction.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallRequest {
    pub device: String,
    pub direction: Direction,
    pub selectors: SelectorSet,
    pub impairment: ImpairmentRequest,
}

impl InstallRequest {
    /// Impair all outbound traffic of `device`.
    pub fn new(device: impl Into<String>, impairment: impl Into<ImpairmentRequest>) -> Self {
        Self {
            device: device.into(),
            direction: Direction::Outbound,
            selectors: SelectorSet::all(),
            impairment: impairment.into(),
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_selectors(mut self, selectors: SelectorSet) -> Self {
        self.selectors = selectors;
        self
    }
}

/// An impairment installed by the session.
#[derive(Debug, Clone, PartialEq)]
pub struct Installation {
    pub target: Device,
    /// The last requested parameters, re-applied when the impairment is enabled again.
    pub spec: ImpairmentSpec,
    pub enabled: bool,
}

pub struct Session<F: Facility, L: LinkProbe = SysLinks> {
    executor: Executor<F>,
    ledger: Ledger,
    topology: Topology<L>,
    installations: FxHashMap<(String, Direction), Installation>,
    options: SessionOptions,
}

impl<F: Facility> Session<F> {
    pub fn new(facility: F) -> Self {
        Self::with_probe(facility, SysLinks)
    }
}

impl<F: Facility, L: LinkProbe> Session<F, L> {
    pub fn with_probe(facility: F, probe: L) -> Self {
        Self {
            executor: Executor::new(facility),
            ledger: Ledger::new(),
            topology: Topology::new(probe),
            installations: FxHashMap::default(),
            options: SessionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn facility(&self) -> &F {
        self.executor.facility()
    }

    pub fn facility_mut(&mut self) -> &mut F {
        self.executor.facility_mut()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn topology(&self) -> &Topology<L> {
        &self.topology
    }

    /// Whether anything installed by this session is still in place.
    pub fn is_active(&self) -> bool {
        !self.ledger.is_empty()
    }

    pub fn installation(&self, device: &str, direction: Direction) -> Option<&Installation> {
        self.installations.get(&(device.to_string(), direction))
    }

    /// Install an impairment, replacing any impairment this session installed earlier for the
    /// same device and direction.
    ///
    /// Invalid requests fail before anything is run. If an operation fails, the whole session is
    /// torn down and [`Error::OperationFailed`] reports whether that cleanup succeeded.
    pub fn install(&mut self, request: &InstallRequest) -> Result<Plan> {
        let selectors = request.selectors.compile();
        self.topology.check(&request.device)?;

        let target = self.topology.target(&request.device, request.direction);
        let plan = Plan::compile(&target, &selectors, &request.impairment)?;

        let purge = self.options.purge_stale;
        let device = match self.topology.resolve(
            &request.device,
            request.direction,
            &mut self.executor,
            &mut self.ledger,
            purge,
        ) {
            Ok(device) => device,
            Err(Error::OperationFailed { error, .. }) => return Err(self.abort(error)),
            Err(error) => return Err(error),
        };

        let key = (request.device.clone(), request.direction);
        let scope = Scope::Plan(device.name.clone());

        if self.installations.remove(&key).is_some() {
            tracing::info!(%device, "replacing impairment");
            let records = self.ledger.drain_scope(&scope);
            let report = self.executor.unwind(records);
            if !report.is_clean() {
                let failed = report.warnings.len();
                tracing::warn!(%device, failed, "replaced plan left residue");
            }
        } else if purge {
            self.executor.attempt(&Operation::DeleteRootQdisc { device: device.name.clone() });
        }

        tracing::debug!(%device, operations = plan.operations().len(), "executing plan");
        let result =
            self.executor.execute(plan.operations().iter().cloned(), &scope, &mut self.ledger);
        if let Err(error) = result {
            return Err(self.abort(error));
        }

        tracing::info!(%device, spec = %plan.spec(), "impairment installed");
        self.installations
            .insert(key, Installation { target: device, spec: *plan.spec(), enabled: true });

        Ok(plan)
    }

    /// Pause or resume an installed impairment by changing only its leaf. Disabling switches the
    /// leaf to its passthrough form; enabling re-applies the installed parameters. Toggling to the
    /// current state does nothing.
    pub fn toggle(&mut self, device: &str, direction: Direction, enable: bool) -> Result<()> {
        let key = (device.to_string(), direction);
        let Some(installation) = self.installations.get(&key) else {
            return Err(Error::NoActiveImpairment { device: device.to_string(), direction });
        };

        if installation.enabled == enable {
            tracing::debug!(%device, %direction, enable, "impairment already in requested state");
            return Ok(());
        }

        let spec = if enable { installation.spec } else { installation.spec.passthrough() };
        let change = Operation::ChangeLeafQdisc {
            device: installation.target.name.clone(),
            parent: IMPAIRED_CLASS,
            handle: LEAF,
            spec,
        };

        if let Err(error) = self.executor.apply(&change) {
            return Err(self.abort(error));
        }

        if let Some(installation) = self.installations.get_mut(&key) {
            installation.enabled = enable;
        }
        tracing::info!(%device, %direction, enable, "impairment toggled");

        Ok(())
    }

    /// Undo everything this session installed, most recent first. Failed steps are logged and
    /// reported; the rest still run. Calling this again is a no-op.
    pub fn teardown(&mut self) -> TeardownReport {
        let records = self.ledger.drain_all();
        self.installations.clear();
        self.topology.reset();

        if records.is_empty() {
            return TeardownReport::default();
        }

        tracing::info!(steps = records.len(), "tearing down");
        let report = self.executor.unwind(records);
        if report.is_clean() {
            tracing::info!(steps = report.attempted, "teardown complete");
        } else {
            tracing::warn!(failed = report.warnings.len(), "teardown incomplete");
        }

        report
    }

    fn abort(&mut self, error: OperationError) -> Error {
        tracing::warn!(%error, "operation failed, tearing down session");
        let report = self.teardown();
        Error::OperationFailed { error, cleanup: report.cleanup() }
    }
}

impl<F: Facility, L: LinkProbe> fmt::Debug for Session<F, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("ledger", &self.ledger)
            .field("installations", &self.installations)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<F: Facility, L: LinkProbe> Drop for Session<F, L> {
    fn drop(&mut self) {
        if self.is_active() {
            tracing::warn!(records = self.ledger.len(), "session dropped while active, tearing down");
            self.teardown();
        }
    }
}
