//! Fakes standing in for the system.

use std::{cell::RefCell, io, rc::Rc};

use netimpair::{
    device::{LinkProbe, LinkState},
    executor::{ExecutionError, Facility},
    operation::Operation,
    session::{Session, SessionOptions},
    tc::requests,
};

type FailWhen = Box<dyn Fn(&Operation) -> bool>;

#[derive(Default)]
struct State {
    calls: Vec<Operation>,
    /// 1-based positions of calls that fail.
    fail_at: Vec<usize>,
    fail_when: Option<FailWhen>,
}

/// Records every operation and fails the ones it was told to. Clones share state, so a test can
/// keep inspecting the calls after handing a clone to a session.
#[derive(Clone, Default)]
pub struct FakeFacility {
    state: Rc<RefCell<State>>,
}

impl FakeFacility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`-th call (1-based), counting every call the facility receives.
    pub fn fail_call(&self, n: usize) -> &Self {
        self.state.borrow_mut().fail_at.push(n);
        self
    }

    pub fn fail_when(&self, predicate: impl Fn(&Operation) -> bool + 'static) -> &Self {
        self.state.borrow_mut().fail_when = Some(Box::new(predicate));
        self
    }

    pub fn calls(&self) -> Vec<Operation> {
        self.state.borrow().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.borrow().calls.len()
    }

    /// The calls as `tc`/`ip` command lines.
    pub fn rendered(&self) -> Vec<String> {
        self.state.borrow().calls.iter().map(|op| requests::build(op).to_string()).collect()
    }
}

impl Facility for FakeFacility {
    fn run(&mut self, operation: &Operation) -> Result<(), ExecutionError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(operation.clone());

        let position = state.calls.len();
        let scripted = state.fail_at.contains(&position);
        let matched = state.fail_when.as_ref().is_some_and(|fail| fail(operation));

        if scripted || matched {
            return Err(ExecutionError::Rejected(format!("fake failure of call {position}")));
        }
        Ok(())
    }
}

/// `eth0`, `eth2` and the `enx00e04c68000*` devices are up, `eth1` is down, everything else is
/// missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeLinks;

impl LinkProbe for FakeLinks {
    fn link_state(&self, name: &str) -> io::Result<LinkState> {
        Ok(match name {
            "eth0" | "eth2" => LinkState::Up,
            name if name.starts_with("enx00e04c68000") => LinkState::Up,
            "eth1" => LinkState::Down,
            _ => LinkState::Missing,
        })
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// A session over a fresh fake facility, without stale-state purging.
pub fn session() -> (Session<FakeFacility, FakeLinks>, FakeFacility) {
    session_with(SessionOptions::new().with_purge_stale(false))
}

pub fn session_with(options: SessionOptions) -> (Session<FakeFacility, FakeLinks>, FakeFacility) {
    init_tracing();
    let facility = FakeFacility::new();
    let session = Session::with_probe(facility.clone(), FakeLinks).with_options(options);
    (session, facility)
}
