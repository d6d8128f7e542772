use std::time::Duration;

use netimpair::{
    device::Direction,
    executor::CommandFacility,
    ledger::Cleanup,
    operation::{Operation, OperationKind},
    selector::SelectorSet,
    session::{InstallRequest, Session, SessionOptions},
    tc::{
        handle::{IMPAIRED_CLASS, LEAF, PASSTHROUGH_CLASS, ROOT},
        impairment::{ImpairmentRequest, ImpairmentSpec},
        netem::NetemParams,
        tbf::RateParams,
    },
    Error,
};

use crate::helpers::{init_tracing, session, session_with, FakeFacility, FakeLinks};

fn netem() -> NetemParams {
    NetemParams::new().with_delay(Duration::from_millis(100)).with_loss(5.0)
}

#[test]
fn outbound_netem_end_to_end() {
    let (mut session, facility) = session();

    let plan = session.install(&InstallRequest::new("eth0", netem())).unwrap();
    assert_eq!(plan.count(OperationKind::RootQdisc), 1);
    assert_eq!(plan.count(OperationKind::Class), 2);
    assert_eq!(plan.count(OperationKind::LeafQdisc), 1);
    assert_eq!(plan.count(OperationKind::Filter), 0);

    assert_eq!(
        facility.rendered(),
        [
            "tc qdisc add dev eth0 root handle 1: htb default 2",
            "tc class add dev eth0 parent 1: classid 1:1 htb rate 10000000kbit prio 0",
            "tc class add dev eth0 parent 1: classid 1:2 htb rate 10000000kbit prio 1",
            "tc qdisc add dev eth0 parent 1:2 handle 30: netem delay 100ms loss 5%",
        ]
    );
    assert_eq!(session.ledger().len(), 4);

    let report = session.teardown();
    assert!(report.is_clean());
    assert_eq!(report.attempted, 4);

    let calls = facility.calls();
    let expected: Vec<_> = calls[..4].iter().rev().map(|op| op.inverse().unwrap()).collect();
    assert_eq!(calls[4..], expected[..]);

    // A second teardown finds an empty ledger.
    let again = session.teardown();
    assert_eq!(again.attempted, 0);
    assert_eq!(facility.call_count(), 8);
    assert!(!session.is_active());
}

#[test]
fn failure_midway_unwinds_only_what_succeeded() {
    let (mut session, facility) = session();

    // Root, two classes, leaf and one filter: five operations. The third fails, and so does the
    // first teardown step.
    facility.fail_call(3).fail_call(4);

    let selectors = SelectorSet::parse(["dst=10.0.0.1"], Vec::<&str>::new()).unwrap();
    let request = InstallRequest::new("eth0", netem()).with_selectors(selectors);

    let err = session.install(&request).unwrap_err();
    match err {
        Error::OperationFailed { error, cleanup } => {
            assert!(matches!(
                error.operation,
                Operation::AddClass { classid, .. } if classid == IMPAIRED_CLASS
            ));
            assert_eq!(cleanup, Cleanup::Partial { steps: 2, failed: 1 });
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let calls = facility.calls();
    assert_eq!(calls.len(), 5);
    assert_eq!(
        calls[3],
        Operation::DeleteClass { device: "eth0".into(), parent: ROOT, classid: PASSTHROUGH_CLASS }
    );
    assert_eq!(calls[4], Operation::DeleteRootQdisc { device: "eth0".into() });
    assert!(session.ledger().is_empty());
    assert!(session.installation("eth0", Direction::Outbound).is_none());
}

#[test]
fn validation_errors_issue_nothing() {
    let (mut session, facility) = session();

    assert!(matches!(
        SelectorSet::parse(["dport=http"], Vec::<&str>::new()),
        Err(Error::MalformedSelector { .. })
    ));

    let both = ImpairmentRequest::netem(netem()).with_rate(RateParams::new(1_000));
    assert!(matches!(
        session.install(&InstallRequest::new("eth0", both)),
        Err(Error::UnsupportedCombination)
    ));

    assert!(matches!(
        session.install(&InstallRequest::new("eth0", NetemParams::new().with_loss(150.0))),
        Err(Error::InvalidParameter { name: "loss", .. })
    ));

    assert!(matches!(
        session.install(&InstallRequest::new("eth0", RateParams::new(0))),
        Err(Error::InvalidParameter { name: "limit", .. })
    ));

    for device in ["eth1", "wlan7"] {
        let err = session.install(&InstallRequest::new(device, netem())).unwrap_err();
        assert!(matches!(err, Error::DeviceUnavailable { .. }), "{device}: {err}");
    }

    assert_eq!(facility.call_count(), 0);
    assert!(!session.is_active());
}

#[test]
fn replacement_tears_down_only_the_replaced_plan() {
    let (mut session, facility) = session();

    session.install(&InstallRequest::new("eth0", netem())).unwrap();
    session.install(&InstallRequest::new("eth2", netem())).unwrap();
    session.install(&InstallRequest::new("eth0", RateParams::new(256))).unwrap();

    let calls = facility.calls();
    assert_eq!(calls.len(), 16);
    assert!(calls[8..12].iter().all(|op| op.device() == "eth0" && op.inverse().is_none()));
    assert_eq!(
        calls[8],
        Operation::DeleteLeafQdisc {
            device: "eth0".into(),
            parent: IMPAIRED_CLASS,
            handle: LEAF,
        }
    );
    assert!(calls[12..].iter().all(|op| op.device() == "eth0" && op.inverse().is_some()));

    // eth2 is untouched and both plans are live.
    assert_eq!(session.ledger().len(), 8);
    let installed = session.installation("eth0", Direction::Outbound).unwrap();
    assert_eq!(installed.spec, ImpairmentSpec::Rate(RateParams::new(256)));
}

#[test]
fn stale_state_purge_failures_are_ignored() {
    let (mut session, facility) = session_with(SessionOptions::new());

    // Nothing to purge: deleting the root qdisc fails, as it does on a clean device.
    facility.fail_when(|op| matches!(op, Operation::DeleteRootQdisc { .. }));

    session.install(&InstallRequest::new("eth0", netem())).unwrap();

    let calls = facility.calls();
    assert_eq!(calls[0], Operation::DeleteRootQdisc { device: "eth0".into() });
    assert_eq!(calls.len(), 5);
    // The purge is not recorded.
    assert_eq!(session.ledger().len(), 4);

    // The real root deletion fails the same way during teardown, which is only a warning.
    let report = session.teardown();
    assert_eq!(report.attempted, 4);
    assert_eq!(report.warnings.len(), 1);
}

#[test]
fn dry_run_renders_without_running() {
    init_tracing();

    // The device does not need to exist for commands that are never run.
    let mut session = Session::with_probe(CommandFacility::new().dry_run(true), FakeLinks);
    session
        .install(
            &InstallRequest::new("eth0", RateParams::new(1_000))
                .with_direction(Direction::Inbound)
                .with_selectors(SelectorSet::parse(["sport=5201"], ["dst=10.9.9.9"]).unwrap()),
        )
        .unwrap();

    assert_eq!(session.ledger().len(), 4 + 4 + 3);
    let report = session.teardown();
    assert!(report.is_clean());
    assert_eq!(report.attempted, 11);
}

#[test]
fn dropping_an_active_session_tears_down() {
    init_tracing();
    let facility = FakeFacility::new();
    {
        let mut session = Session::with_probe(facility.clone(), FakeLinks)
            .with_options(SessionOptions::new().with_purge_stale(false));
        session.install(&InstallRequest::new("eth0", netem())).unwrap();
    }

    let calls = facility.calls();
    assert_eq!(calls.len(), 8);
    assert_eq!(calls[7], Operation::DeleteRootQdisc { device: "eth0".into() });
}
