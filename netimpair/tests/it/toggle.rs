use std::time::Duration;

use netimpair::{
    device::Direction,
    ledger::Cleanup,
    operation::Operation,
    schedule::ToggleSchedule,
    session::InstallRequest,
    tc::{impairment::ImpairmentSpec, netem::NetemParams, tbf::RateParams},
    Error,
};

use crate::helpers::session;

fn leaf_changes(calls: &[Operation]) -> Vec<ImpairmentSpec> {
    calls
        .iter()
        .filter_map(|op| match op {
            Operation::ChangeLeafQdisc { spec, .. } => Some(*spec),
            _ => None,
        })
        .collect()
}

#[test]
fn off_then_on_restores_exact_parameters() {
    let (mut session, facility) = session();

    let params = NetemParams::new()
        .with_delay(Duration::from_millis(200))
        .with_jitter(Duration::from_micros(1_500))
        .with_delay_correlation(25.0)
        .with_loss(0.5)
        .with_reorder(10.0);
    session.install(&InstallRequest::new("eth0", params)).unwrap();
    let ledger_before = session.ledger().records().to_vec();

    session.toggle("eth0", Direction::Outbound, false).unwrap();
    assert!(!session.installation("eth0", Direction::Outbound).unwrap().enabled);
    session.toggle("eth0", Direction::Outbound, true).unwrap();

    let calls = facility.calls();
    assert_eq!(calls.len(), 6, "only the leaf changes");
    assert_eq!(
        leaf_changes(&calls),
        [ImpairmentSpec::Netem(NetemParams::default()), ImpairmentSpec::Netem(params)]
    );
    assert_eq!(
        facility.rendered()[5],
        "tc qdisc change dev eth0 parent 1:2 handle 30: netem delay 200ms 1500us 25% loss 0.5% \
         reorder 10%"
    );
    assert_eq!(session.ledger().records(), &ledger_before[..]);
}

#[test]
fn rate_passthrough_is_unlimited() {
    let (mut session, facility) = session();

    let request =
        InstallRequest::new("eth0", RateParams::new(128)).with_direction(Direction::Inbound);
    session.install(&request).unwrap();
    session.toggle("eth0", Direction::Inbound, false).unwrap();

    assert_eq!(
        facility.rendered().last().unwrap(),
        "tc qdisc change dev ifb-eth0 parent 1:2 handle 30: tbf rate 10000000kbit buffer 2000 \
         latency 20ms"
    );
}

#[test]
fn toggling_unknown_pair_fails() {
    let (mut session, _) = session();
    session.install(&InstallRequest::new("eth0", NetemParams::new().with_loss(1.0))).unwrap();

    assert!(matches!(
        session.toggle("eth0", Direction::Inbound, false),
        Err(Error::NoActiveImpairment { direction: Direction::Inbound, .. })
    ));
    assert!(matches!(
        session.toggle("eth2", Direction::Outbound, false),
        Err(Error::NoActiveImpairment { .. })
    ));
}

#[test]
fn failed_toggle_tears_down_session() {
    let (mut session, facility) = session();
    session.install(&InstallRequest::new("eth0", NetemParams::new().with_loss(1.0))).unwrap();
    facility.fail_when(|op| matches!(op, Operation::ChangeLeafQdisc { .. }));

    match session.toggle("eth0", Direction::Outbound, false).unwrap_err() {
        Error::OperationFailed { cleanup, .. } => {
            assert_eq!(cleanup, Cleanup::Complete { steps: 4 });
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!session.is_active());
    assert!(session.installation("eth0", Direction::Outbound).is_none());
}

#[test]
fn schedule_drives_alternating_toggles() {
    let (mut session, facility) = session();
    let params = NetemParams::new().with_loss(20.0);
    session.install(&InstallRequest::new("eth0", params)).unwrap();

    // The impairment starts enabled, so the first step is a no-op.
    for step in ToggleSchedule::from_secs(&[6, 3, 5, 1]).steps() {
        session.toggle("eth0", Direction::Outbound, step.enabled).unwrap();
    }

    assert_eq!(
        leaf_changes(&facility.calls()),
        [
            ImpairmentSpec::Netem(NetemParams::default()),
            ImpairmentSpec::Netem(params),
            ImpairmentSpec::Netem(NetemParams::default()),
        ]
    );
}
