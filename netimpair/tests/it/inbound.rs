use std::{cell::RefCell, collections::HashSet};

use netimpair::{
    device::Direction,
    ledger::Scope,
    operation::{Operation, OperationKind},
    session::InstallRequest,
    tc::{netem::NetemParams, tbf::RateParams},
    Error,
};

use crate::helpers::session;

fn count(calls: &[Operation], kind: OperationKind) -> usize {
    calls.iter().filter(|op| op.kind() == kind && op.inverse().is_some()).count()
}

#[test]
fn inbound_binds_redirect_device() {
    let (mut session, facility) = session();

    let request = InstallRequest::new("eth0", NetemParams::new().with_loss(2.5))
        .with_direction(Direction::Inbound);
    let plan = session.install(&request).unwrap();
    assert_eq!(plan.device().name, "ifb-eth0");

    assert_eq!(
        facility.rendered()[..4],
        [
            "ip link add name ifb-eth0 type ifb",
            "ip link set dev ifb-eth0 up",
            "tc qdisc add dev eth0 handle ffff: ingress",
            "tc filter add dev eth0 parent ffff: protocol all prio 1 u32 match u32 0 0 action \
             mirred egress redirect dev ifb-eth0",
        ]
    );
    assert!(facility.calls()[4..].iter().all(|op| op.device() == "ifb-eth0"));

    let redirect_records = session
        .ledger()
        .records()
        .iter()
        .filter(|record| record.scope == Scope::Redirect("eth0".into()))
        .count();
    assert_eq!(redirect_records, 4);
}

#[test]
fn second_inbound_request_reuses_binding() {
    let (mut session, facility) = session();

    let first = InstallRequest::new("eth0", NetemParams::new().with_loss(2.5))
        .with_direction(Direction::Inbound);
    let second = InstallRequest::new("eth0", RateParams::new(2_000))
        .with_direction(Direction::Inbound);

    session.install(&first).unwrap();
    session.install(&second).unwrap();

    let calls = facility.calls();
    assert_eq!(count(&calls, OperationKind::Link), 1);
    assert_eq!(count(&calls, OperationKind::IngressQdisc), 1);
    assert_eq!(count(&calls, OperationKind::RedirectFilter), 1);
    assert_eq!(count(&calls, OperationKind::RootQdisc), 2);
    assert_eq!(session.topology().redirect_of("eth0"), Some("ifb-eth0"));
    assert_eq!(session.ledger().len(), 8);
}

#[test]
fn both_directions_coexist() {
    let (mut session, facility) = session();

    session.install(&InstallRequest::new("eth0", NetemParams::new().with_loss(1.0))).unwrap();
    session
        .install(
            &InstallRequest::new("eth0", NetemParams::new().with_duplicate(1.0))
                .with_direction(Direction::Inbound),
        )
        .unwrap();

    assert!(session.installation("eth0", Direction::Outbound).is_some());
    assert_eq!(session.installation("eth0", Direction::Inbound).unwrap().target.name, "ifb-eth0");
    assert_eq!(facility.call_count(), 4 + 4 + 4);
}

#[test]
fn teardown_unbinds_last() {
    let (mut session, facility) = session();

    let request = InstallRequest::new("eth0", RateParams::new(512))
        .with_direction(Direction::Inbound);
    session.install(&request).unwrap();
    let created = facility.call_count();

    let report = session.teardown();
    assert!(report.is_clean());
    assert!(session.topology().redirect_of("eth0").is_none());

    let rendered = facility.rendered();
    assert_eq!(
        rendered[created + 4..],
        [
            "tc filter del dev eth0 parent ffff: protocol all prio 1",
            "tc qdisc del dev eth0 ingress",
            "ip link set dev ifb-eth0 down",
            "ip link del dev ifb-eth0",
        ]
    );

    // A new inbound request after teardown binds again.
    session.install(&request).unwrap();
    assert_eq!(session.topology().redirect_of("eth0"), Some("ifb-eth0"));
}

#[test]
fn failed_binding_is_unwound() {
    let (mut session, facility) = session();
    facility.fail_when(|op| matches!(op, Operation::AddIngressQdisc { .. }));

    let request = InstallRequest::new("eth0", NetemParams::new().with_loss(1.0))
        .with_direction(Direction::Inbound);

    match session.install(&request).unwrap_err() {
        Error::OperationFailed { error, cleanup } => {
            assert!(matches!(error.operation, Operation::AddIngressQdisc { .. }));
            assert!(cleanup.is_complete());
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert_eq!(
        facility.rendered()[3..],
        ["ip link set dev ifb-eth0 down", "ip link del dev ifb-eth0"]
    );
    assert!(session.topology().redirect_of("eth0").is_none());
}

#[test]
fn long_device_names_get_their_own_redirects() {
    let (mut session, facility) = session();

    // Like the kernel, refuse a second link with an existing name.
    let links = RefCell::new(HashSet::new());
    facility.fail_when(move |op| match op {
        Operation::AddLink { name } => !links.borrow_mut().insert(name.clone()),
        _ => false,
    });

    for device in ["enx00e04c680001", "enx00e04c680002"] {
        let request = InstallRequest::new(device, NetemParams::new().with_loss(1.0))
            .with_direction(Direction::Inbound);
        session.install(&request).unwrap();
    }

    let first = session.topology().redirect_of("enx00e04c680001").unwrap();
    let second = session.topology().redirect_of("enx00e04c680002").unwrap();
    assert_ne!(first, second);
    assert!(session.installation("enx00e04c680001", Direction::Inbound).is_some());
    assert_eq!(session.ledger().len(), 2 * (4 + 4));
}
