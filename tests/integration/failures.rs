#[path = "common/mod.rs"]
mod common;

use common::Sandbox;
use serviced::{error::ServicedError, state::UnitState};

#[test]
fn simple_service_dead_on_arrival_is_a_failure() {
    let sandbox = Sandbox::new();
    sandbox.write_unit(
        "doa.service",
        "[Service]\nType=simple\nExecStart=/bin/false\n",
    );
    let mut supervisor = sandbox.supervisor();

    let err = supervisor.start("doa").unwrap_err();
    assert!(matches!(err, ServicedError::DeadOnArrival(_)));

    let store = sandbox.store();
    let record = store.read_status("doa.service").expect("status written");
    assert_eq!(record.state, UnitState::Failed);
    assert!(
        store.read_pid("doa.service").is_none(),
        "pid file must be removed after dead-on-arrival"
    );
}

#[test]
fn dead_on_arrival_with_remain_after_exit_is_active() {
    let sandbox = Sandbox::new();
    sandbox.write_unit(
        "short.service",
        "[Service]\nType=simple\nExecStart=/bin/true\nRemainAfterExit=yes\n",
    );
    let mut supervisor = sandbox.supervisor();

    supervisor.start("short").expect("short-lived start");
    let record = sandbox.store().read_status("short.service").unwrap();
    assert_eq!(record.state, UnitState::Active);
    assert_eq!(record.pid, 0);
}

#[test]
fn failing_exec_start_pre_aborts_the_start() {
    let sandbox = Sandbox::new();
    sandbox.write_unit(
        "guarded.service",
        "[Service]\nType=simple\nExecStartPre=/bin/false\nExecStart=/bin/sleep 60\n",
    );
    let mut supervisor = sandbox.supervisor();

    let err = supervisor.start("guarded").unwrap_err();
    assert!(matches!(
        err,
        ServicedError::ExecStepFailure {
            phase: "ExecStartPre",
            ..
        }
    ));

    let store = sandbox.store();
    assert_eq!(
        store.read_status("guarded.service").unwrap().state,
        UnitState::Failed
    );
    assert!(
        store.read_pid("guarded.service").is_none(),
        "main process must not have been launched"
    );
}

#[test]
fn unchecked_exec_start_pre_failure_is_ignored() {
    let sandbox = Sandbox::new();
    sandbox.write_unit(
        "lenient.service",
        "[Service]\nType=oneshot\nExecStartPre=-/bin/false\nExecStart=/bin/true\n",
    );
    let mut supervisor = sandbox.supervisor();
    supervisor.start("lenient").expect("unchecked pre failure");
}

#[test]
fn missing_exec_start_is_a_failure() {
    let sandbox = Sandbox::new();
    sandbox.write_unit("empty.service", "[Service]\nType=simple\n");
    let mut supervisor = sandbox.supervisor();

    let err = supervisor.start("empty").unwrap_err();
    assert!(matches!(err, ServicedError::MissingExecStart(_)));
    let record = sandbox.store().read_status("empty.service").unwrap();
    assert_eq!(record.state, UnitState::Failed);
    assert_eq!(record.message, "No ExecStart");
}

#[test]
fn unspawnable_program_is_a_failure() {
    let sandbox = Sandbox::new();
    sandbox.write_unit(
        "phantom.service",
        "[Service]\nType=simple\nExecStart=/nonexistent/binary-xyz\n",
    );
    let mut supervisor = sandbox.supervisor();

    let err = supervisor.start("phantom").unwrap_err();
    assert!(matches!(err, ServicedError::SpawnFailure(_)));
    let record = sandbox.store().read_status("phantom.service").unwrap();
    assert_eq!(record.state, UnitState::Failed);
}

#[test]
fn unmet_path_condition_skips_the_start() {
    let sandbox = Sandbox::new();
    sandbox.write_unit(
        "conditional.service",
        "[Unit]\nConditionPathExists=/nonexistent/flag\n\n[Service]\nType=oneshot\nExecStart=/bin/true\n",
    );
    let mut supervisor = sandbox.supervisor();

    let err = supervisor.start("conditional").unwrap_err();
    assert!(matches!(err, ServicedError::ConditionFailed { .. }));
    // No status record is written for an unmet condition.
    assert!(sandbox.store().read_status("conditional.service").is_none());
}

#[test]
fn negated_path_condition_allows_the_start() {
    let sandbox = Sandbox::new();
    sandbox.write_unit(
        "negated.service",
        "[Unit]\nConditionPathExists=!/nonexistent/flag\n\n[Service]\nType=oneshot\nExecStart=/bin/true\n",
    );
    let mut supervisor = sandbox.supervisor();
    supervisor.start("negated").expect("negated condition holds");
}

#[test]
fn dependency_failure_does_not_abort_the_parent() {
    let sandbox = Sandbox::new();
    sandbox.write_unit(
        "fragile-dep.service",
        "[Service]\nType=oneshot\nExecStart=/bin/false\n",
    );
    sandbox.write_unit(
        "parent.service",
        "[Unit]\nRequires=fragile-dep.service\n\n[Service]\nType=oneshot\nExecStart=/bin/true\nRemainAfterExit=yes\n",
    );
    let mut supervisor = sandbox.supervisor();

    supervisor
        .start("parent")
        .expect("parent survives dependency failure");

    let store = sandbox.store();
    assert_eq!(
        store.read_status("parent.service").unwrap().state,
        UnitState::Active
    );
    assert_eq!(
        store.read_status("fragile-dep.service").unwrap().state,
        UnitState::Failed
    );
}

#[test]
fn dependency_chain_starts_before_the_parent() {
    let sandbox = Sandbox::new();
    let marker = sandbox.path().join("chain.txt");
    sandbox.write_unit(
        "base.service",
        &format!(
            "[Service]\nType=oneshot\nExecStart=/bin/sh -c 'echo base >> {m}'\nRemainAfterExit=yes\n",
            m = marker.display()
        ),
    );
    sandbox.write_unit(
        "middle.service",
        &format!(
            "[Unit]\nRequires=base.service\n\n[Service]\nType=oneshot\nExecStart=/bin/sh -c 'echo middle >> {m}'\nRemainAfterExit=yes\n",
            m = marker.display()
        ),
    );
    sandbox.write_unit(
        "top.service",
        &format!(
            "[Unit]\nWants=middle.service\n\n[Service]\nType=oneshot\nExecStart=/bin/sh -c 'echo top >> {m}'\nRemainAfterExit=yes\n",
            m = marker.display()
        ),
    );
    let mut supervisor = sandbox.supervisor();

    supervisor.start("top").expect("chain start");
    let content = std::fs::read_to_string(&marker).expect("marker written");
    assert_eq!(content, "base\nmiddle\ntop\n");
}

#[test]
fn dependency_cycles_terminate() {
    let sandbox = Sandbox::new();
    sandbox.write_unit(
        "ping.service",
        "[Unit]\nRequires=pong.service\n\n[Service]\nType=oneshot\nExecStart=/bin/true\nRemainAfterExit=yes\n",
    );
    sandbox.write_unit(
        "pong.service",
        "[Unit]\nRequires=ping.service\n\n[Service]\nType=oneshot\nExecStart=/bin/true\nRemainAfterExit=yes\n",
    );
    let mut supervisor = sandbox.supervisor();

    supervisor.start("ping").expect("cycle must not loop forever");
    let store = sandbox.store();
    assert_eq!(
        store.read_status("ping.service").unwrap().state,
        UnitState::Active
    );
    assert_eq!(
        store.read_status("pong.service").unwrap().state,
        UnitState::Active
    );
}
