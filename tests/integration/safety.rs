#[path = "common/mod.rs"]
mod common;

use common::Sandbox;
use serviced::error::ServicedError;

#[test]
fn critical_names_are_refused_with_no_state_side_effects() {
    let sandbox = Sandbox::new();
    let mut supervisor = sandbox.supervisor();

    for name in ["systemd-journald", "init", "dbus", "getty@.service"] {
        let err = supervisor.start(name).unwrap_err();
        assert!(
            matches!(err, ServicedError::CriticalRefused(_)),
            "{name} should be refused on start"
        );
        assert!(
            err.to_string()
                .contains("Refusing to manage critical service"),
            "error message for {name}"
        );

        let err = supervisor.stop(name).unwrap_err();
        assert!(
            matches!(err, ServicedError::CriticalRefused(_)),
            "{name} should be refused on stop"
        );

        let err = supervisor.restart(name).unwrap_err();
        assert!(
            matches!(err, ServicedError::CriticalRefused(_)),
            "{name} should be refused on restart"
        );
    }

    assert!(
        !sandbox.config.state_dir.exists(),
        "a refused operation must not touch the state root"
    );
}

#[test]
fn critical_prefixes_and_template_patterns_are_refused() {
    let sandbox = Sandbox::new();
    let mut supervisor = sandbox.supervisor();

    for name in [
        "systemd-anything-at-all",
        "initrd-cleanup",
        "rescue.service",
        "serial-getty@.service",
    ] {
        assert!(
            matches!(
                supervisor.start(name),
                Err(ServicedError::CriticalRefused(_))
            ),
            "{name} should be refused"
        );
    }
}

#[test]
fn unsupported_service_types_cannot_be_started() {
    let sandbox = Sandbox::new();
    sandbox.write_unit(
        "busdaemon.service",
        "[Service]\nType=dbus\nExecStart=/bin/sleep 60\n",
    );
    let mut supervisor = sandbox.supervisor();

    let err = supervisor.start("busdaemon").unwrap_err();
    assert!(matches!(
        err,
        ServicedError::UnsupportedType { ref kind, .. } if kind == "dbus"
    ));
}

#[test]
fn unsupported_dependencies_are_skipped_not_fatal() {
    let sandbox = Sandbox::new();
    sandbox.write_unit(
        "busdep.service",
        "[Service]\nType=dbus\nExecStart=/bin/sleep 60\n",
    );
    sandbox.write_unit(
        "app.service",
        "[Unit]\nWants=busdep.service\n\n[Service]\nType=oneshot\nExecStart=/bin/true\nRemainAfterExit=yes\n",
    );
    let mut supervisor = sandbox.supervisor();

    supervisor.start("app").expect("app starts without the dbus dep");
    assert!(sandbox.store().read_status("busdep.service").is_none());
}

#[test]
fn init_range_pids_are_never_signalled() {
    let sandbox = Sandbox::new();
    sandbox.write_unit(
        "hijack.service",
        "[Service]\nType=simple\nExecStart=/bin/sleep 60\n",
    );
    sandbox
        .store()
        .write_pid("hijack.service", 1)
        .expect("plant pid 1");

    let mut supervisor = sandbox.supervisor();
    let err = supervisor.stop("hijack").unwrap_err();
    assert!(matches!(err, ServicedError::ProtectedPid(1)));
}

#[test]
fn refused_requests_still_reach_the_audit_log() {
    let sandbox = Sandbox::new();
    let mut supervisor = sandbox.supervisor();

    let _ = supervisor.start("systemd-journald");
    let audit = std::fs::read_to_string(sandbox.config.action_log_path())
        .expect("audit log exists");
    assert!(audit.contains("START request for systemd-journald.service"));
}
