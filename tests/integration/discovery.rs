#[path = "common/mod.rs"]
mod common;

use std::os::unix::fs::symlink;

use common::Sandbox;
use serviced::error::ServicedError;

#[test]
fn masked_units_are_not_found() {
    let sandbox = Sandbox::new();
    symlink("/dev/null", sandbox.units_dir().join("foo.service"))
        .expect("create mask link");
    let mut supervisor = sandbox.supervisor();

    let err = supervisor.start("foo").unwrap_err();
    assert!(matches!(err, ServicedError::NotFound(_)));
    assert!(err.to_string().contains("Service not found"));
    assert_eq!(supervisor.status("foo"), 4);
}

#[test]
fn earlier_directories_shadow_later_ones() {
    let mut sandbox = Sandbox::new();
    let low_dir = sandbox.add_unit_dir("lib-units");

    sandbox.write_unit(
        "web.service",
        "[Unit]\nDescription=etc copy\n\n[Service]\nType=oneshot\nExecStart=/bin/true\nRemainAfterExit=yes\n",
    );
    std::fs::write(
        low_dir.join("web.service"),
        "[Unit]\nDescription=lib copy\n\n[Service]\nType=oneshot\nExecStart=/bin/false\n",
    )
    .expect("write shadowed unit");

    let mut supervisor = sandbox.supervisor();
    // The /bin/false variant would fail; the shadowing copy must win.
    supervisor.start("web").expect("shadowing unit starts");
}

#[test]
fn symlinked_units_resolve_to_their_targets() {
    let sandbox = Sandbox::new();
    let real = sandbox.write_unit(
        "real.service",
        "[Unit]\nDescription=The real one\n\n[Service]\nType=oneshot\nExecStart=/bin/true\n",
    );
    symlink(&real, sandbox.units_dir().join("alias.service"))
        .expect("create alias link");

    let mut supervisor = sandbox.supervisor();
    supervisor.start("alias").expect("alias starts");
}

#[test]
fn status_of_an_unknown_unit_is_exit_code_4() {
    let sandbox = Sandbox::new();
    let mut supervisor = sandbox.supervisor();
    assert_eq!(supervisor.status("nothing-here"), 4);
}
