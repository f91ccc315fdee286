#[path = "common/mod.rs"]
mod common;

use common::{Sandbox, wait_for_path};
use serviced::state::UnitState;

#[test]
fn inline_environment_expands_into_the_command_line() {
    let sandbox = Sandbox::new();
    sandbox.write_unit(
        "echoer.service",
        "[Service]\nType=simple\nEnvironmentFile=-/nonexistent\nEnvironment=\"OPTS=--flag --other\"\nExecStart=/bin/echo $OPTS\nRemainAfterExit=yes\n",
    );
    let mut supervisor = sandbox.supervisor();

    supervisor.start("echoer").expect("echo start");

    // Background stdout is redirected into the service log.
    let log = sandbox
        .store()
        .read_log_tail("echoer.service", 10)
        .expect("log exists");
    assert!(
        log.iter().any(|line| line == "--flag --other"),
        "expanded arguments should reach the command: {log:?}"
    );
    let record = sandbox.store().read_status("echoer.service").unwrap();
    assert_eq!(record.state, UnitState::Active);
}

#[test]
fn environment_file_feeds_expansion() {
    let sandbox = Sandbox::new();
    let env_file = sandbox.path().join("service.env");
    std::fs::write(&env_file, "TARGET=from-file\n# comment\nQUOTED=\"has space\"\n")
        .expect("write env file");

    let marker = sandbox.path().join("env-out.txt");
    sandbox.write_unit(
        "consumer.service",
        &format!(
            "[Service]\nType=oneshot\nEnvironmentFile={env}\nExecStart=/bin/sh -c 'echo $TARGET:$QUOTED > {out}'\n",
            env = env_file.display(),
            out = marker.display()
        ),
    );
    let mut supervisor = sandbox.supervisor();

    supervisor.start("consumer").expect("consumer start");
    wait_for_path(&marker);
    let content = std::fs::read_to_string(&marker).unwrap();
    assert_eq!(content.trim(), "from-file:has space");
}

#[test]
fn inline_entries_override_the_environment_file() {
    let sandbox = Sandbox::new();
    let env_file = sandbox.path().join("layered.env");
    std::fs::write(&env_file, "WINNER=file\n").expect("write env file");

    let marker = sandbox.path().join("layered.txt");
    sandbox.write_unit(
        "layered.service",
        &format!(
            "[Service]\nType=oneshot\nEnvironmentFile={env}\nEnvironment=WINNER=inline\nExecStart=/bin/sh -c 'echo $WINNER > {out}'\n",
            env = env_file.display(),
            out = marker.display()
        ),
    );
    let mut supervisor = sandbox.supervisor();

    supervisor.start("layered").expect("layered start");
    wait_for_path(&marker);
    assert_eq!(
        std::fs::read_to_string(&marker).unwrap().trim(),
        "inline"
    );
}

#[test]
fn missing_optional_environment_file_is_not_fatal() {
    let sandbox = Sandbox::new();
    sandbox.write_unit(
        "optional.service",
        "[Service]\nType=oneshot\nEnvironmentFile=-/definitely/not/here\nExecStart=/bin/true\n",
    );
    let mut supervisor = sandbox.supervisor();
    supervisor.start("optional").expect("optional env file");
}

#[test]
fn socket_activation_arguments_are_stripped_before_launch() {
    let sandbox = Sandbox::new();
    sandbox.write_unit(
        "listener.service",
        "[Service]\nType=simple\nExecStart=/bin/echo -H fd:// ready\nRemainAfterExit=yes\n",
    );
    let mut supervisor = sandbox.supervisor();

    supervisor.start("listener").expect("listener start");
    let log = sandbox
        .store()
        .read_log_tail("listener.service", 10)
        .expect("log exists");
    assert!(
        log.iter().any(|line| line == "ready"),
        "fd:// listener args should be gone: {log:?}"
    );
}
