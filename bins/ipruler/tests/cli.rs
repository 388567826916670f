//! Command-line parsing tests. None of these need root or a netlink socket.

use assert_cmd::Command;
use predicates::prelude::*;

fn ipruler_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ipruler"));
    for var in [
        "MODE",
        "BIND_ADDRESS",
        "API_PORT",
        "CONFIG_PATH",
        "CONFIG_RELOAD_DURATION_SECONDS",
        "ENABLE_PERSISTENCE",
        "LOG_LEVEL",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help() {
    ipruler_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Policy routing reconciler"))
        .stdout(predicate::str::contains("--config-reload-duration-seconds"))
        .stdout(predicate::str::contains("[env: MODE=]"));
}

#[test]
fn test_version() {
    ipruler_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ipruler"));
}

#[test]
fn test_invalid_mode() {
    ipruler_cmd()
        .args(["--mode", "daemon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_invalid_mode_from_env() {
    ipruler_cmd()
        .env("MODE", "daemon")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_invalid_port() {
    ipruler_cmd()
        .args(["--api-port", "70000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}
