//! CLI arg handling tests for the procmon client
use assert_cmd::prelude::*;
use std::process::Command;

#[test]
fn help_lists_flags_and_commands() {
    let output = Command::cargo_bin("procmon")
        .expect("binary exists")
        .arg("--help")
        .output()
        .expect("run procmon --help");
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(
        text.contains("--host") && text.contains("-H") && text.contains("--port"),
        "help text missing expected flags\n{text}"
    );
    assert!(text.contains("suspend <pid>"), "{text}");
}

#[test]
fn bad_command_exits_with_usage_error() {
    let output = Command::cargo_bin("procmon")
        .expect("binary exists")
        .args(["details", "abc"])
        .output()
        .expect("run procmon");
    assert_eq!(output.status.code(), Some(2));
    let text = String::from_utf8_lossy(&output.stderr);
    assert!(text.contains("invalid pid"), "{text}");
}

#[test]
fn invalid_port_is_rejected() {
    let output = Command::cargo_bin("procmon")
        .expect("binary exists")
        .args(["--port", "99999", "processes"])
        .output()
        .expect("run procmon");
    assert_eq!(output.status.code(), Some(2));
}
