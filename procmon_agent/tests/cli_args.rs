//! CLI arg handling tests for procmon_agent
use assert_cmd::prelude::*;
use std::process::Command;

#[test]
fn help_mentions_port_flags() {
    let output = Command::cargo_bin("procmon_agent")
        .expect("binary exists")
        .arg("--help")
        .output()
        .expect("run procmon_agent --help");
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(
        text.contains("Usage:") && text.contains("--port") && text.contains("-p"),
        "help text missing expected flags\n{text}"
    );
}

#[test]
fn invalid_port_is_rejected() {
    let output = Command::cargo_bin("procmon_agent")
        .expect("binary exists")
        .args(["--port", "not-a-port"])
        .output()
        .expect("run procmon_agent");
    assert_eq!(output.status.code(), Some(2));
    let text = String::from_utf8_lossy(&output.stderr);
    assert!(text.contains("--port"), "{text}");
}

#[test]
fn starts_on_ephemeral_port() {
    // Bind to an ephemeral port (-p 0) to avoid conflicts, then kill quickly.
    let mut child = Command::new(env!("CARGO_BIN_EXE_procmon_agent"))
        .args(["-p", "0", "--bind", "127.0.0.1"])
        .spawn()
        .expect("spawn agent");
    std::thread::sleep(std::time::Duration::from_millis(150));
    assert!(child.try_wait().expect("poll agent").is_none(), "agent exited early");
    let _ = child.kill();
    let _ = child.wait();
}
