//! Exit codes and output of the speed test binary.

use std::process::{Command, Output};

fn speed_test(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_scope-stream-speed"))
        .args(args)
        .output()
        .unwrap()
}

#[test]
fn unknown_argument_exits_with_1() {
    let output = speed_test(&["--bogus"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(!output.stderr.is_empty());
}

#[test]
fn help_exits_with_0() {
    let output = speed_test(&["-h"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("--duration"));
}

#[test]
fn zero_duration_exits_with_1() {
    let output = speed_test(&["-d", "0"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn completed_run_exits_with_0_at_100_percent() {
    let output = speed_test(&["-d", "0.01", "-f", "200000", "-l", "1000"]);
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Data type: float"));
    assert!(stdout.lines().any(|line| line == "100.0 %"), "{stdout}");
}

#[test]
fn unknown_serial_exits_with_1() {
    let output = speed_test(&["-s", "42", "-d", "0.01"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("42"));
}
