// Integration tests for the `ale` binary's exit-code contract (spec §6):
// 0 on success, 1 on a runtime panic, 2 on a reader/compile error.

use std::io::Write;
use std::process::{Command, Stdio};

fn run_stdin(src: &str) -> std::process::ExitStatus {
    let mut child = Command::new(env!("CARGO_BIN_EXE_ale"))
        .arg("run")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn ale binary");
    child.stdin.take().unwrap().write_all(src.as_bytes()).unwrap();
    child.wait_with_output().expect("failed to wait on ale binary").status
}

#[test]
fn successful_program_exits_zero() {
    let status = run_stdin("(+ 1 2)");
    assert_eq!(status.code(), Some(0));
}

#[test]
fn raised_value_exits_one() {
    let status = run_stdin("(raise 'boom)");
    assert_eq!(status.code(), Some(1));
}

#[test]
fn unbalanced_parens_exit_two() {
    let status = run_stdin("(+ 1 2");
    assert_eq!(status.code(), Some(2));
}

#[test]
fn unbound_symbol_is_a_compile_error_and_exits_two() {
    let status = run_stdin("(totally-unbound-name 1 2)");
    assert_eq!(status.code(), Some(2));
}
