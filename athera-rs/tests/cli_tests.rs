//! Tests that drive the `athera` binary.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

fn athera_binary() -> PathBuf {
    // CARGO_BIN_EXE_athera is set by cargo test infrastructure.
    PathBuf::from(env!("CARGO_BIN_EXE_athera"))
}

/// Run the binary in `dir` with config loading disabled.
fn athera(dir: &Path, args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(athera_binary())
        .arg("-f")
        .args(args)
        .current_dir(dir)
        .env_remove("ATHERA_PATH")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn athera");
    child
        .stdin
        .take()
        .expect("stdin piped")
        .write_all(stdin.as_bytes())
        .expect("write stdin");
    child.wait_with_output().expect("wait for athera")
}

fn stdout_lines(out: &Output) -> Vec<String> {
    String::from_utf8_lossy(&out.stdout).lines().map(str::to_owned).collect()
}

#[test]
fn run_prints_program_output() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("hello.ath"),
        "task greeter with name:\n    greet \"Hello, \" + name\nrun greeter \"Ada\"\n",
    )
    .unwrap();

    let out = athera(dir.path(), &["run", "hello.ath"], "");
    assert_eq!(out.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(stdout_lines(&out), vec!["Hello, Ada"]);
}

#[test]
fn missing_file_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let out = athera(dir.path(), &["run", "absent.ath"], "");
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("absent.ath"));
}

#[test]
fn uncaught_fault_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bad.ath"), "greet first\nset x = 1 + true\ngreet never\n").unwrap();

    let out = athera(dir.path(), &["run", "bad.ath"], "");
    assert_eq!(out.status.code(), Some(2));
    assert_eq!(stdout_lines(&out), vec!["first"]);
    assert!(String::from_utf8_lossy(&out.stderr).contains("cannot add integer and boolean"));
}

#[test]
fn no_command_prints_usage() {
    let dir = tempfile::tempdir().unwrap();
    let out = athera(dir.path(), &[], "");
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Usage:"));
}

#[test]
fn unknown_command_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let out = athera(dir.path(), &["serve"], "");
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("unknown command: serve"));
}

#[test]
fn repl_reads_piped_input() {
    let dir = tempfile::tempdir().unwrap();
    let out = athera(
        dir.path(),
        &["repl"],
        "set x = 40\nrepeat 2 times:\n    greet x + 1\n\nset y = x + true\ngreet still here\nexit\n",
    );
    assert_eq!(out.status.code(), Some(0));
    let lines = stdout_lines(&out);
    assert!(lines[0].starts_with("Athera REPL"));
    assert_eq!(&lines[2..], ["41", "41", "still here", "Goodbye."]);
    assert!(String::from_utf8_lossy(&out.stderr).contains("athera: cannot add integer and boolean"));
}

#[test]
fn explicit_config_file_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("custom.rc"), "set motto = \"configured\"\n").unwrap();
    std::fs::write(dir.path().join("motto.ath"), "greet motto\n").unwrap();

    let out = Command::new(athera_binary())
        .args(["-fcustom.rc", "run", "motto.ath"])
        .current_dir(dir.path())
        .output()
        .expect("failed to run athera");
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(stdout_lines(&out), vec!["configured"]);
}

#[test]
fn module_dir_flag_extends_search_path() {
    let dir = tempfile::tempdir().unwrap();
    let lib = dir.path().join("lib");
    std::fs::create_dir(&lib).unwrap();
    std::fs::write(lib.join("tools.ath"), "task ping:\n    greet pong\n").unwrap();
    std::fs::write(dir.path().join("main.ath"), "use tools\nrun ping\n").unwrap();

    let out = athera(dir.path(), &["-Mlib", "run", "main.ath"], "");
    assert_eq!(out.status.code(), Some(0));
    let lines = stdout_lines(&out);
    assert!(lines[0].starts_with("[Imported module: tools from "));
    assert_eq!(lines[1], "pong");
}

#[test]
fn deep_recursion_reaches_depth_limit() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("deep.ath"),
        "task dive with n:\n    set xs = [n, [n, n]]\n    check xs -> greet level\n    repeat 1 times:\n        protect:\n            run dive n\nrun dive 1\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("flat.ath"), "task dive:\n    repeat 1 times:\n        run dive\nrun dive\n").unwrap();

    // The innermost protect catches the fault; the program finishes normally.
    let out = athera(dir.path(), &["run", "deep.ath"], "");
    assert_eq!(out.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let lines = stdout_lines(&out);
    assert_eq!(lines.iter().filter(|l| *l == "level").count(), 200);
    assert!(lines.iter().any(|l| l.contains("maximum call depth of 200")));

    let out = athera(dir.path(), &["run", "flat.ath"], "");
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("task 'dive' exceeded the maximum call depth of 200"));
}
