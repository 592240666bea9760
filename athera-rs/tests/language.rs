//! End-to-end checks of the language through the public interpreter API.

use std::fs;

use athera::script::{Fault, Interpreter, RunError, Value};

fn run(src: &str) -> Interpreter {
    let mut interp = Interpreter::new();
    interp
        .exec_source(src)
        .unwrap_or_else(|f| panic!("unexpected fault: {f}"));
    interp
}

#[test]
fn arithmetic_and_concatenation() {
    let interp = run(
        "set a = 2\nset b = 3\nset c = a + b\nset d = a + 1.5\nset e = \"n=\" + c",
    );
    assert_eq!(interp.var("c"), Some(&Value::Int(5)));
    assert_eq!(interp.var("d"), Some(&Value::Float(3.5)));
    assert_eq!(interp.var("e"), Some(&Value::Str("n=5".into())));
}

#[test]
fn greeter_task_binds_and_releases_param() {
    let interp = run("task greeter with name:\n    greet \"Hello, \" + name\nrun greeter \"Ada\"");
    assert_eq!(interp.output, vec!["Hello, Ada"]);
    assert_eq!(interp.var("name"), None);
    assert!(interp.has_task("greeter"));
    assert_eq!(interp.task("greeter").map(|t| t.params.clone()), Some(vec!["name".to_string()]));
}

#[test]
fn repeat_each_over_literal_list() {
    let interp = run("repeat each n in [1, 2, 3]:\n    greet n");
    assert_eq!(interp.output, vec!["1", "2", "3"]);
    assert_eq!(interp.var("n"), Some(&Value::Int(3)));
}

#[test]
fn nested_blocks_follow_indentation() {
    let src = "\
task outer:
    repeat 2 times:
        greet in
    greet out
run outer
greet done";
    assert_eq!(run(src).output, vec!["in", "in", "out", "done"]);
}

#[test]
fn protect_runs_handle_once() {
    let src = "\
protect:
    greet before
    set bad = true + 1
    set bad = true + 2
handle:
    greet recovered
greet after";
    let interp = run(src);
    assert_eq!(
        interp.output,
        vec![
            "before",
            "[Error caught: cannot add boolean and integer]",
            "recovered",
            "after",
        ]
    );
    assert!(interp.error_occurred());
    assert_eq!(interp.var("bad"), None);
}

#[test]
fn uncaught_fault_stops_program() {
    let mut interp = Interpreter::new();
    let fault = interp.exec_source("greet one\nset x = [1] + 2\ngreet two").unwrap_err();
    assert_eq!(fault, Fault::TypeMismatch { left: "list", right: "integer" });
    assert_eq!(interp.output, vec!["one"]);
}

#[test]
fn parallel_units_do_not_touch_caller_variables() {
    let src = "\
set v = 1
task bump:
    set v = 99
    greet v
task other:
    greet other
run parallel bump, other, ghost
greet v";
    let interp = run(src);
    assert_eq!(
        interp.output,
        vec![
            "[Warning: task ghost not found for parallel run]",
            "99",
            "other",
            "[Parallel execution complete: 2 tasks]",
            "1",
        ]
    );
    assert_eq!(interp.var("v"), Some(&Value::Int(1)));
}

#[test]
fn backup_of_missing_source_still_creates_destination() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    let missing = dir.path().join("missing.txt");
    let src = format!("backup \"{}\" to \"{}\"", missing.display(), out.display());

    let interp = run(&src);
    assert!(out.is_dir());
    assert_eq!(
        interp.output,
        vec![format!("[Backup error: source not found: {}]", missing.display())]
    );
}

#[test]
fn backup_copies_file_into_destination() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("notes.txt");
    fs::write(&file, "keep me").unwrap();
    let out = dir.path().join("archive");
    let src = format!("set f = \"{}\"\nbackup f to \"{}\"", file.display(), out.display());

    run(&src);
    assert_eq!(fs::read_to_string(out.join("notes.txt")).unwrap(), "keep me");
}

#[test]
fn run_file_executes_and_reports_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hello.ath");
    fs::write(&path, "set who = \"world\"\ngreet \"hello \" + who\n").unwrap();

    let mut interp = Interpreter::new();
    interp.run_file(&path).unwrap();
    assert_eq!(interp.output, vec!["hello world"]);

    let err = interp.run_file(dir.path().join("nope.ath")).unwrap_err();
    assert!(matches!(err, RunError::Io { .. }));
}

#[test]
fn modules_load_from_configured_path() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("helpers_for_test.ath"),
        "task shout with s:\n    greet text.upper s\n",
    )
    .unwrap();

    let mut interp = Interpreter::new();
    interp.add_module_path(dir.path());
    interp.exec_source("use helpers_for_test\nrun shout \"hey\"").unwrap();
    assert!(interp.is_imported("helpers_for_test"));
    assert_eq!(interp.output.last().map(String::as_str), Some("HEY"));
    assert!(interp.output[0].starts_with("[Imported module: helpers_for_test from "));
}

#[test]
fn json_and_dict_round_trip() {
    let src = "\
set m = {\"name\": \"Ada\", \"langs\": [\"en\", \"fr\"]}
set raw = json.stringify m
set back = json.parse raw
set m2 = dict.set back, \"born\", 1815
greet raw
greet dict.get m2, \"born\"
greet dict.keys m2";
    let interp = run(src);
    assert_eq!(
        interp.output,
        vec![r#"{"langs":["en","fr"],"name":"Ada"}"#, "1815", "[born, langs, name]"]
    );
}

#[test]
fn builtin_errors_are_reported_inline() {
    let interp = run("set q = math.div 1, 0\ngreet q");
    assert_eq!(interp.output, vec!["[Error: division by zero]", "nil"]);
}

#[test]
fn return_value_is_visible_after_run() {
    let interp = run("task answer:\n    return 6 + 36\nrun answer");
    assert_eq!(interp.return_value(), &Value::Int(42));
}
