//! Integration tests for `jt metrics`, driving the binary against fake
//! interpreters that print canned traces.

mod common;

use common::{fake_interpreter, fake_repo, run_jt, stderr, stdout};

#[test]
fn test_alloc_summary() {
    let repo = fake_repo();
    let ruby = fake_interpreter(repo.path(), "ruby", "echo 'allocated 1024'");

    let output = run_jt(
        repo.path(),
        &ruby,
        &[("METRICS_REPS", "3")],
        &["metrics", "alloc", "-e", "14"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    // Captured runs are not echoed, and stdout is not a terminal so there is no progress.
    assert_eq!(stdout(&output), "1.0 KB, max 1.0 KB\n");
}

#[test]
fn test_alloc_from_gc_log() {
    let repo = fake_repo();
    let ruby = fake_interpreter(
        repo.path(),
        "ruby",
        "echo '[GC (Allocation Failure)  4096K->1024K(251392K), 0.0031 secs]' >&2",
    );

    let output = run_jt(
        repo.path(),
        &ruby,
        &[("METRICS_REPS", "2")],
        &["metrics", "alloc", "--json"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let summary: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("metrics --json should print JSON");
    assert_eq!(summary["mean"], 3072 * 1024);
    assert_eq!(summary["max"], 3072 * 1024);
}

#[test]
fn test_time_summary() {
    let repo = fake_repo();
    let ruby = fake_interpreter(
        repo.path(),
        "ruby",
        "echo 'before-main 1.0'\necho 'before-load 1.0'\necho 'after-load 1.25'\necho 'after-main 1.5'",
    );

    let output = run_jt(
        repo.path(),
        &ruby,
        &[("METRICS_REPS", "2")],
        &["metrics", "time", "-e", "14"],
    );
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let out = stdout(&output);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 5, "unexpected output: {out}");
    assert_eq!(lines[0], "   load 0.25 s");
    assert_eq!(lines[1], "  main 0.5 s");
    assert!(lines[2].starts_with(" jvm "));
    assert!(lines[3].starts_with("total "));
    assert!(lines[4].starts_with("unaccounted "));
}

#[test]
fn test_failed_run_keeps_exit_code() {
    let repo = fake_repo();
    let ruby = fake_interpreter(repo.path(), "ruby", "echo 'allocated 1'\nexit 3");

    let output = run_jt(
        repo.path(),
        &ruby,
        &[("METRICS_REPS", "3")],
        &["metrics", "alloc"],
    );
    assert_eq!(output.status.code(), Some(3));
    assert!(stderr(&output).contains("FAILED"));
    assert!(!stdout(&output).contains("Error during command"));
}

#[test]
fn test_malformed_trace_is_reported() {
    let repo = fake_repo();
    let ruby = fake_interpreter(
        repo.path(),
        "ruby",
        "echo 'before-main 1.0'\necho 'after-parse 1.5'",
    );

    let output = run_jt(
        repo.path(),
        &ruby,
        &[("METRICS_REPS", "1")],
        &["metrics", "time"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("Error during command: "));
    assert!(stderr(&output).contains("parse"));
}

#[test]
fn test_zero_reps_rejected() {
    let repo = fake_repo();
    let ruby = fake_interpreter(repo.path(), "ruby", "echo 'allocated 1'");

    let output = run_jt(
        repo.path(),
        &ruby,
        &[("METRICS_REPS", "0")],
        &["metrics", "alloc"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("METRICS_REPS must be at least 1"));
}
