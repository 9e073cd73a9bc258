//! End-to-end scenarios exercising the public API against a real shell
//! rather than mocking the child.

use procrun::api::QaSpec;
use procrun::qa::Answers;
use procrun::{noworries, qa, run, run_file, run_pty, timeout, RunOptions};
use std::collections::HashMap;
use std::os::fd::AsRawFd;
use std::time::{Duration, Instant};

#[tokio::test]
async fn round_trip_output() {
    let result = run(["echo", "hi"], RunOptions::default()).await.unwrap();
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.output, "hi\n");
}

#[tokio::test]
async fn empty_command_is_rejected_before_spawn() {
    let err = run(Vec::<String>::new(), RunOptions::default()).await.unwrap_err();
    assert!(matches!(err, procrun::RunError::NoCommand));
}

#[tokio::test]
async fn nonzero_exit_is_reported_not_errored() {
    let result = run(["sh", "-c", "exit 7"], RunOptions::default()).await.unwrap();
    assert_eq!(result.exit_code, 7);
    assert_eq!(result.output, "");
}

#[tokio::test]
async fn noworries_still_reports_nonzero_exit() {
    let result = noworries(["sh", "-c", "exit 3"], RunOptions::default())
        .await
        .unwrap();
    assert_eq!(result.exit_code, 3);
}

#[tokio::test]
async fn merged_streams_appear_in_one_buffer() {
    let result = run(
        ["sh", "-c", "echo out; echo err >&2"],
        RunOptions::default(),
    )
    .await
    .unwrap();
    assert!(result.output.contains("out"));
    assert!(result.output.contains("err"));
}

#[tokio::test]
async fn shell_disable_tokenizes_quoted_string() {
    let result = run("echo 'a b'", RunOptions::default()).await.unwrap();
    assert_eq!(result.output, "a b\n");
}

#[tokio::test]
async fn timeout_sentinel_kills_and_returns_empty_output() {
    let start = Instant::now();
    let result = timeout(["sleep", "5"], 0.2, RunOptions::default())
        .await
        .unwrap();
    assert_eq!(result.exit_code, 123);
    assert_eq!(result.output, "");
    assert!(start.elapsed() < Duration::from_millis(1300));
}

#[tokio::test]
async fn start_path_is_restored_after_run() {
    let before = std::env::current_dir().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let mut options = RunOptions::default();
    options.startpath = Some(dir.path().to_path_buf());
    run(["true"], options).await.unwrap();

    assert_eq!(std::env::current_dir().unwrap(), before);
}

#[tokio::test]
async fn start_path_is_restored_even_on_failure() {
    let before = std::env::current_dir().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let mut options = RunOptions::default();
    options.startpath = Some(dir.path().to_path_buf());
    let result = run(["sh", "-c", "exit 1"], options).await.unwrap();

    assert_eq!(result.exit_code, 1);
    assert_eq!(std::env::current_dir().unwrap(), before);
}

#[tokio::test]
async fn run_file_redirects_stdout_and_returns_empty_output() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.txt");

    let result = run_file(["printf", "abc"], &target, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.output, "");
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "abc");
}

#[tokio::test]
async fn run_file_overwrites_existing_regular_file() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.txt");
    std::fs::write(&target, "stale content that should be gone").unwrap();

    run_file(["printf", "fresh"], &target, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(&target).unwrap(), "fresh");
}

#[tokio::test]
async fn run_file_fails_cleanly_on_directory_target() {
    let dir = tempfile::tempdir().unwrap();
    let err = run_file(["printf", "abc"], dir.path(), RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, procrun::RunError::FileRedirectIsDirectory(_)));
}

#[tokio::test]
async fn qa_answers_a_single_prompt() {
    let mut spec = QaSpec::default();
    spec.qa.insert("password: ".to_string(), Answers::One("hunter2".to_string()));
    spec.add_newline = true;

    let result = qa(
        ["sh", "-c", "read -p 'password: ' x; echo got:$x"],
        spec,
        RunOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(result.exit_code, 0);
    assert!(result.output.contains("hunter2"));
}

#[tokio::test]
async fn qa_cycles_through_answer_list() {
    let mut spec = QaSpec::default();
    spec.qa.insert(
        "Q: ".to_string(),
        Answers::Many(vec!["A".to_string(), "B".to_string()]),
    );
    spec.add_newline = true;

    let script = "for i in 1 2 3; do read -p 'Q: ' x; echo got:$x; done";
    let result = qa(["sh", "-c", script], spec, RunOptions::default())
        .await
        .unwrap();

    assert_eq!(result.exit_code, 0);
    let hits: Vec<&str> = result
        .output
        .lines()
        .filter(|l| l.starts_with("got:"))
        .collect();
    assert_eq!(hits, vec!["got:A", "got:B", "got:A"]);
}

/// Slow by construction: miss-count must exceed 20 silent polling
/// iterations at ~1s apiece before the bailout fires.
#[tokio::test]
#[ignore = "takes ~20s: exercises the real LOOP_MAX_MISS_COUNT bailout"]
async fn qa_miss_count_bails_out() {
    let mut spec = QaSpec::default();
    spec.qa.insert("never-matches".to_string(), Answers::One("z".to_string()));

    let result = qa(["yes", "x"], spec, RunOptions::default()).await.unwrap();

    assert_eq!(result.exit_code, 124);
    assert!(result.output.contains('x'));
}

#[tokio::test]
async fn run_pty_returns_immediately_with_a_live_master_fd() {
    let mut handle = run_pty(["echo", "hi"], RunOptions::default()).await.unwrap();
    assert!(handle.master.as_raw_fd() >= 0);
    let status = handle.child.wait().await.unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn env_override_is_visible_to_child() {
    let mut env = HashMap::new();
    env.insert("PROCRUN_TEST_VAR".to_string(), "marker".to_string());
    let mut options = RunOptions::default();
    options.env = Some(env);

    let result = run(["sh", "-c", "echo $PROCRUN_TEST_VAR"], options)
        .await
        .unwrap();
    assert_eq!(result.output, "marker\n");
}
