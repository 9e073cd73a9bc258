//! The engine's public entry points.

use crate::core::{self, FailureLogPolicy, RunCore, RunResult};
use crate::error::RunError;
use crate::loop_driver::ChunkHook;
use crate::options::{Command, LoopTiming, RunOptions};
use crate::pty::{self, PtyHandle};
use crate::qa::{Answers, QaEngine, QaTable};
use crate::sinks::{LoggerSink, StdoutSink};
use crate::timeout::TimeoutHook;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default: no-shell, blocking, non-zero exit logged at `error`.
pub async fn run(cmd: impl Into<Command>, options: RunOptions) -> Result<RunResult, RunError> {
    let command = cmd.into();
    core::run_blocking(RunCore {
        command: &command,
        options: &options,
        failure_policy: FailureLogPolicy::Error,
    })
    .await
}

/// Same as [`run`] but demotes non-zero-exit logging to `debug`.
pub async fn noworries(cmd: impl Into<Command>, options: RunOptions) -> Result<RunResult, RunError> {
    let command = cmd.into();
    core::run_blocking(RunCore {
        command: &command,
        options: &options,
        failure_policy: FailureLogPolicy::Debug,
    })
    .await
}

async fn run_loop_variant(
    cmd: impl Into<Command>,
    options: RunOptions,
    hooks: Vec<Box<dyn ChunkHook>>,
) -> Result<RunResult, RunError> {
    let command = cmd.into();
    core::run_loop(
        RunCore {
            command: &command,
            options: &options,
            failure_policy: FailureLogPolicy::Error,
        },
        LoopTiming::default(),
        hooks,
    )
    .await
}

/// Async back-end, loop-driven, no side-sink.
pub async fn asyncrun(cmd: impl Into<Command>, options: RunOptions) -> Result<RunResult, RunError> {
    run_loop_variant(cmd, options, Vec::new()).await
}

/// Async back-end, loop-driven, each chunk also logged through `tracing`.
pub async fn asyncloop(
    cmd: impl Into<Command>,
    options: RunOptions,
    log_level: Level,
) -> Result<RunResult, RunError> {
    let hooks: Vec<Box<dyn ChunkHook>> = vec![Box::new(LoggerSink::new(log_level))];
    run_loop_variant(cmd, options, hooks).await
}

/// Async back-end, loop-driven, each chunk also echoed to our own stdout.
pub async fn async_to_stdout(
    cmd: impl Into<Command>,
    options: RunOptions,
) -> Result<RunResult, RunError> {
    let hooks: Vec<Box<dyn ChunkHook>> = vec![Box::new(StdoutSink)];
    run_loop_variant(cmd, options, hooks).await
}

/// Kills the child (and its process group) once `timeout_secs` elapses,
/// returning sentinel code 123.
pub async fn timeout(
    cmd: impl Into<Command>,
    timeout_secs: f64,
    options: RunOptions,
) -> Result<RunResult, RunError> {
    let hooks: Vec<Box<dyn ChunkHook>> =
        vec![Box::new(TimeoutHook::new(Duration::from_secs_f64(timeout_secs)))];
    run_loop_variant(cmd, options, hooks).await
}

/// Redirects the child's stdout straight to `filename`; returned output is
/// always empty.
pub async fn run_file(
    cmd: impl Into<Command>,
    filename: impl AsRef<Path>,
    options: RunOptions,
) -> Result<RunResult, RunError> {
    let command = cmd.into();
    let file = core::open_redirect_file(filename.as_ref())?;
    core::run_blocking_redirected(
        RunCore {
            command: &command,
            options: &options,
            failure_policy: FailureLogPolicy::Error,
        },
        Some(file),
    )
    .await
}

/// Spawns with all three standard fds bound to a pty slave and returns
/// immediately: the engine never reads the pty, the caller attaches to
/// `PtyHandle::master` directly.
pub async fn run_pty(cmd: impl Into<Command>, options: RunOptions) -> Result<PtyHandle, RunError> {
    let command = cmd.into();
    core::validate_command(&command)?;
    let _guard = core::enter_startpath(&options)?;
    let (argv, shellcmd) = core::compose(&command, options.use_shell);
    pty::spawn_with_pty(&argv, shellcmd.as_deref(), options.use_shell, options.shell.as_deref())
}

/// Dialogue table passed to the QA variants.
#[derive(Default)]
pub struct QaSpec {
    pub qa: HashMap<String, Answers>,
    pub qa_reg: HashMap<String, Answers>,
    pub no_qa: Vec<String>,
    pub add_newline: bool,
}

async fn run_qa_variant(
    cmd: impl Into<Command>,
    spec: QaSpec,
    mut options: RunOptions,
    sink: Option<Box<dyn ChunkHook>>,
) -> Result<RunResult, RunError> {
    let command = cmd.into();
    // QA writes continuously through stdin, so the default close-after-feed
    // behavior must be suppressed.
    options.keep_stdin_open = true;

    let table = QaTable::build(&spec.qa, &spec.qa_reg, &spec.no_qa, spec.add_newline)?;
    let mut hooks: Vec<Box<dyn ChunkHook>> = Vec::new();
    if let Some(sink) = sink {
        hooks.push(sink);
    }
    hooks.push(Box::new(QaEngine::new(table)));

    core::run_loop(
        RunCore {
            command: &command,
            options: &options,
            failure_policy: FailureLogPolicy::Error,
        },
        LoopTiming::default(),
        hooks,
    )
    .await
}

/// QA with no side-sink: sentinel code 124 on miss-count exceeded.
pub async fn qa(cmd: impl Into<Command>, spec: QaSpec, options: RunOptions) -> Result<RunResult, RunError> {
    run_qa_variant(cmd, spec, options, None).await
}

/// QA with each chunk also logged through `tracing`.
pub async fn qa_log(
    cmd: impl Into<Command>,
    spec: QaSpec,
    options: RunOptions,
    log_level: Level,
) -> Result<RunResult, RunError> {
    run_qa_variant(cmd, spec, options, Some(Box::new(LoggerSink::new(log_level)))).await
}

/// QA with each chunk also echoed to our own stdout.
pub async fn qastdout(
    cmd: impl Into<Command>,
    spec: QaSpec,
    options: RunOptions,
) -> Result<RunResult, RunError> {
    run_qa_variant(cmd, spec, options, Some(Box::new(StdoutSink))).await
}
