//! `RunCore` — lifecycle: build argv/shellcmd, spawn, feed stdin, wait
//! (blocking or loop-driven), cleanup, post-exitcode logging, path restore.

use crate::adapter::{PipeBackend, SpawnParams};
use crate::error::RunError;
use crate::loop_driver::{ChunkHook, LoopDriver, LoopOutcome, LoopSignal};
use crate::options::{posix_split, Command, LoopTiming, RunOptions, QA_MISS_EXIT_CODE, TIMEOUT_EXIT_CODE};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// `(exit_code, output)` returned by every public entry point.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub exit_code: i32,
    pub output: String,
}

/// Whether a non-zero exit is logged at `error` (default) or demoted to
/// `debug` (the "no-worries" variant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureLogPolicy {
    Error,
    Debug,
}

pub struct RunCore<'a> {
    pub command: &'a Command,
    pub options: &'a RunOptions,
    pub failure_policy: FailureLogPolicy,
}

/// Restores the previous working directory on drop, regardless of how the
/// run ended. A restore failure is warned, never fatal.
pub(crate) struct StartPathGuard {
    previous: PathBuf,
}

impl StartPathGuard {
    fn enter(target: &Path) -> Result<Self, RunError> {
        let meta = std::fs::metadata(target)
            .map_err(|_| RunError::StartPathMissing(target.to_path_buf()))?;
        if !meta.is_dir() {
            return Err(RunError::StartPathNotADir(target.to_path_buf()));
        }
        let previous = std::env::current_dir()
            .map_err(|source| RunError::ChdirFailed { path: target.to_path_buf(), source })?;
        std::env::set_current_dir(target)
            .map_err(|source| RunError::ChdirFailed { path: target.to_path_buf(), source })?;
        Ok(Self { previous })
    }
}

impl Drop for StartPathGuard {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.previous) {
            warn!(
                path = %self.previous.display(),
                error = %e,
                "failed to restore working directory after run"
            );
        }
    }
}

/// Enters `options.startpath` if set, returning a guard that restores the
/// previous working directory when dropped. Shared by the blocking/loop
/// lifecycle and by `run_pty`, which spawns and returns without otherwise
/// going through [`prepare`].
pub(crate) fn enter_startpath(options: &RunOptions) -> Result<Option<StartPathGuard>, RunError> {
    match &options.startpath {
        Some(path) => Ok(Some(StartPathGuard::enter(path)?)),
        None => Ok(None),
    }
}

/// Reject a command with no actual program to run: an empty argv, or a
/// literal string that is empty or all whitespace.
pub(crate) fn validate_command(command: &Command) -> Result<(), RunError> {
    let empty = match command {
        Command::Literal(s) => s.trim().is_empty(),
        Command::Argv(tokens) => tokens.is_empty(),
    };
    if empty {
        return Err(RunError::NoCommand);
    }
    Ok(())
}

/// Produce either an argv vector or a single shell command string.
/// Joining a token sequence into a shell string escapes only spaces — the
/// caller was warned at the API boundary that this is not general shell
/// quoting.
pub(crate) fn compose(command: &Command, use_shell: bool) -> (Vec<String>, Option<String>) {
    match (command, use_shell) {
        (Command::Literal(s), true) => (Vec::new(), Some(s.clone())),
        (Command::Literal(s), false) => (posix_split(s), None),
        (Command::Argv(tokens), true) => {
            warn!(
                "composing a shell command from a token sequence: only spaces are escaped, \
                 not other shell metacharacters"
            );
            let joined = tokens
                .iter()
                .map(|t| t.replace(' ', "\\ "))
                .collect::<Vec<_>>()
                .join(" ");
            (Vec::new(), Some(joined))
        }
        (Command::Argv(tokens), false) => (tokens.clone(), None),
    }
}

/// Open a file-redirect target: a pre-existing regular file is overwritten
/// with a warning, a directory target is fatal, and missing parent
/// directories are created.
pub fn open_redirect_file(path: &Path) -> Result<std::fs::File, RunError> {
    if path.is_dir() {
        return Err(RunError::FileRedirectIsDirectory(path.to_path_buf()));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|source| RunError::FileRedirectOpenFailed {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }
    if path.exists() {
        warn!(path = %path.display(), "redirect target exists and will be overwritten");
    }
    std::fs::File::create(path).map_err(|source| RunError::FileRedirectOpenFailed {
        path: path.to_path_buf(),
        source,
    })
}

fn log_outcome(policy: FailureLogPolicy, exit_code: i32, display: &str, output: &str, disable_log: bool) {
    if disable_log {
        return;
    }
    if exit_code == 0 {
        debug!(cmd = %display, "command exited 0");
        return;
    }
    match policy {
        FailureLogPolicy::Error => {
            error!(cmd = %display, exit_code, output = %output, "command exited non-zero")
        }
        FailureLogPolicy::Debug => {
            debug!(cmd = %display, exit_code, output = %output, "command exited non-zero")
        }
    }
}

/// Enter startpath, compose the command, spawn, feed stdin.
async fn prepare(
    core: &RunCore<'_>,
    stdout_file: Option<std::fs::File>,
) -> Result<(PipeBackend, Option<StartPathGuard>, String), RunError> {
    validate_command(core.command)?;
    let guard = enter_startpath(core.options)?;

    let (argv, shellcmd) = compose(core.command, core.options.use_shell);
    let display = shellcmd.clone().unwrap_or_else(|| argv.join(" "));

    let params = SpawnParams {
        argv: &argv,
        shellcmd: shellcmd.as_deref(),
        use_shell: core.options.use_shell,
        shell_executable: core.options.shell.as_deref(),
        env: core.options.env.as_ref(),
        want_stdin: true,
        stdout_file,
    };

    let mut backend = PipeBackend::spawn(params)?;

    if let Some(input) = &core.options.input {
        let written = backend
            .send_all(input)
            .await
            .map_err(RunError::StdinWriteFailed)?;
        if written < input.len() {
            warn!(expected = input.len(), actual = written, "stdin write was short");
        }
    }
    if !core.options.keep_stdin_open {
        backend.close_stdin();
    }

    Ok((backend, guard, display))
}

/// Blocking variant: a single `wait()` followed by one full drain, no
/// polling.
pub async fn run_blocking(core: RunCore<'_>) -> Result<RunResult, RunError> {
    run_blocking_redirected(core, None).await
}

pub async fn run_blocking_redirected(
    core: RunCore<'_>,
    stdout_file: Option<std::fs::File>,
) -> Result<RunResult, RunError> {
    let redirected = stdout_file.is_some();
    let (mut backend, _guard, display) = prepare(&core, stdout_file).await?;

    let exit_code = backend.wait().await;
    let remaining = if redirected {
        Vec::new()
    } else {
        backend.read_all_remaining().await
    };
    backend.close_stdout();

    let output = crate::ascii::ensure_ascii_string(&remaining);
    log_outcome(core.failure_policy, exit_code, &display, &output, core.options.disable_log);

    Ok(RunResult { exit_code, output })
}

/// Loop-driven variant: `LoopDriver` owns the poll/read cycle and
/// dispatches chunks to `hooks`.
pub async fn run_loop(
    core: RunCore<'_>,
    timing: LoopTiming,
    mut hooks: Vec<Box<dyn ChunkHook>>,
) -> Result<RunResult, RunError> {
    let readsize = core.options.readsize;
    let (mut backend, _guard, display) = prepare(&core, None).await?;

    let driver = LoopDriver::new(readsize, timing);
    let outcome = driver.run(&mut backend, &mut hooks).await;
    backend.close_stdout();

    let (exit_code, output) = match outcome {
        LoopOutcome::Exited { exit_code, output } => {
            (exit_code, crate::ascii::ensure_ascii_string(&output))
        }
        LoopOutcome::Signaled {
            signal: LoopSignal::Timeout,
            ..
        } => (TIMEOUT_EXIT_CODE, String::new()),
        LoopOutcome::Signaled {
            signal: LoopSignal::QaMissLimit,
            output,
        } => (QA_MISS_EXIT_CODE, crate::ascii::ensure_ascii_string(&output)),
    };

    log_outcome(core.failure_policy, exit_code, &display, &output, core.options.disable_log);
    Ok(RunResult { exit_code, output })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_command_rejects_empty_argv() {
        let err = validate_command(&Command::Argv(Vec::new())).unwrap_err();
        assert!(matches!(err, RunError::NoCommand));
    }

    #[test]
    fn validate_command_rejects_blank_literal() {
        let err = validate_command(&Command::Literal("   ".to_string())).unwrap_err();
        assert!(matches!(err, RunError::NoCommand));
    }

    #[test]
    fn validate_command_accepts_nonempty_argv() {
        validate_command(&Command::Argv(vec!["echo".to_string()])).unwrap();
    }

    #[test]
    fn compose_no_shell_literal_tokenizes() {
        let (argv, shellcmd) = compose(&Command::Literal("echo 'a b'".to_string()), false);
        assert_eq!(argv, vec!["echo".to_string(), "a b".to_string()]);
        assert!(shellcmd.is_none());
    }

    #[test]
    fn compose_shell_literal_passes_through() {
        let (argv, shellcmd) = compose(&Command::Literal("echo hi".to_string()), true);
        assert!(argv.is_empty());
        assert_eq!(shellcmd.as_deref(), Some("echo hi"));
    }

    #[test]
    fn compose_shell_sequence_escapes_spaces() {
        let (_, shellcmd) = compose(
            &Command::Argv(vec!["echo".to_string(), "a b".to_string()]),
            true,
        );
        assert_eq!(shellcmd.as_deref(), Some("echo a\\ b"));
    }

    #[tokio::test]
    async fn open_redirect_file_rejects_directory() {
        let dir = std::env::temp_dir();
        let err = open_redirect_file(&dir).unwrap_err();
        assert!(matches!(err, RunError::FileRedirectIsDirectory(_)));
    }
}
