//! `ProcessAdapter` — thin wrapper over spawn + pipe I/O.
//!
//! The two ways of consuming a child's output are really one spawn
//! strategy (`tokio::process`) with two *read* strategies layered over it:
//! a single blocking-style wait+drain ([`PipeBackend::wait`] +
//! [`PipeBackend::read_all_remaining`]) for runs that just want a final
//! result, and incremental [`PipeBackend::recv_some`] for anything that
//! needs to react mid-run (timeouts, Q&A automation, chunk logging).
//!
//! stdout and stderr are captured on separate OS pipes and interleaved at
//! the chunk level as they arrive, rather than byte-merged at the fd level
//! — the two streams still appear in the order produced for any
//! reasonably-sized write, which is all a merged-stream caller needs.

use crate::error::RunError;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::warn;

/// Grace window `recv_some` waits for data already sitting in a pipe before
/// giving up and returning empty — the async analogue of a near-zero-
/// timeout `select(2)` on the read fd.
const RECV_POLL_GRACE: Duration = Duration::from_millis(5);

/// A spawned child with piped stdout+stderr (read together, merged into one
/// logical stream) and optionally piped stdin.
pub struct PipeBackend {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

/// Spawn-time parameters shared by every pipe-backed variant.
pub struct SpawnParams<'a> {
    pub argv: &'a [String],
    pub shellcmd: Option<&'a str>,
    pub use_shell: bool,
    pub shell_executable: Option<&'a std::path::Path>,
    pub env: Option<&'a std::collections::HashMap<String, String>>,
    pub want_stdin: bool,
    /// When set, the child's stdout is redirected straight to this file
    /// instead of being piped to us: the engine never sees the bytes, so
    /// `recv_some`/`read_all_remaining` report nothing.
    pub stdout_file: Option<std::fs::File>,
}

fn build_command(params: &mut SpawnParams<'_>) -> Command {
    let mut cmd = if params.use_shell {
        let shell = params
            .shell_executable
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| std::path::PathBuf::from("/bin/sh"));
        let mut c = Command::new(shell);
        c.arg("-c").arg(params.shellcmd.unwrap_or_default());
        c
    } else {
        let mut iter = params.argv.iter();
        let program = iter.next().map(String::as_str).unwrap_or_default();
        let mut c = Command::new(program);
        c.args(iter);
        c
    };

    if let Some(env) = params.env {
        cmd.env_clear();
        cmd.envs(env);
    }

    // stderr is merged into stdout by default, including when stdout is
    // redirected to a file — the file gets both streams.
    match params.stdout_file.take() {
        Some(file) => {
            let stderr_file = file.try_clone().expect("redirect file handle must be clonable");
            cmd.stdout(Stdio::from(file));
            cmd.stderr(Stdio::from(stderr_file));
        }
        None => {
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
        }
    }
    cmd.stdin(if params.want_stdin {
        Stdio::piped()
    } else {
        Stdio::null()
    });

    // Isolate the child in its own process group so a group-kill (timeout,
    // QA miss-count bailout) doesn't reach back into our own process group.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // SAFETY: setsid() is async-signal-safe and runs before exec in the
        // forked child; it touches no shared Rust state.
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }
    }

    cmd
}

impl PipeBackend {
    pub fn spawn(mut params: SpawnParams<'_>) -> Result<Self, RunError> {
        let mut cmd = build_command(&mut params);
        let display = params
            .shellcmd
            .map(str::to_string)
            .unwrap_or_else(|| params.argv.join(" "));

        let mut child = cmd
            .spawn()
            .map_err(|source| RunError::SpawnFailed { cmd: display, source })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        Ok(Self {
            child,
            stdin,
            stdout,
            stderr,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Non-blocking-ish read: races stdout and stderr against a short grace
    /// window and returns whichever chunk becomes available, or empty bytes
    /// if neither produced anything in time (never blocks indefinitely,
    /// never fails — transient read errors also yield empty, like the
    /// original's `recv_some`).
    pub async fn recv_some(&mut self, max_bytes: usize) -> Vec<u8> {
        let max_bytes = max_bytes.max(1);
        let mut stdout_buf = vec![0u8; max_bytes];
        let mut stderr_buf = vec![0u8; max_bytes];

        let stdout_fut = async {
            match self.stdout.as_mut() {
                Some(s) => s.read(&mut stdout_buf).await,
                None => std::future::pending().await,
            }
        };
        let stderr_fut = async {
            match self.stderr.as_mut() {
                Some(s) => s.read(&mut stderr_buf).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            res = stdout_fut => match res {
                Ok(0) | Err(_) => Vec::new(),
                Ok(n) => { stdout_buf.truncate(n); stdout_buf }
            },
            res = stderr_fut => match res {
                Ok(0) | Err(_) => Vec::new(),
                Ok(n) => { stderr_buf.truncate(n); stderr_buf }
            },
            _ = tokio::time::sleep(RECV_POLL_GRACE) => Vec::new(),
        }
    }

    /// Write as much of `bytes` as the pipe accepts right now, returning the
    /// number of bytes actually written (may be short of `bytes.len()`) or
    /// the I/O error that aborted the write.
    pub async fn send_all(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Ok(0);
        };
        let n = stdin.write(bytes).await?;
        stdin.flush().await?;
        Ok(n)
    }

    pub fn close_stdin(&mut self) {
        self.stdin = None;
    }

    pub fn close_stdout(&mut self) {
        self.stdout = None;
        self.stderr = None;
    }

    pub async fn try_wait(&mut self) -> Option<i32> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(exit_code_of(status)),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "try_wait failed");
                None
            }
        }
    }

    pub async fn wait(&mut self) -> i32 {
        match self.child.wait().await {
            Ok(status) => exit_code_of(status),
            Err(e) => {
                warn!(error = %e, "wait failed");
                -1
            }
        }
    }

    /// Blocking full drain after exit. Stdout is fully drained first, then
    /// stderr; both streams are typically exhausted by the time the child
    /// has exited, so tail ordering between the two is a minor, documented
    /// approximation.
    pub async fn read_all_remaining(&mut self) -> Vec<u8> {
        let mut buf = Vec::new();
        if let Some(stdout) = self.stdout.as_mut() {
            let _ = stdout.read_to_end(&mut buf).await;
        }
        if let Some(stderr) = self.stderr.as_mut() {
            let _ = stderr.read_to_end(&mut buf).await;
        }
        buf
    }

    #[cfg(test)]
    fn kill_best_effort(&mut self) {
        let _ = self.child.start_kill();
    }
}

fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or_else(|| {
        warn!("process terminated by signal, using exit code 1");
        1
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_echo_and_drain() {
        let params = SpawnParams {
            argv: &["echo".to_string(), "hi".to_string()],
            shellcmd: None,
            use_shell: false,
            shell_executable: None,
            env: None,
            want_stdin: false,
            stdout_file: None,
        };
        let mut backend = PipeBackend::spawn(params).expect("spawn");
        let code = backend.wait().await;
        let out = backend.read_all_remaining().await;
        assert_eq!(code, 0);
        assert_eq!(String::from_utf8_lossy(&out), "hi\n");
    }

    #[tokio::test]
    async fn recv_some_returns_empty_quickly_when_no_data() {
        let params = SpawnParams {
            argv: &["sleep".to_string(), "1".to_string()],
            shellcmd: None,
            use_shell: false,
            shell_executable: None,
            env: None,
            want_stdin: false,
            stdout_file: None,
        };
        let mut backend = PipeBackend::spawn(params).expect("spawn");
        let start = std::time::Instant::now();
        let chunk = backend.recv_some(64).await;
        assert!(chunk.is_empty());
        assert!(start.elapsed() < Duration::from_millis(200));
        backend.kill_best_effort();
    }

    #[tokio::test]
    async fn merged_stdout_and_stderr_both_captured() {
        let params = SpawnParams {
            argv: &[
                "sh".to_string(),
                "-c".to_string(),
                "echo out; echo err >&2".to_string(),
            ],
            shellcmd: None,
            use_shell: false,
            shell_executable: None,
            env: None,
            want_stdin: false,
            stdout_file: None,
        };
        let mut backend = PipeBackend::spawn(params).expect("spawn");
        backend.wait().await;
        let out = String::from_utf8_lossy(&backend.read_all_remaining().await).to_string();
        assert!(out.contains("out"));
        assert!(out.contains("err"));
    }
}
