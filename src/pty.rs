//! Pty variant: spawn with a pseudo-terminal master/slave pair bound to all
//! three standard fds. The engine never reads from the master — a caller
//! attaches to it directly (interactive sessions, terminal recorders).

use crate::error::RunError;
use nix::pty::openpty;
use nix::unistd::dup;
use std::fs::File;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::process::Stdio;
use tokio::process::{Child, Command};

/// A child spawned with its stdio bound to a pty slave; `master` is handed
/// to the caller for interactive I/O.
pub struct PtyHandle {
    pub child: Child,
    pub master: OwnedFd,
}

// SAFETY: `raw_fd` comes from a successful `dup(2)` call and is uniquely
// owned by the caller at this point, so converting to `OwnedFd` is valid.
fn raw_fd_to_owned_fd(raw_fd: i32) -> OwnedFd {
    unsafe { OwnedFd::from_raw_fd(raw_fd) }
}

pub fn spawn_with_pty(
    argv: &[String],
    shellcmd: Option<&str>,
    use_shell: bool,
    shell_executable: Option<&std::path::Path>,
) -> Result<PtyHandle, RunError> {
    let pty = openpty(None, None).map_err(|source| RunError::SpawnFailed {
        cmd: "openpty".to_string(),
        source: std::io::Error::from(source),
    })?;

    let slave_fd_raw = pty.slave.as_raw_fd();
    let dup_err = |source| RunError::SpawnFailed {
        cmd: "dup pty slave".to_string(),
        source,
    };
    let stdin_fd = dup(slave_fd_raw).map_err(|e| dup_err(std::io::Error::from(e)))?;
    let stdout_fd = dup(slave_fd_raw).map_err(|e| dup_err(std::io::Error::from(e)))?;
    let stderr_fd = dup(slave_fd_raw).map_err(|e| dup_err(std::io::Error::from(e)))?;

    let mut cmd = if use_shell {
        let shell = shell_executable
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| std::path::PathBuf::from("/bin/sh"));
        let mut c = Command::new(shell);
        c.arg("-c").arg(shellcmd.unwrap_or_default());
        c
    } else {
        let mut iter = argv.iter();
        let program = iter.next().map(String::as_str).unwrap_or_default();
        let mut c = Command::new(program);
        c.args(iter);
        c
    };

    cmd.stdin(Stdio::from(File::from(raw_fd_to_owned_fd(stdin_fd))))
        .stdout(Stdio::from(File::from(raw_fd_to_owned_fd(stdout_fd))))
        .stderr(Stdio::from(File::from(raw_fd_to_owned_fd(stderr_fd))));

    // SAFETY: `pre_exec` runs in the forked child before `exec`; only
    // async-signal-safe calls (`setsid`, `ioctl(TIOCSCTTY)`) happen here and
    // nothing touches shared Rust state.
    unsafe {
        cmd.pre_exec(move || {
            libc::setsid();
            if libc::ioctl(slave_fd_raw, libc::TIOCSCTTY as _, 0) == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let display = shellcmd.map(str::to_string).unwrap_or_else(|| argv.join(" "));
    let child = cmd
        .spawn()
        .map_err(|source| RunError::SpawnFailed { cmd: display, source })?;

    Ok(PtyHandle { child, master: pty.master })
}
