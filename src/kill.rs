//! Best-effort signal delivery and non-blocking reap of a run's child.

use crate::adapter::PipeBackend;
use nix::sys::signal::Signal;
use nix::unistd::{getpgid, Pid};
use tracing::warn;

/// Send `signal` to each pid in `pids`, optionally also to its process
/// group. Missing-process errors (`ESRCH`) are silent; anything else is
/// logged and swallowed — killing is always best-effort, never fatal.
pub fn killtasks(pids: &[i32], signal: Signal, kill_pgid: bool) {
    for &raw_pid in pids {
        let pid = Pid::from_raw(raw_pid);

        if kill_pgid {
            match getpgid(Some(pid)) {
                Ok(pgid) => send_signal(pgid, signal),
                Err(e) => warn!(pid = raw_pid, error = %e, "could not determine process group"),
            }
        }

        send_signal(pid, signal);
    }
}

fn send_signal(pid: Pid, signal: Signal) {
    if let Err(e) = nix::sys::signal::kill(pid, signal) {
        if e == nix::errno::Errno::ESRCH {
            return;
        }
        warn!(pid = pid.as_raw(), error = %e, "failed to deliver signal");
    }
}

/// Kill the backend's child (and its process group) and reap it
/// non-blockingly.
pub async fn stop_tasks(backend: &mut PipeBackend) {
    if let Some(pid) = backend.pid() {
        killtasks(&[pid as i32], Signal::SIGKILL, true);
    }
    let _ = backend.try_wait().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn killing_a_nonexistent_pid_is_silent() {
        // A pid this large is virtually guaranteed not to exist; this must
        // not panic or log at error severity.
        killtasks(&[i32::MAX - 1], Signal::SIGKILL, false);
    }
}
