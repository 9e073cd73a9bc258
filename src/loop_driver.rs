//! `LoopDriver` — replaces a blocking wait with a poll/read loop that
//! drains output in chunks and dispatches each chunk to installed hooks.

use crate::adapter::PipeBackend;
use crate::options::LoopTiming;
use async_trait::async_trait;

/// Carried by a hook to terminate the loop early with a supervisory
/// outcome rather than the child's real exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopSignal {
    /// Timeout expired: sentinel code 123, empty output.
    Timeout,
    /// QA miss-count exceeded: sentinel code 124, full accumulated output.
    QaMissLimit,
}

/// A hook invoked by [`LoopDriver`] once per chunk. Hooks that need to kill
/// the child (timeout, QA bailout) do so themselves via [`crate::kill`]
/// before returning a signal — the driver only stops polling and unwinds.
#[async_trait]
pub trait ChunkHook: Send {
    async fn loop_init(&mut self) {}

    /// `chunk` is the bytes just read (may be empty); `output_so_far` is the
    /// full accumulated buffer including this chunk.
    async fn on_chunk(
        &mut self,
        chunk: &[u8],
        output_so_far: &[u8],
        backend: &mut PipeBackend,
    ) -> Option<LoopSignal>;

    async fn on_chunk_final(&mut self, _remaining: &[u8], _output_so_far: &[u8]) {}
}

/// Outcome of a full loop-drive: either the child ran to completion, or a
/// hook raised a supervisory signal partway through.
pub enum LoopOutcome {
    Exited { exit_code: i32, output: Vec<u8> },
    Signaled { signal: LoopSignal, output: Vec<u8> },
}

pub struct LoopDriver {
    readsize: usize,
    timing: LoopTiming,
}

impl LoopDriver {
    pub fn new(readsize: usize, timing: LoopTiming) -> Self {
        Self { readsize, timing }
    }

    pub async fn run(
        &self,
        backend: &mut PipeBackend,
        hooks: &mut [Box<dyn ChunkHook>],
    ) -> LoopOutcome {
        for hook in hooks.iter_mut() {
            hook.loop_init().await;
        }
        tokio::time::sleep(self.timing.init_delay).await;

        let mut output = Vec::new();
        let mut signal = None;

        loop {
            if backend.try_wait().await.is_some() {
                break;
            }

            let chunk = backend.recv_some(self.readsize).await;
            if !chunk.is_empty() {
                output.extend_from_slice(&chunk);
            }

            for hook in hooks.iter_mut() {
                if let Some(sig) = hook.on_chunk(&chunk, &output, backend).await {
                    signal = Some(sig);
                    break;
                }
            }
            if signal.is_some() {
                break;
            }

            if chunk.is_empty() {
                if backend.try_wait().await.is_some() {
                    break;
                }
                tokio::time::sleep(self.timing.main_delay).await;
            }
        }

        if let Some(signal) = signal {
            // Best-effort reap; the hook already requested the kill.
            let _ = backend.try_wait().await;
            return LoopOutcome::Signaled { signal, output };
        }

        let exit_code = backend.wait().await;
        let remaining = backend.read_all_remaining().await;
        output.extend_from_slice(&remaining);
        for hook in hooks.iter_mut() {
            hook.on_chunk_final(&remaining, &output).await;
        }

        LoopOutcome::Exited { exit_code, output }
    }
}
