//! `TimeoutHook` — kills the child once wall-clock elapsed exceeds a
//! threshold, surfacing sentinel code 123.

use crate::adapter::PipeBackend;
use crate::loop_driver::{ChunkHook, LoopSignal};
use async_trait::async_trait;
use std::time::{Duration, Instant};

pub struct TimeoutHook {
    start: Instant,
    timeout: Duration,
}

impl TimeoutHook {
    pub fn new(timeout: Duration) -> Self {
        Self {
            start: Instant::now(),
            timeout,
        }
    }
}

#[async_trait]
impl ChunkHook for TimeoutHook {
    async fn on_chunk(
        &mut self,
        _chunk: &[u8],
        _output_so_far: &[u8],
        backend: &mut PipeBackend,
    ) -> Option<LoopSignal> {
        if self.start.elapsed() > self.timeout {
            crate::kill::stop_tasks(backend).await;
            Some(LoopSignal::Timeout)
        } else {
            None
        }
    }
}
