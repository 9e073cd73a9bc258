//! Composable `on_chunk` sink implementations.
//!
//! `FileSink` isn't here: redirecting the child's stdout straight to a file
//! happens at spawn time (see [`crate::core`]), before the engine ever sees
//! a byte, so there is no chunk to hook.

use crate::adapter::PipeBackend;
use crate::loop_driver::{ChunkHook, LoopSignal};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{event, Level};

/// Emits each chunk at a fixed log level through `tracing`.
pub struct LoggerSink {
    level: Level,
}

impl LoggerSink {
    pub fn new(level: Level) -> Self {
        Self { level }
    }
}

#[async_trait]
impl ChunkHook for LoggerSink {
    async fn on_chunk(
        &mut self,
        chunk: &[u8],
        _output_so_far: &[u8],
        _backend: &mut PipeBackend,
    ) -> Option<LoopSignal> {
        if chunk.is_empty() {
            return None;
        }
        let text = crate::ascii::ensure_ascii_string(chunk);
        match self.level {
            Level::ERROR => event!(Level::ERROR, "{text}"),
            Level::WARN => event!(Level::WARN, "{text}"),
            Level::INFO => event!(Level::INFO, "{text}"),
            Level::DEBUG => event!(Level::DEBUG, "{text}"),
            Level::TRACE => event!(Level::TRACE, "{text}"),
        }
        None
    }
}

/// Writes each chunk straight through to the calling process's stdout,
/// flushing after every write.
#[derive(Default)]
pub struct StdoutSink;

#[async_trait]
impl ChunkHook for StdoutSink {
    async fn on_chunk(
        &mut self,
        chunk: &[u8],
        _output_so_far: &[u8],
        _backend: &mut PipeBackend,
    ) -> Option<LoopSignal> {
        if !chunk.is_empty() {
            let mut stdout = tokio::io::stdout();
            let _ = stdout.write_all(chunk).await;
            let _ = stdout.flush().await;
        }
        None
    }
}
