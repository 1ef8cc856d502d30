//! Pull Output Interface
//!
//! [`MarkupReader`] drives the traversal engine on demand: each read runs the work
//! stack and the flush scheduler until enough bytes are releasable, the document
//! ends, or the next bytes sit behind an unsettled boundary, in which case the read
//! awaits the boundary batches. A [`DestroyHandle`] can cut a render off from any
//! task, including while a read is waiting.

use crate::engine::flush::FlushStatus;
use crate::engine::{Engine, Placeholder, RenderStats, UNBOUNDED};
use crate::error::RenderError;
use bytes::Bytes;
use futures::stream::{self, Stream};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Frames processed between two flush attempts
const FRAME_BUDGET: usize = 1024;

struct DestroyState {
    reason: Mutex<Option<anyhow::Error>>,
    token: CancellationToken,
}

/// Cancels a render from outside the reading task
///
/// Both operations are idempotent; only the first call decides the error that
/// the outstanding read fails with.
#[derive(Clone)]
pub struct DestroyHandle {
    state: Arc<DestroyState>,
}

impl DestroyHandle {
    fn new() -> Self {
        Self {
            state: Arc::new(DestroyState {
                reason: Mutex::new(None),
                token: CancellationToken::new(),
            }),
        }
    }

    /// Stop the render with a default cancellation error
    pub fn close(&self) {
        self.trigger(None, "render stream was closed");
    }

    /// Stop the render, failing the outstanding read with `error` if given
    pub fn destroy(&self, error: Option<anyhow::Error>) {
        self.trigger(error, "render stream was destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.token.is_cancelled()
    }

    fn trigger(&self, error: Option<anyhow::Error>, default_reason: &str) {
        let mut reason = self.state.reason.lock();
        if self.is_destroyed() {
            return;
        }
        let error = error.unwrap_or_else(|| anyhow::anyhow!("{}", default_reason));
        warn!(reason = %error, "Render destroyed by consumer");
        *reason = Some(error);
        self.state.token.cancel();
    }

    fn token(&self) -> &CancellationToken {
        &self.state.token
    }

    fn take_reason(&self) -> anyhow::Error {
        self.state
            .reason
            .lock()
            .take()
            .unwrap_or_else(|| anyhow::anyhow!("render stream was destroyed"))
    }
}

impl std::fmt::Debug for DestroyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestroyHandle")
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Active,
    /// Document fully released; further reads report end of stream
    Ended,
    /// Failed or destroyed; further reads fail fast
    Terminal,
}

/// Pull-based reader over one render
pub struct MarkupReader {
    engine: Engine,
    state: ReaderState,
    /// Bytes already released by the scheduler but not yet returned
    buffer: String,
    handle: DestroyHandle,
}

impl MarkupReader {
    pub(crate) fn new(engine: Engine) -> Self {
        Self {
            engine,
            state: ReaderState::Active,
            buffer: String::new(),
            handle: DestroyHandle::new(),
        }
    }

    /// Read the next chunk of markup
    ///
    /// Returns `Ok(None)` once the whole document has been released, until the
    /// render is closed or destroyed. A bounded
    /// `size_hint` returns as soon as that many bytes are held, before waiting on
    /// an unsettled boundary, and before each boundary that had to wait.
    /// [`UNBOUNDED`] accumulates the rest of the document into one chunk.
    pub async fn read_chunk(&mut self, size_hint: usize) -> Result<Option<Bytes>, RenderError> {
        Ok(self.read_markup(size_hint).await?.map(Bytes::from))
    }

    pub(crate) async fn read_markup(
        &mut self,
        size_hint: usize,
    ) -> Result<Option<String>, RenderError> {
        if self.state == ReaderState::Terminal {
            return Err(RenderError::Terminated);
        }
        // Destroy wins over end of stream
        if self.handle.is_destroyed() {
            return Err(self.fail(RenderError::Destroyed(self.handle.take_reason())));
        }
        if self.state == ReaderState::Ended {
            return Ok(None);
        }
        match self.fill(size_hint.max(1)).await {
            Ok(chunk) => Ok(chunk),
            Err(err) => Err(self.fail(err)),
        }
    }

    async fn fill(&mut self, size_hint: usize) -> Result<Option<String>, RenderError> {
        let bounded = size_hint != UNBOUNDED;
        loop {
            match self.engine.collect(&mut self.buffer, size_hint) {
                FlushStatus::Filled | FlushStatus::ChunkEdge => {
                    return Ok(Some(std::mem::take(&mut self.buffer)));
                }
                FlushStatus::Finished => {
                    self.state = ReaderState::Ended;
                    let stats = self.engine.stats();
                    info!(
                        bytes = stats.bytes_released,
                        boundaries = stats.boundaries,
                        suspensions = stats.suspensions,
                        "Render complete"
                    );
                    if self.buffer.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(std::mem::take(&mut self.buffer)));
                }
                FlushStatus::NeedsTraversal => {
                    if !self.engine.has_work() {
                        return Err(self.engine.stall_error(FlushStatus::NeedsTraversal));
                    }
                    self.engine.drive(FRAME_BUDGET)?;
                }
                status @ FlushStatus::Blocked(_) => {
                    if self.engine.has_work() {
                        self.engine.drive(FRAME_BUDGET)?;
                        continue;
                    }
                    if bounded && !self.buffer.is_empty() {
                        return Ok(Some(std::mem::take(&mut self.buffer)));
                    }
                    if !self.engine.has_in_flight() {
                        return Err(self.engine.stall_error(status));
                    }
                    self.await_batch(status).await?;
                }
            }
        }
    }

    async fn await_batch(&mut self, status: FlushStatus) -> Result<(), RenderError> {
        debug!(status = ?status, "Waiting for pending operations");
        tokio::select! {
            biased;
            () = self.handle.token().cancelled() => {
                Err(RenderError::Destroyed(self.handle.take_reason()))
            }
            batch = self.engine.next_batch() => match batch {
                Some(batch) => self.engine.apply_batch(batch),
                None => Err(self.engine.stall_error(status)),
            },
        }
    }

    fn fail(&mut self, err: RenderError) -> RenderError {
        self.state = ReaderState::Terminal;
        self.buffer.clear();
        self.engine.abandon();
        if err.is_consumer_abort() {
            debug!(error = %err, "Render abandoned");
        } else {
            warn!(error = %err, "Render failed");
        }
        err
    }

    /// Fallback placeholders published since the last call
    pub fn take_placeholders(&mut self) -> Vec<Placeholder> {
        self.engine.take_placeholders()
    }

    pub fn stats(&self) -> RenderStats {
        self.engine.stats()
    }

    pub fn is_finished(&self) -> bool {
        self.state == ReaderState::Ended
    }

    /// Handle that can close or destroy this render from another task
    pub fn destroy_handle(&self) -> DestroyHandle {
        self.handle.clone()
    }

    pub fn close(&mut self) {
        self.handle.close();
        self.release();
    }

    pub fn destroy(&mut self, error: Option<anyhow::Error>) {
        self.handle.destroy(error);
        self.release();
    }

    /// Drop outstanding work right away instead of on the next read
    fn release(&mut self) {
        if self.state == ReaderState::Active {
            self.engine.abandon();
        }
    }

    /// Adapt the reader into a stream of chunks of `chunk_size` bytes or more
    ///
    /// A failed or destroyed render yields one error item and then ends.
    pub fn into_stream(self, chunk_size: usize) -> impl Stream<Item = Result<Bytes, RenderError>> {
        stream::unfold(Some(self), move |reader| async move {
            let mut reader = reader?;
            match reader.read_chunk(chunk_size).await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(reader))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}

impl std::fmt::Debug for MarkupReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkupReader")
            .field("state", &self.state)
            .field("buffered", &self.buffer.len())
            .field("stats", &self.engine.stats())
            .finish()
    }
}
