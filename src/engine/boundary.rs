//! Boundary Resolver
//!
//! Per-boundary bookkeeping of pending operations and completion detection.
//! Suspensions discovered while a boundary's frames are still running are only
//! collected; once the boundary's own frames are exhausted the whole pending set
//! is handed out as one combined awaitable, so K independent suspensions cost a
//! single round of waiting.

use crate::context::ContextSnapshot;
use crate::engine::segment::SegmentId;
use crate::node::{Node, PendingOperation};
use futures::future::{join_all, BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct BoundaryId(usize);

impl BoundaryId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BoundaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A suspended node waiting to be retried
#[derive(Debug)]
pub(crate) struct Suspension {
    pub node: Node,
    pub component: String,
    /// Slot reserved for the node's output
    pub segment: SegmentId,
    pub context: ContextSnapshot,
}

/// Settlement of one combined awaitable; results are aligned with the waiting suspensions
pub(crate) struct Batch {
    pub boundary: BoundaryId,
    pub results: Vec<anyhow::Result<()>>,
}

struct BoundaryRecord {
    parent: Option<BoundaryId>,
    content: SegmentId,
    fallback: Option<Node>,
    context: ContextSnapshot,
    pending: Vec<(Suspension, PendingOperation)>,
    waiting: Vec<Suspension>,
    live_frames: usize,
    open_children: usize,
    batch_in_flight: bool,
    suspended: bool,
    settled: bool,
    /// Content has gone out to the consumer
    released: bool,
}

impl BoundaryRecord {
    fn can_settle(&self) -> bool {
        !self.settled
            && self.live_frames == 0
            && self.open_children == 0
            && self.pending.is_empty()
            && !self.batch_in_flight
    }
}

/// Counters describing the suspension activity of one render
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundaryStats {
    pub boundaries: usize,
    pub suspensions: usize,
    pub await_rounds: usize,
}

#[derive(Default)]
pub(crate) struct BoundaryResolver {
    records: Vec<BoundaryRecord>,
    in_flight: FuturesUnordered<BoxFuture<'static, Batch>>,
    stats: BoundaryStats,
}

impl BoundaryResolver {
    /// Create the record for a boundary whose content renders into `content`
    pub fn open(
        &mut self,
        parent: Option<BoundaryId>,
        content: SegmentId,
        fallback: Node,
        context: ContextSnapshot,
    ) -> BoundaryId {
        if let Some(parent) = parent.and_then(|id| self.records.get_mut(id.0)) {
            parent.open_children += 1;
        }
        self.records.push(BoundaryRecord {
            parent,
            content,
            fallback: Some(fallback),
            context,
            pending: Vec::new(),
            waiting: Vec::new(),
            live_frames: 0,
            open_children: 0,
            batch_in_flight: false,
            suspended: false,
            settled: false,
            released: false,
        });
        self.stats.boundaries += 1;
        let id = BoundaryId(self.records.len() - 1);
        debug!(boundary = id.0, parent = ?parent.map(|p| p.0), "Boundary opened");
        id
    }

    pub fn content(&self, id: BoundaryId) -> Option<SegmentId> {
        self.records.get(id.0).map(|record| record.content)
    }

    pub fn frame_started(&mut self, id: BoundaryId) {
        if let Some(record) = self.records.get_mut(id.0) {
            record.live_frames += 1;
        }
    }

    /// Account for a processed frame; launches the pending batch once the
    /// boundary's own frames are exhausted
    pub fn frame_finished(&mut self, id: BoundaryId) {
        let exhausted = match self.records.get_mut(id.0) {
            Some(record) => {
                record.live_frames = record.live_frames.saturating_sub(1);
                record.live_frames == 0
            }
            None => return,
        };
        if exhausted {
            if let Some(batch) = self.drain_awaitable(id) {
                self.in_flight.push(batch);
            }
        }
        self.try_settle(id);
    }

    /// Record a suspension; returns true when it is the boundary's first one
    pub fn record_suspension(
        &mut self,
        id: BoundaryId,
        suspension: Suspension,
        operation: PendingOperation,
    ) -> bool {
        let Some(record) = self.records.get_mut(id.0) else {
            return false;
        };
        debug!(
            boundary = id.0,
            component = %suspension.component,
            pending = record.pending.len() + 1,
            "Frame suspended"
        );
        record.pending.push((suspension, operation));
        self.stats.suspensions += 1;
        let first = !record.suspended;
        record.suspended = true;
        first
    }

    /// Fallback node and the context it renders with, handed out once
    pub fn take_fallback(&mut self, id: BoundaryId) -> Option<(Node, ContextSnapshot)> {
        let record = self.records.get_mut(id.0)?;
        let fallback = record.fallback.take()?;
        Some((fallback, record.context.clone()))
    }

    pub fn is_settled(&self, id: BoundaryId) -> bool {
        self.records.get(id.0).is_some_and(|record| record.settled)
    }

    /// Whether the boundary ever had to wait
    pub fn was_suspended(&self, id: BoundaryId) -> bool {
        self.records.get(id.0).is_some_and(|record| record.suspended)
    }

    /// Combined awaitable over the whole pending set, completing once every
    /// member has settled regardless of success
    pub fn drain_awaitable(&mut self, id: BoundaryId) -> Option<BoxFuture<'static, Batch>> {
        let record = self.records.get_mut(id.0)?;
        if record.pending.is_empty() || record.batch_in_flight {
            return None;
        }
        let (suspensions, operations): (Vec<_>, Vec<_>) = record.pending.drain(..).unzip();
        record.waiting = suspensions;
        record.batch_in_flight = true;
        self.stats.await_rounds += 1;
        debug!(boundary = id.0, operations = operations.len(), "Awaiting batch");

        let boundary = id;
        Some(
            async move {
                let results = join_all(operations).await;
                Batch { boundary, results }
            }
            .boxed(),
        )
    }

    pub fn has_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// Wait for the next boundary batch to settle
    pub async fn next_batch(&mut self) -> Option<Batch> {
        self.in_flight.next().await
    }

    /// Close a settled batch, returning the suspensions to retry in order
    pub fn complete_batch(&mut self, id: BoundaryId) -> Vec<Suspension> {
        match self.records.get_mut(id.0) {
            Some(record) => {
                record.batch_in_flight = false;
                std::mem::take(&mut record.waiting)
            }
            None => Vec::new(),
        }
    }

    /// Mark `id` settled if nothing is left inside it, cascading to ancestors
    pub fn try_settle(&mut self, id: BoundaryId) {
        let mut next = Some(id);
        while let Some(current) = next.take() {
            let Some(record) = self.records.get_mut(current.0) else {
                break;
            };
            if !record.can_settle() {
                break;
            }
            record.settled = true;
            debug!(boundary = current.0, "Boundary settled");
            let parent = record.parent;
            if let Some(parent_record) = parent.and_then(|p| self.records.get_mut(p.0)) {
                parent_record.open_children = parent_record.open_children.saturating_sub(1);
                next = parent;
            }
        }
    }

    /// Free what a boundary holds once its content has been handed off
    ///
    /// The record itself stays so ids remain valid, but keeps only counters.
    pub fn release(&mut self, id: BoundaryId) {
        let Some(record) = self.records.get_mut(id.0) else {
            return;
        };
        if record.released {
            return;
        }
        record.released = true;
        record.fallback = None;
        record.context = ContextSnapshot::default();
        record.pending = Vec::new();
        record.waiting = Vec::new();
        debug!(boundary = id.0, "Boundary released");
    }

    #[cfg(test)]
    pub fn is_released(&self, id: BoundaryId) -> bool {
        self.records.get(id.0).is_some_and(|record| record.released)
    }

    /// Boundaries still holding a fallback node
    #[cfg(test)]
    pub fn retained_fallbacks(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.fallback.is_some())
            .count()
    }

    /// First boundary that is neither settled nor waiting on a batch, if any
    pub fn stalled(&self) -> Option<BoundaryId> {
        self.records
            .iter()
            .position(|record| {
                !record.settled
                    && !record.batch_in_flight
                    && record.live_frames == 0
                    && !record.pending.is_empty()
            })
            .map(BoundaryId)
    }

    /// Drop every pending and in-flight operation without running continuations
    pub fn abandon(&mut self) {
        self.in_flight = FuturesUnordered::new();
        for record in &mut self.records {
            record.pending.clear();
            record.waiting.clear();
            record.batch_in_flight = false;
        }
    }

    pub fn stats(&self) -> BoundaryStats {
        self.stats
    }
}
