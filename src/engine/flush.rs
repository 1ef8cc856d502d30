//! Flush Scheduler
//!
//! Releases output strictly in document order. The cursor over the root segment is
//! the low-water mark: everything before it has been handed to the consumer. A
//! boundary piece is only crossed once the boundary has settled, at which point its
//! whole span (nested boundaries included) is written contiguously.

use crate::engine::boundary::{BoundaryId, BoundaryResolver};
use crate::engine::segment::{Piece, SegmentArena, SegmentId};
use crate::engine::UNBOUNDED;
use crate::markup::{BOUNDARY_END, BOUNDARY_START};

/// Why a collection pass stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlushStatus {
    /// At least the requested number of bytes was collected
    Filled,
    /// The next piece is a boundary that had to wait; it starts a new chunk
    ChunkEdge,
    /// The whole document has been released
    Finished,
    /// The root segment still has unprocessed frames
    NeedsTraversal,
    /// The next piece belongs to a boundary that has not settled yet
    Blocked(BoundaryId),
}

enum Span {
    Boundary(BoundaryId),
    Segment(SegmentId, usize),
    Marker(&'static str),
}

#[derive(Debug)]
pub(crate) struct FlushScheduler {
    cursor: usize,
    released_bytes: usize,
    markers: bool,
}

impl FlushScheduler {
    pub fn new(markers: bool) -> Self {
        Self {
            cursor: 0,
            released_bytes: 0,
            markers,
        }
    }

    /// Count of root pieces already released
    pub fn low_water_mark(&self) -> usize {
        self.cursor
    }

    pub fn released_bytes(&self) -> usize {
        self.released_bytes
    }

    /// Move releasable output into `out`
    ///
    /// With a bounded `size_hint` collection stops once `out` holds that many bytes,
    /// and right before a suspended boundary when `out` is not empty. Released
    /// markup and the records of released boundaries are dropped as they go out.
    pub fn collect(
        &mut self,
        segments: &mut SegmentArena,
        boundaries: &mut BoundaryResolver,
        out: &mut String,
        size_hint: usize,
    ) -> FlushStatus {
        let bounded = size_hint != UNBOUNDED;
        loop {
            if bounded && out.len() >= size_hint {
                return FlushStatus::Filled;
            }
            let Some(root) = segments.get(SegmentId::ROOT) else {
                return FlushStatus::Finished;
            };
            let before = out.len();
            let span = match root.pieces().get(self.cursor) {
                Some(Piece::Markup(markup)) => {
                    out.push_str(markup);
                    None
                }
                Some(Piece::Slot(slot)) => {
                    if !segments.get(*slot).is_some_and(|s| s.is_complete()) {
                        return FlushStatus::NeedsTraversal;
                    }
                    Some(Span::Segment(*slot, 0))
                }
                Some(Piece::Boundary(boundary)) => {
                    if !boundaries.is_settled(*boundary) {
                        return FlushStatus::Blocked(*boundary);
                    }
                    if bounded && boundaries.was_suspended(*boundary) && !out.is_empty() {
                        return FlushStatus::ChunkEdge;
                    }
                    Some(Span::Boundary(*boundary))
                }
                None if root.is_complete() => return FlushStatus::Finished,
                None => return FlushStatus::NeedsTraversal,
            };
            if let Some(span) = span {
                let released = self.write_span(segments, boundaries, span, out);
                for id in released.segments {
                    segments.discard(id);
                }
                for id in released.boundaries {
                    boundaries.release(id);
                }
            }
            segments.discard_piece(SegmentId::ROOT, self.cursor);
            self.released_bytes += out.len() - before;
            self.cursor += 1;
        }
    }

    fn write_span(
        &self,
        segments: &SegmentArena,
        boundaries: &BoundaryResolver,
        start: Span,
        out: &mut String,
    ) -> Released {
        let mut released = Released::default();
        let mut stack = vec![start];
        while let Some(span) = stack.pop() {
            match span {
                Span::Marker(marker) => out.push_str(marker),
                Span::Boundary(boundary) => {
                    released.boundaries.push(boundary);
                    if self.markers {
                        out.push_str(BOUNDARY_START);
                        stack.push(Span::Marker(BOUNDARY_END));
                    }
                    if let Some(content) = boundaries.content(boundary) {
                        stack.push(Span::Segment(content, 0));
                    }
                }
                Span::Segment(id, index) => {
                    let Some(piece) = segments.get(id).and_then(|s| s.pieces().get(index)) else {
                        released.segments.push(id);
                        continue;
                    };
                    stack.push(Span::Segment(id, index + 1));
                    match piece {
                        Piece::Markup(markup) => out.push_str(markup),
                        Piece::Slot(slot) => stack.push(Span::Segment(*slot, 0)),
                        Piece::Boundary(nested) => stack.push(Span::Boundary(*nested)),
                    }
                }
            }
        }
        released
    }
}

/// Segments and boundaries whose whole output went out in one span
#[derive(Default)]
struct Released {
    segments: Vec<SegmentId>,
    boundaries: Vec<BoundaryId>,
}
