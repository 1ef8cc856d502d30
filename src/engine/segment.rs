//! Output segments
//!
//! A segment is an ordered list of pieces. Document order is the in-order
//! flattening of the piece tree rooted at [`SegmentId::ROOT`]: slots reserve the
//! position of a suspended node until its retry fills them, and boundary pieces
//! splice in a boundary's content segment once it has settled.

use crate::engine::boundary::BoundaryId;
use crate::markup::TEXT_SEPARATOR;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SegmentId(usize);

impl SegmentId {
    pub const ROOT: SegmentId = SegmentId(0);
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Piece {
    Markup(String),
    Slot(SegmentId),
    Boundary(BoundaryId),
}

#[derive(Debug, Default)]
pub(crate) struct Segment {
    pieces: Vec<Piece>,
    /// Frames or suspended retries that will still write here
    writers: usize,
    trailing_text: bool,
}

impl Segment {
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    pub fn is_complete(&self) -> bool {
        self.writers == 0
    }
}

#[derive(Debug)]
pub(crate) struct SegmentArena {
    segments: Vec<Segment>,
    separate_text: bool,
}

impl SegmentArena {
    /// Create an arena holding only the root segment
    pub fn new(separate_text: bool) -> Self {
        Self {
            segments: vec![Segment::default()],
            separate_text,
        }
    }

    pub fn get(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id.0)
    }

    pub fn create(&mut self) -> SegmentId {
        self.segments.push(Segment::default());
        SegmentId(self.segments.len() - 1)
    }

    pub fn acquire(&mut self, id: SegmentId) {
        if let Some(segment) = self.segments.get_mut(id.0) {
            segment.writers += 1;
        }
    }

    pub fn release(&mut self, id: SegmentId) {
        if let Some(segment) = self.segments.get_mut(id.0) {
            segment.writers = segment.writers.saturating_sub(1);
        }
    }

    pub fn write(&mut self, id: SegmentId, markup: String) {
        if let Some(segment) = self.segments.get_mut(id.0) {
            if !markup.is_empty() {
                segment.pieces.push(Piece::Markup(markup));
            }
            segment.trailing_text = false;
        }
    }

    /// Append already escaped text, separating it from a directly preceding text node
    pub fn write_text(&mut self, id: SegmentId, escaped: String) {
        if escaped.is_empty() {
            return;
        }
        let separate_text = self.separate_text;
        if let Some(segment) = self.segments.get_mut(id.0) {
            if separate_text && segment.trailing_text {
                segment.pieces.push(Piece::Markup(TEXT_SEPARATOR.to_string()));
            }
            segment.pieces.push(Piece::Markup(escaped));
            segment.trailing_text = true;
        }
    }

    /// Reserve a child segment at the current end of `id`, held by one writer
    pub fn reserve_slot(&mut self, id: SegmentId) -> SegmentId {
        let slot = self.create();
        self.acquire(slot);
        if let Some(segment) = self.segments.get_mut(id.0) {
            segment.pieces.push(Piece::Slot(slot));
            segment.trailing_text = false;
        }
        slot
    }

    pub fn attach_boundary(&mut self, id: SegmentId, boundary: BoundaryId) {
        if let Some(segment) = self.segments.get_mut(id.0) {
            segment.pieces.push(Piece::Boundary(boundary));
            segment.trailing_text = false;
        }
    }

    /// Drop the pieces of a segment whose output has been released
    pub fn discard(&mut self, id: SegmentId) {
        if let Some(segment) = self.segments.get_mut(id.0) {
            segment.pieces = Vec::new();
        }
    }

    /// Drop the markup of one released piece; positions of later pieces stay put
    pub fn discard_piece(&mut self, id: SegmentId, index: usize) {
        if let Some(Piece::Markup(markup)) = self
            .segments
            .get_mut(id.0)
            .and_then(|segment| segment.pieces.get_mut(index))
        {
            *markup = String::new();
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Markup bytes still held across all segments
    #[cfg(test)]
    pub fn retained_bytes(&self) -> usize {
        self.segments
            .iter()
            .flat_map(|segment| segment.pieces.iter())
            .map(|piece| match piece {
                Piece::Markup(markup) => markup.len(),
                _ => 0,
            })
            .sum()
    }
}
