//! Traversal frames and the index-addressed arena holding them.

use crate::context::{ContextId, ContextSnapshot};
use crate::engine::boundary::BoundaryId;
use crate::engine::segment::SegmentId;
use crate::node::Node;

/// Work a frame performs when popped
#[derive(Debug)]
pub(crate) enum Work {
    Visit(Node),
    CloseTag(String),
    PopContext(ContextId),
}

/// One scheduled unit of traversal work
#[derive(Debug)]
pub(crate) struct Frame {
    pub work: Work,
    /// Output segment this frame writes into
    pub segment: SegmentId,
    /// Innermost enclosing boundary, if any
    pub boundary: Option<BoundaryId>,
    /// Context chain active when the frame was created
    pub context: ContextSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct FrameId(usize);

/// Arena of frames addressed by index, with slot reuse
#[derive(Debug, Default)]
pub(crate) struct FrameArena {
    slots: Vec<Option<Frame>>,
    free: Vec<usize>,
    live: usize,
}

impl FrameArena {
    pub fn insert(&mut self, frame: Frame) -> FrameId {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(frame);
                FrameId(index)
            }
            None => {
                self.slots.push(Some(frame));
                FrameId(self.slots.len() - 1)
            }
        }
    }

    pub fn take(&mut self, id: FrameId) -> Option<Frame> {
        let frame = self.slots.get_mut(id.0)?.take()?;
        self.free.push(id.0);
        self.live -= 1;
        Some(frame)
    }

    pub fn live(&self) -> usize {
        self.live
    }

    /// Drop every frame, abandoning unprocessed work
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.live = 0;
    }
}
