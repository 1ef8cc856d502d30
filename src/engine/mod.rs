//! Traversal Engine
//!
//! Walks the node tree depth-first with an explicit work stack of frames instead of
//! native recursion, so the walk can pause at any depth and resume after an
//! asynchronous wait. A composite unit that suspends inside a boundary leaves a slot
//! at its position and traversal carries on with its siblings; the boundary collects
//! every such suspension and awaits them together before the suspended units are
//! retried with the context chain they originally saw.

pub(crate) mod boundary;
pub(crate) mod flush;
pub(crate) mod frame;
pub(crate) mod segment;

pub use boundary::BoundaryStats;

use crate::config::RenderConfig;
use crate::context::{ContextSnapshot, ContextStack};
use crate::error::RenderError;
use crate::markup;
use crate::node::{Composite, Node, PendingOperation, RenderContext, RenderOutcome};
use boundary::{Batch, BoundaryId, BoundaryResolver, Suspension};
use flush::{FlushScheduler, FlushStatus};
use frame::{Frame, FrameArena, FrameId, Work};
use segment::{SegmentArena, SegmentId};
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// Size hint meaning "release everything up to the end of the document"
pub const UNBOUNDED: usize = usize::MAX;

/// Fallback content published when a boundary first suspends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub boundary: usize,
    pub markup: String,
}

/// Counters describing one render
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub frames_processed: usize,
    pub boundaries: usize,
    pub suspensions: usize,
    pub await_rounds: usize,
    pub bytes_released: usize,
    pub low_water_mark: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct EngineOptions {
    pub static_markup: bool,
    pub root_attribute: Option<String>,
    pub placeholders: bool,
    /// Whether suspensions may be awaited; a synchronous run fails on them
    pub allow_wait: bool,
}

impl EngineOptions {
    pub fn sync(static_markup: bool) -> Self {
        Self {
            static_markup,
            root_attribute: None,
            placeholders: false,
            allow_wait: false,
        }
    }

    pub fn from_config(config: &RenderConfig, placeholders: bool) -> Self {
        Self {
            static_markup: config.static_markup,
            root_attribute: config.root_attribute.clone(),
            placeholders: placeholders && config.placeholders,
            allow_wait: true,
        }
    }
}

pub(crate) struct Engine {
    options: EngineOptions,
    frames: FrameArena,
    stack: Vec<FrameId>,
    contexts: ContextStack,
    segments: SegmentArena,
    boundaries: BoundaryResolver,
    flush: FlushScheduler,
    placeholders: VecDeque<Placeholder>,
    root_attribute_pending: bool,
    frames_processed: usize,
}

impl Engine {
    pub fn new(root: Node, context: ContextSnapshot, options: EngineOptions) -> Self {
        let markers = !options.static_markup;
        // Only an element at the very root carries the attribute
        let root_attribute_pending =
            markers && options.root_attribute.is_some() && matches!(root, Node::Element(_));
        let mut engine = Self {
            options,
            frames: FrameArena::default(),
            stack: Vec::new(),
            contexts: ContextStack::from_snapshot(context),
            segments: SegmentArena::new(markers),
            boundaries: BoundaryResolver::default(),
            flush: FlushScheduler::new(markers),
            placeholders: VecDeque::new(),
            root_attribute_pending,
            frames_processed: 0,
        };
        engine.push_frame(Work::Visit(root), SegmentId::ROOT, None);
        engine
    }

    pub fn has_work(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Pop and process one frame; returns false when the work stack is empty
    pub fn step(&mut self) -> Result<bool, RenderError> {
        let Some(id) = self.stack.pop() else {
            return Ok(false);
        };
        let Some(frame) = self.frames.take(id) else {
            return Ok(true);
        };
        self.frames_processed += 1;

        let Frame {
            work,
            segment,
            boundary,
            context,
        } = frame;
        self.contexts.restore(&context);
        trace!(
            work = ?work,
            depth = self.contexts.depth(),
            pending_frames = self.frames.live(),
            "Processing frame"
        );

        match work {
            Work::Visit(node) => self.visit(node, segment, boundary)?,
            Work::CloseTag(tag) => self.segments.write(segment, markup::close_tag(&tag)),
            Work::PopContext(context_id) => self.contexts.pop(context_id)?,
        }

        self.segments.release(segment);
        if let Some(boundary) = boundary {
            self.boundaries.frame_finished(boundary);
        }
        Ok(true)
    }

    /// Process at most `budget` frames
    pub fn drive(&mut self, budget: usize) -> Result<(), RenderError> {
        for _ in 0..budget {
            if !self.step()? {
                break;
            }
        }
        Ok(())
    }

    /// Process frames until the work stack is empty
    pub fn run_to_idle(&mut self) -> Result<(), RenderError> {
        while self.step()? {}
        Ok(())
    }

    fn visit(
        &mut self,
        node: Node,
        segment: SegmentId,
        boundary: Option<BoundaryId>,
    ) -> Result<(), RenderError> {
        match node {
            Node::Empty => {}
            Node::Text(text) => self.segments.write_text(segment, markup::escape(&text)),
            Node::Element(element) => {
                let void = markup::is_void_element(&element.tag);
                if void && !element.children.is_empty() {
                    return Err(RenderError::InvalidMarkup(format!(
                        "<{}> is a void element and cannot have children",
                        element.tag
                    )));
                }
                let root_attribute = if self.root_attribute_pending {
                    self.root_attribute_pending = false;
                    self.options.root_attribute.clone()
                } else {
                    None
                };
                let open =
                    markup::open_tag(&element.tag, &element.attributes, root_attribute.as_deref())?;
                self.segments.write(segment, open);
                if !void {
                    self.push_frame(Work::CloseTag(element.tag), segment, boundary);
                    self.push_children(element.children, segment, boundary);
                }
            }
            Node::Fragment(children) => self.push_children(children, segment, boundary),
            Node::Provider(provider) => {
                self.contexts.push(provider.context, provider.value);
                self.push_frame(Work::PopContext(provider.context), segment, boundary);
                self.push_children(provider.children, segment, boundary);
            }
            Node::Composite(composite) => {
                let snapshot = self.contexts.snapshot();
                let outcome = composite
                    .component
                    .render(&RenderContext::new(&snapshot, self.options.static_markup));
                match outcome {
                    RenderOutcome::Ready(children) => {
                        self.push_children(children, segment, boundary)
                    }
                    RenderOutcome::Suspended(operation) => {
                        self.suspend(composite, operation, segment, boundary, snapshot)?
                    }
                    RenderOutcome::Failed(source) => {
                        return Err(RenderError::Component {
                            component: composite.name().to_string(),
                            source,
                        });
                    }
                }
            }
            Node::Boundary(node) => {
                let content = self.segments.create();
                let id = self.boundaries.open(
                    boundary,
                    content,
                    *node.fallback,
                    self.contexts.snapshot(),
                );
                self.segments.attach_boundary(segment, id);
                if node.children.is_empty() {
                    self.boundaries.try_settle(id);
                } else {
                    self.push_children(node.children, content, Some(id));
                }
            }
        }
        Ok(())
    }

    fn suspend(
        &mut self,
        composite: Composite,
        operation: PendingOperation,
        segment: SegmentId,
        boundary: Option<BoundaryId>,
        context: ContextSnapshot,
    ) -> Result<(), RenderError> {
        let component = composite.name().to_string();
        if !self.options.allow_wait {
            return Err(RenderError::SuspendedInSyncRender { component });
        }
        let Some(boundary) = boundary else {
            return Err(RenderError::SuspendedOutsideBoundary { component });
        };

        let slot = self.segments.reserve_slot(segment);
        let suspension = Suspension {
            node: Node::Composite(composite),
            component,
            segment: slot,
            context,
        };
        let first = self
            .boundaries
            .record_suspension(boundary, suspension, operation);
        if first && self.options.placeholders {
            self.publish_placeholder(boundary);
        }
        Ok(())
    }

    /// Render the boundary's fallback on the side; a fallback that suspends or
    /// fails only costs the placeholder, never the render
    fn publish_placeholder(&mut self, boundary: BoundaryId) {
        let Some((fallback, context)) = self.boundaries.take_fallback(boundary) else {
            return;
        };
        let markup = match render_sync(
            fallback,
            context,
            EngineOptions::sync(self.options.static_markup),
        ) {
            Ok(markup) => markup,
            Err(err) => {
                warn!(
                    boundary = boundary.index(),
                    error = %err,
                    "Fallback could not be rendered, skipping placeholder"
                );
                return;
            }
        };
        debug!(
            boundary = boundary.index(),
            bytes = markup.len(),
            "Fallback placeholder ready"
        );
        self.placeholders.push_back(Placeholder {
            boundary: boundary.index(),
            markup,
        });
    }

    fn push_children(
        &mut self,
        children: Vec<Node>,
        segment: SegmentId,
        boundary: Option<BoundaryId>,
    ) {
        for child in children.into_iter().rev() {
            self.push_frame(Work::Visit(child), segment, boundary);
        }
    }

    fn push_frame(&mut self, work: Work, segment: SegmentId, boundary: Option<BoundaryId>) {
        let context = self.contexts.snapshot();
        self.segments.acquire(segment);
        if let Some(boundary) = boundary {
            self.boundaries.frame_started(boundary);
        }
        let id = self.frames.insert(Frame {
            work,
            segment,
            boundary,
            context,
        });
        self.stack.push(id);
    }

    pub fn has_in_flight(&self) -> bool {
        self.boundaries.has_in_flight()
    }

    pub async fn next_batch(&mut self) -> Option<Batch> {
        self.boundaries.next_batch().await
    }

    /// Re-create frames for the suspensions of a settled batch
    pub fn apply_batch(&mut self, batch: Batch) -> Result<(), RenderError> {
        let Batch { boundary, results } = batch;
        let suspensions = self.boundaries.complete_batch(boundary);
        let mut retries = Vec::with_capacity(suspensions.len());
        for (suspension, result) in suspensions.into_iter().zip(results) {
            if let Err(source) = result {
                return Err(RenderError::Operation {
                    component: suspension.component,
                    source,
                });
            }
            retries.push(suspension);
        }
        debug!(
            boundary = boundary.index(),
            retries = retries.len(),
            "Batch settled, retrying suspended frames"
        );

        for suspension in retries.into_iter().rev() {
            self.contexts.restore(&suspension.context);
            self.push_frame(Work::Visit(suspension.node), suspension.segment, Some(boundary));
            // The retry frame now holds the slot
            self.segments.release(suspension.segment);
        }
        self.boundaries.try_settle(boundary);
        Ok(())
    }

    pub fn collect(&mut self, out: &mut String, size_hint: usize) -> FlushStatus {
        self.flush
            .collect(&mut self.segments, &mut self.boundaries, out, size_hint)
    }

    /// Error describing why no further progress is possible
    pub fn stall_error(&self, status: FlushStatus) -> RenderError {
        let stalled = self.boundaries.stalled().map(|id| id.index());
        RenderError::Stalled(format!(
            "flush status {:?}, boundary with unawaited operations: {:?}",
            status, stalled
        ))
    }

    pub fn take_placeholders(&mut self) -> Vec<Placeholder> {
        self.placeholders.drain(..).collect()
    }

    /// Drop all outstanding work and operations
    pub fn abandon(&mut self) {
        self.stack.clear();
        self.frames.clear();
        self.boundaries.abandon();
    }

    pub fn stats(&self) -> RenderStats {
        let boundaries = self.boundaries.stats();
        RenderStats {
            frames_processed: self.frames_processed,
            boundaries: boundaries.boundaries,
            suspensions: boundaries.suspensions,
            await_rounds: boundaries.await_rounds,
            bytes_released: self.flush.released_bytes(),
            low_water_mark: self.flush.low_water_mark(),
        }
    }
}

/// Render `node` to completion without waiting, on an independent engine
pub(crate) fn render_sync(
    node: Node,
    context: ContextSnapshot,
    options: EngineOptions,
) -> Result<String, RenderError> {
    let mut engine = Engine::new(node, context, options);
    engine.run_to_idle()?;
    let mut out = String::new();
    match engine.collect(&mut out, UNBOUNDED) {
        FlushStatus::Finished => Ok(out),
        status => Err(engine.stall_error(status)),
    }
}
