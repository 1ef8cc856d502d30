//! Context Stack
//!
//! Typed context handles and the stack of provided values visible during traversal.
//! Entries form a persistent, reference-counted list so that a frame can capture the
//! chain active at its creation by cloning a single pointer, and a retried frame can
//! restore exactly that chain no matter what siblings pushed or popped in between.

use crate::error::RenderError;
use crate::node::{Node, Provider};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Type-erased value stored on the context stack
pub type ContextValue = Arc<dyn Any + Send + Sync>;

/// Process-unique identity of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        ContextId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Typed context handle
///
/// Reads fall back to the default value when no provider for this context is active.
pub struct Context<T> {
    id: ContextId,
    default: Arc<T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Context<T> {
    /// Create a new context with the given default value
    pub fn new(default: T) -> Self {
        Self {
            id: ContextId::next(),
            default: Arc::new(default),
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn default_value(&self) -> Arc<T> {
        Arc::clone(&self.default)
    }

    /// Build a provider node making `value` visible to `children`
    pub fn provide(&self, value: T, children: impl IntoIterator<Item = Node>) -> Node {
        self.provide_shared(Arc::new(value), children)
    }

    /// Build a provider node around an already shared value
    pub fn provide_shared(&self, value: Arc<T>, children: impl IntoIterator<Item = Node>) -> Node {
        Node::Provider(Provider {
            context: self.id,
            value,
            children: children.into_iter().collect(),
        })
    }

    pub(crate) fn downcast(&self, value: Option<ContextValue>) -> Arc<T> {
        value
            .and_then(|value| value.downcast::<T>().ok())
            .unwrap_or_else(|| self.default_value())
    }
}

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            default: Arc::clone(&self.default),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("id", &self.id).finish()
    }
}

struct ContextEntry {
    id: ContextId,
    value: ContextValue,
    depth: usize,
    parent: Option<Arc<ContextEntry>>,
}

/// Immutable view of the entries active at some point of the traversal
#[derive(Clone, Default)]
pub struct ContextSnapshot {
    head: Option<Arc<ContextEntry>>,
}

impl ContextSnapshot {
    /// Number of entries visible in this snapshot
    pub fn depth(&self) -> usize {
        self.head.as_ref().map(|entry| entry.depth).unwrap_or(0)
    }

    fn lookup(&self, id: ContextId) -> Option<ContextValue> {
        let mut cursor = self.head.as_deref();
        while let Some(entry) = cursor {
            if entry.id == id {
                return Some(Arc::clone(&entry.value));
            }
            cursor = entry.parent.as_deref();
        }
        None
    }

    /// Read a typed context, returning its default if it is not provided
    pub fn read<T: Send + Sync + 'static>(&self, context: &Context<T>) -> Arc<T> {
        context.downcast(self.lookup(context.id()))
    }
}

impl fmt::Debug for ContextSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextSnapshot")
            .field("depth", &self.depth())
            .finish()
    }
}

/// Mutable context stack driven by the traversal engine
#[derive(Debug, Default)]
pub struct ContextStack {
    current: ContextSnapshot,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: ContextSnapshot) -> Self {
        Self { current: snapshot }
    }

    /// Push a value for `id` one level deeper than the current top
    pub fn push(&mut self, id: ContextId, value: ContextValue) {
        let depth = self.current.depth() + 1;
        let parent = self.current.head.take();
        self.current.head = Some(Arc::new(ContextEntry {
            id,
            value,
            depth,
            parent,
        }));
    }

    /// Pop the top entry, which must belong to `id`
    pub fn pop(&mut self, id: ContextId) -> Result<(), RenderError> {
        match self.current.head.take() {
            Some(entry) if entry.id == id => {
                self.current.head = entry.parent.clone();
                Ok(())
            }
            other => {
                let found = other.as_ref().map(|entry| entry.id);
                self.current.head = other;
                Err(RenderError::ContextMismatch {
                    expected: id,
                    found,
                })
            }
        }
    }

    /// Current value for `id`, if any provider is active
    pub fn read(&self, id: ContextId) -> Option<ContextValue> {
        self.current.lookup(id)
    }

    pub fn depth(&self) -> usize {
        self.current.depth()
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        self.current.clone()
    }

    pub fn restore(&mut self, snapshot: &ContextSnapshot) {
        self.current = snapshot.clone();
    }
}
