//! Node Model
//!
//! The declarative tree consumed by the renderer. Composite units produce their
//! children through [`Component::render`], which reports readiness explicitly as a
//! [`RenderOutcome`] instead of unwinding with a thrown value.

use crate::context::{Context, ContextId, ContextSnapshot, ContextValue};
use crate::error::RenderError;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Opaque awaitable blocking a suspended composite unit
pub type PendingOperation = BoxFuture<'static, anyhow::Result<()>>;

/// Result of invoking a composite unit's render function
pub enum RenderOutcome {
    /// The unit produced its children
    Ready(Vec<Node>),
    /// The unit cannot render until the operation settles
    Suspended(PendingOperation),
    /// The unit failed with a non-suspend error
    Failed(anyhow::Error),
}

impl RenderOutcome {
    pub fn ready(node: impl Into<Node>) -> Self {
        RenderOutcome::Ready(vec![node.into()])
    }

    pub fn ready_many(nodes: impl IntoIterator<Item = Node>) -> Self {
        RenderOutcome::Ready(nodes.into_iter().collect())
    }

    pub fn empty() -> Self {
        RenderOutcome::Ready(Vec::new())
    }

    pub fn suspend<F>(operation: F) -> Self
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        RenderOutcome::Suspended(operation.boxed())
    }

    pub fn fail(error: impl Into<anyhow::Error>) -> Self {
        RenderOutcome::Failed(error.into())
    }
}

impl fmt::Debug for RenderOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderOutcome::Ready(nodes) => f.debug_tuple("Ready").field(&nodes.len()).finish(),
            RenderOutcome::Suspended(_) => f.write_str("Suspended"),
            RenderOutcome::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
        }
    }
}

/// What a render function can see while it runs
pub struct RenderContext<'a> {
    contexts: &'a ContextSnapshot,
    static_markup: bool,
}

impl<'a> RenderContext<'a> {
    pub(crate) fn new(contexts: &'a ContextSnapshot, static_markup: bool) -> Self {
        Self {
            contexts,
            static_markup,
        }
    }

    /// Read the value of `context` visible at this node
    pub fn read<T: Send + Sync + 'static>(&self, context: &Context<T>) -> Arc<T> {
        self.contexts.read(context)
    }

    pub fn is_static(&self) -> bool {
        self.static_markup
    }

    /// Render `node` to a string on an independent internal run
    ///
    /// The nested run starts from an empty context stack and cannot wait: if
    /// anything inside it suspends the call fails with
    /// [`RenderError::SuspendedInSyncRender`].
    pub fn render_to_string(&self, node: impl Into<Node>) -> Result<String, RenderError> {
        crate::engine::render_sync(
            node.into(),
            ContextSnapshot::default(),
            crate::engine::EngineOptions::sync(self.static_markup),
        )
    }
}

/// A composite unit of the tree
pub trait Component: Send + Sync {
    /// Name used in errors and logs
    fn name(&self) -> &str {
        "Anonymous"
    }

    fn render(&self, cx: &RenderContext<'_>) -> RenderOutcome;
}

/// Component backed by a closure, optionally named
pub struct FnComponent<F> {
    name: Option<String>,
    render: F,
}

impl<F> FnComponent<F>
where
    F: Fn(&RenderContext<'_>) -> RenderOutcome + Send + Sync,
{
    pub fn new(render: F) -> Self {
        Self { name: None, render }
    }

    pub fn named(name: impl Into<String>, render: F) -> Self {
        Self {
            name: Some(name.into()),
            render,
        }
    }
}

impl<F> Component for FnComponent<F>
where
    F: Fn(&RenderContext<'_>) -> RenderOutcome + Send + Sync,
{
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("Anonymous")
    }

    fn render(&self, cx: &RenderContext<'_>) -> RenderOutcome {
        (self.render)(cx)
    }
}

/// Element node: tag, attributes, children
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }
}

/// Context provider node
#[derive(Clone)]
pub struct Provider {
    pub context: ContextId,
    pub value: ContextValue,
    pub children: Vec<Node>,
}

/// Composite node wrapping a render function
#[derive(Clone)]
pub struct Composite {
    pub component: Arc<dyn Component>,
}

impl Composite {
    pub fn name(&self) -> &str {
        self.component.name()
    }
}

/// Boundary node: placeholder content shown while its children are pending
#[derive(Debug, Clone, PartialEq)]
pub struct Boundary {
    pub fallback: Box<Node>,
    pub children: Vec<Node>,
}

/// A node of the declarative tree
#[derive(Clone, Default)]
pub enum Node {
    #[default]
    Empty,
    Text(String),
    Element(Element),
    Fragment(Vec<Node>),
    Provider(Provider),
    Composite(Composite),
    Boundary(Boundary),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn fragment(children: impl IntoIterator<Item = Node>) -> Self {
        Node::Fragment(children.into_iter().collect())
    }

    pub fn boundary(fallback: impl Into<Node>, children: impl IntoIterator<Item = Node>) -> Self {
        Node::Boundary(Boundary {
            fallback: Box::new(fallback.into()),
            children: children.into_iter().collect(),
        })
    }

    pub fn component<F>(render: F) -> Self
    where
        F: Fn(&RenderContext<'_>) -> RenderOutcome + Send + Sync + 'static,
    {
        Node::Composite(Composite {
            component: Arc::new(FnComponent::new(render)),
        })
    }

    pub fn named_component<F>(name: impl Into<String>, render: F) -> Self
    where
        F: Fn(&RenderContext<'_>) -> RenderOutcome + Send + Sync + 'static,
    {
        Node::Composite(Composite {
            component: Arc::new(FnComponent::named(name, render)),
        })
    }

    pub fn from_component(component: Arc<dyn Component>) -> Self {
        Node::Composite(Composite { component })
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Text(text.to_string())
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Text(text)
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl From<Vec<Node>> for Node {
    fn from(children: Vec<Node>) -> Self {
        Node::Fragment(children)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Empty => f.write_str("Empty"),
            Node::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Node::Element(element) => element.fmt(f),
            Node::Fragment(children) => f.debug_tuple("Fragment").field(children).finish(),
            Node::Provider(provider) => f
                .debug_struct("Provider")
                .field("context", &provider.context)
                .field("children", &provider.children)
                .finish(),
            Node::Composite(composite) => {
                f.debug_tuple("Composite").field(&composite.name()).finish()
            }
            Node::Boundary(boundary) => boundary.fmt(f),
        }
    }
}

impl PartialEq for Node {
    /// Structural equality; providers and composites compare by identity
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Node::Empty, Node::Empty) => true,
            (Node::Text(a), Node::Text(b)) => a == b,
            (Node::Element(a), Node::Element(b)) => a == b,
            (Node::Fragment(a), Node::Fragment(b)) => a == b,
            (Node::Provider(a), Node::Provider(b)) => {
                a.context == b.context
                    && Arc::ptr_eq(&a.value, &b.value)
                    && a.children == b.children
            }
            (Node::Composite(a), Node::Composite(b)) => Arc::ptr_eq(&a.component, &b.component),
            (Node::Boundary(a), Node::Boundary(b)) => a == b,
            _ => false,
        }
    }
}
