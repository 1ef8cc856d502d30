//! Suspense Render: suspension-aware streaming markup renderer
//!
//! Serializes a declarative node tree into markup. Composite units may suspend on
//! an asynchronous operation; the enclosing boundary collects every suspension of
//! its subtree, awaits them together and retries the suspended units, while output
//! is released strictly in document order either as one string or chunk by chunk.

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod logging;
pub mod markup;
pub mod node;
pub mod render;
pub mod stream;

pub use config::{ConfigLoader, RenderConfig, Settings};
pub use context::{Context, ContextId, ContextSnapshot, ContextStack};
pub use engine::{BoundaryStats, Placeholder, RenderStats, UNBOUNDED};
pub use error::{ConfigError, RenderError};
pub use logging::{init_logging, LoggingConfig};
pub use node::{
    Component, Element, FnComponent, Node, PendingOperation, RenderContext, RenderOutcome,
};
pub use render::{
    render_to_static_markup, render_to_static_stream, render_to_stream, render_to_string,
    Renderer,
};
pub use stream::{DestroyHandle, MarkupReader};
