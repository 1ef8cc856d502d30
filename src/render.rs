//! Render entry points
//!
//! [`Renderer`] builds engines from a [`RenderConfig`]; the free functions cover
//! the common single-shot and streaming cases with default settings.

use crate::config::RenderConfig;
use crate::context::ContextSnapshot;
use crate::engine::{Engine, EngineOptions, UNBOUNDED};
use crate::error::RenderError;
use crate::node::Node;
use crate::stream::MarkupReader;
use tracing::debug;

/// Configured entry point for single-shot and streaming renders
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    config: RenderConfig,
    context: ContextSnapshot,
}

impl Renderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            context: ContextSnapshot::default(),
        }
    }

    /// Seed every render with the given context entries
    pub fn with_context(mut self, context: ContextSnapshot) -> Self {
        self.context = context;
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render the whole document into one string
    ///
    /// Waits for every suspended unit; the renderer is torn down afterwards
    /// whether or not the render succeeded.
    pub async fn render_to_string(&self, node: impl Into<Node>) -> Result<String, RenderError> {
        let mut reader = self.reader(node.into(), false);
        let result = reader.read_markup(UNBOUNDED).await;
        reader.close();
        let markup = result?.unwrap_or_default();
        debug!(bytes = markup.len(), "Single-shot render finished");
        Ok(markup)
    }

    /// Start a pull-based render of `node`
    pub fn stream(&self, node: impl Into<Node>) -> MarkupReader {
        self.reader(node.into(), true)
    }

    fn reader(&self, node: Node, placeholders: bool) -> MarkupReader {
        let options = EngineOptions::from_config(&self.config, placeholders);
        MarkupReader::new(Engine::new(node, self.context.clone(), options))
    }
}

/// Render `node` to a complete markup string with structural markers
pub async fn render_to_string(node: impl Into<Node>) -> Result<String, RenderError> {
    Renderer::default().render_to_string(node).await
}

/// Render `node` to a complete markup string without markers or separators
pub async fn render_to_static_markup(node: impl Into<Node>) -> Result<String, RenderError> {
    Renderer::new(RenderConfig::static_markup())
        .render_to_string(node)
        .await
}

/// Start a streaming render of `node` with structural markers
pub fn render_to_stream(node: impl Into<Node>) -> MarkupReader {
    Renderer::default().stream(node)
}

/// Start a streaming render of `node` without markers or separators
pub fn render_to_static_stream(node: impl Into<Node>) -> MarkupReader {
    Renderer::new(RenderConfig::static_markup()).stream(node)
}
