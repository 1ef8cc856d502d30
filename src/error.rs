//! Error types for the suspense-aware markup renderer.

use crate::context::ContextId;
use thiserror::Error;

/// Render-related errors
///
/// Every variant is terminal for the renderer instance that produced it: once an
/// error has been surfaced, further reads fail with [`RenderError::Terminated`].
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Component '{component}' failed to render: {source}")]
    Component {
        component: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Component '{component}' suspended outside of any boundary")]
    SuspendedOutsideBoundary { component: String },

    #[error("Pending operation of component '{component}' failed: {source}")]
    Operation {
        component: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Component '{component}' suspended during a synchronous render")]
    SuspendedInSyncRender { component: String },

    #[error("Invalid markup: {0}")]
    InvalidMarkup(String),

    #[error("Context stack mismatch: expected to pop {expected:?}, found {found:?}")]
    ContextMismatch {
        expected: ContextId,
        found: Option<ContextId>,
    },

    #[error("Render stalled: {0}")]
    Stalled(String),

    #[error("Render stream was destroyed: {0}")]
    Destroyed(#[source] anyhow::Error),

    #[error("Renderer is terminal and cannot be reused")]
    Terminated,
}

impl RenderError {
    /// Whether this error was caused by the consumer rather than by the rendered tree
    pub fn is_consumer_abort(&self) -> bool {
        matches!(self, RenderError::Destroyed(_))
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}
