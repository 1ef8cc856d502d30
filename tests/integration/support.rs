//! Shared helpers: a keyed resource whose first read suspends on a timer.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use suspense_render::{MarkupReader, Node, PendingOperation, RenderError, RenderOutcome};

/// Keyed cache shared by every component of a test tree
///
/// The first load of a key suspends for the requested delay; after the operation
/// settled the key is resolved and loads return `None`.
#[derive(Clone, Default)]
pub struct Resource {
    resolved: Arc<Mutex<HashSet<String>>>,
    events: Arc<Mutex<Vec<String>>>,
}

impl Resource {
    pub fn new() -> Self {
        Self::default()
    }

    /// `begin:<key>` when an operation is first polled, `end:<key>` when it settles
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn is_resolved(&self, key: &str) -> bool {
        self.resolved.lock().contains(key)
    }

    /// Pending operation for `key`, or `None` once it has been loaded
    pub fn load(&self, key: &str, delay_ms: u64) -> Option<PendingOperation> {
        self.operation(key, delay_ms, None)
    }

    fn operation(&self, key: &str, delay_ms: u64, failure: Option<String>) -> Option<PendingOperation> {
        if self.is_resolved(key) {
            return None;
        }
        let resolved = Arc::clone(&self.resolved);
        let events = Arc::clone(&self.events);
        let key = key.to_string();
        Some(Box::pin(async move {
            events.lock().push(format!("begin:{}", key));
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            events.lock().push(format!("end:{}", key));
            if let Some(message) = failure {
                anyhow::bail!(message);
            }
            resolved.lock().insert(key);
            Ok(())
        }))
    }

    /// Component rendering `content` once `key` has loaded
    pub fn node(&self, key: &str, delay_ms: u64, content: impl Into<Node>) -> Node {
        let resource = self.clone();
        let key = key.to_string();
        let content = content.into();
        Node::named_component(format!("Fetch({})", key), move |_| {
            match resource.load(&key, delay_ms) {
                None => RenderOutcome::ready(content.clone()),
                Some(operation) => RenderOutcome::Suspended(operation),
            }
        })
    }

    pub fn text(&self, key: &str, delay_ms: u64) -> Node {
        self.node(key, delay_ms, key)
    }

    /// Component whose operation settles with an error
    pub fn failing(&self, key: &str, delay_ms: u64, message: &str) -> Node {
        let resource = self.clone();
        let key = key.to_string();
        let message = message.to_string();
        Node::named_component(format!("Fetch({})", key), move |_| {
            match resource.operation(&key, delay_ms, Some(message.clone())) {
                None => RenderOutcome::empty(),
                Some(operation) => RenderOutcome::Suspended(operation),
            }
        })
    }
}

/// Drain a reader with a fixed hint, returning every chunk as a string
pub async fn read_chunks(reader: &mut MarkupReader, size_hint: usize) -> Result<Vec<String>, RenderError> {
    let mut chunks = Vec::new();
    while let Some(chunk) = reader.read_chunk(size_hint).await? {
        chunks.push(String::from_utf8(chunk.to_vec()).expect("markup is utf-8"));
    }
    Ok(chunks)
}
