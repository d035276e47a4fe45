//! In-memory collector for tests and offline demos.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::Value;
use topo_kubehub::{CollectError, FetchOutput, ResourceCollector};

/// Canned responses per kind. Kinds with no entry answer with an empty list.
#[derive(Debug, Default)]
pub struct MockCollector {
    pub responses: HashMap<String, Result<FetchOutput, CollectError>>,
    pub delays: HashMap<String, Duration>,
    /// When set, every call fails with `CollectError::Unavailable`.
    pub unavailable: Option<String>,
    calls: AtomicUsize,
}

impl MockCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `{"items": items}` for `kind`.
    pub fn with_items(mut self, kind: &str, items: Vec<Value>) -> Self {
        let body = serde_json::json!({ "apiVersion": "v1", "kind": "List", "items": items });
        self.responses.insert(kind.to_string(), Ok(FetchOutput::json(body.to_string())));
        self
    }

    pub fn with_output(mut self, kind: &str, out: FetchOutput) -> Self {
        self.responses.insert(kind.to_string(), Ok(out));
        self
    }

    pub fn with_error(mut self, kind: &str, err: CollectError) -> Self {
        self.responses.insert(kind.to_string(), Err(err));
        self
    }

    pub fn with_delay(mut self, kind: &str, delay: Duration) -> Self {
        self.delays.insert(kind.to_string(), delay);
        self
    }

    pub fn unavailable(mut self, message: impl Into<String>) -> Self {
        self.unavailable = Some(message.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl ResourceCollector for MockCollector {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_resource_list(
        &self,
        kind: &str,
        _namespace: &str,
        _context: Option<&str>,
    ) -> Result<FetchOutput, CollectError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(d) = self.delays.get(kind) {
            tokio::time::sleep(*d).await;
        }
        if let Some(msg) = &self.unavailable {
            return Err(CollectError::Unavailable(msg.clone()));
        }
        match self.responses.get(kind) {
            Some(r) => r.clone(),
            None => Ok(FetchOutput::json(r#"{"items":[]}"#)),
        }
    }
}
