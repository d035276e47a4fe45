//! Topology API: graph assembly over a resource collector.
//!
//! [`GraphBuilder::build`] fetches every configured kind concurrently, waits for
//! all of them to settle, then normalizes and infers over the flattened items.
//! A kind that fails contributes nothing; only a collector that cannot be reached
//! at all turns into a top-level error.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use topo_core::{parse_resource_list, GraphResult, Normalizer, RawResource};
use topo_graph::InferenceEngine;
use topo_kubehub::{valid_namespace, CollectError, ResourceCollector};

mod config;
mod mock;

pub use config::{split_list, GraphConfig, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_KINDS, DEFAULT_MAX_CONCURRENCY};
pub use mock::MockCollector;

/// Build errors suitable for transport to a host.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum TopoError {
    #[error("validation: {0}")]
    Validation(String),
    /// Collector unreachable; carries its message verbatim.
    #[error("{0}")]
    Collector(String),
    #[error("internal: {0}")]
    Internal(String),
}

pub type TopoResult<T> = Result<T, TopoError>;

impl From<CollectError> for TopoError {
    fn from(e: CollectError) -> Self {
        match e {
            CollectError::Unavailable(msg) => TopoError::Collector(msg),
            other => TopoError::Collector(other.to_string()),
        }
    }
}

/// What one kind's fetch settled to.
enum KindOutcome {
    Items(Vec<RawResource>),
    /// Recoverable: the kind contributes nothing.
    Degraded(String),
}

/// Graph assembly coordinator.
pub struct GraphBuilder {
    collector: Arc<dyn ResourceCollector>,
    normalizer: Normalizer,
    engine: InferenceEngine,
    config: GraphConfig,
}

impl GraphBuilder {
    pub fn new(collector: Arc<dyn ResourceCollector>, config: GraphConfig) -> Self {
        Self {
            collector,
            normalizer: Normalizer::new(&config.exclude_kinds),
            engine: InferenceEngine::default(),
            config,
        }
    }

    pub fn with_engine(mut self, engine: InferenceEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn collector_name(&self) -> &'static str {
        self.collector.name()
    }

    /// Build over the configured kinds.
    pub async fn build_default(&self, namespace: &str, context: Option<&str>) -> GraphResult {
        self.build(namespace, context, &self.config.kinds).await
    }

    /// Build the graph for `namespace` (empty for all namespaces). Never fails:
    /// a global failure comes back as `{nodes: [], edges: [], error}`.
    pub async fn build(&self, namespace: &str, context: Option<&str>, kinds: &[String]) -> GraphResult {
        let t0 = Instant::now();
        let res = match self.try_build(namespace, context, kinds).await {
            Ok(res) => res,
            Err(e) => {
                warn!(error = %e, ns = %namespace, "graph: build failed");
                GraphResult::failed(e.to_string())
            }
        };
        histogram!("graph_build_ms", t0.elapsed().as_secs_f64() * 1000.0);
        res
    }

    /// Like [`GraphBuilder::build`] but with the global failure as an error.
    pub async fn try_build(&self, namespace: &str, context: Option<&str>, kinds: &[String]) -> TopoResult<GraphResult> {
        if !valid_namespace(namespace) {
            return Err(TopoError::Validation(format!("invalid namespace: {:?}", namespace)));
        }
        let t0 = Instant::now();
        let ns_label = if namespace.is_empty() { "(all)" } else { namespace };
        info!(
            ns = %ns_label,
            ctx = ?context,
            kinds = kinds.len(),
            collector = self.collector.name(),
            "graph: build start"
        );

        let outcomes = self.fetch_all(namespace, context, kinds).await;
        let fetch_ms = t0.elapsed().as_millis();

        // all kinds have settled; the first fatal one (in kind order) wins
        let mut items = Vec::new();
        let mut warnings = Vec::new();
        for (kind, outcome) in kinds.iter().zip(outcomes) {
            match outcome? {
                KindOutcome::Items(list) => items.extend(list),
                KindOutcome::Degraded(reason) => {
                    warn!(kind = %kind, reason = %reason, "graph: kind degraded to empty");
                    counter!("graph_fetch_failures_total", 1, "kind" => kind.clone());
                    warnings.push(kind.clone());
                }
            }
        }
        info!(items = items.len(), degraded = warnings.len(), took_ms = %fetch_ms, "graph: fetch done");

        let n0 = Instant::now();
        let normalized = self.normalizer.normalize_all(items);
        info!(
            nodes = normalized.nodes.len(),
            skipped = normalized.skipped,
            took_ms = %n0.elapsed().as_millis(),
            "graph: normalize done"
        );

        let i0 = Instant::now();
        let edges = self.engine.infer(&normalized.nodes, &normalized.raw_by_uid);
        info!(edges = edges.len(), took_ms = %i0.elapsed().as_millis(), "graph: infer done");

        info!(took_ms = %t0.elapsed().as_millis(), "graph: build ok");
        Ok(GraphResult { nodes: normalized.nodes, edges, error: None, warnings })
    }

    /// Fetch every kind with bounded concurrency. Results come back in `kinds`
    /// order regardless of completion order.
    async fn fetch_all(&self, namespace: &str, context: Option<&str>, kinds: &[String]) -> Vec<TopoResult<KindOutcome>> {
        let fetches = kinds.iter().map(|kind| self.fetch_kind(kind, namespace, context));
        futures::stream::iter(fetches)
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await
    }

    async fn fetch_kind(&self, kind: &str, namespace: &str, context: Option<&str>) -> TopoResult<KindOutcome> {
        let t0 = Instant::now();
        let collector = Arc::clone(&self.collector);
        let timeout = self.config.fetch_timeout();
        let (k, ns, ctx) = (kind.to_string(), namespace.to_string(), context.map(|s| s.to_string()));
        // own task per kind: a panicking collector is contained and a timed
        // out fetch is dropped (killing any child process)
        let task = tokio::spawn(async move {
            tokio::time::timeout(timeout, collector.fetch_resource_list(&k, &ns, ctx.as_deref())).await
        });
        let joined = task
            .await
            .map_err(|e| TopoError::Internal(format!("fetch task for {} failed: {}", kind, e)))?;
        histogram!("graph_fetch_ms", t0.elapsed().as_secs_f64() * 1000.0, "kind" => kind.to_string());

        let out = match joined {
            Err(_) => return Ok(KindOutcome::Degraded(format!("timed out after {}s", timeout.as_secs()))),
            Ok(Err(e)) if e.is_fatal() => return Err(e.into()),
            Ok(Err(e)) => return Ok(KindOutcome::Degraded(e.to_string())),
            Ok(Ok(out)) => out,
        };
        if out.is_soft_failure() {
            return Ok(KindOutcome::Degraded(out.stderr.trim().to_string()));
        }
        if !out.stderr.trim().is_empty() {
            debug!(kind = %kind, stderr = %out.stderr.trim(), "graph: collector stderr alongside output");
        }
        match parse_resource_list(&out.stdout) {
            Ok(items) => {
                debug!(kind = %kind, items = items.len(), took_ms = %t0.elapsed().as_millis(), "graph: fetch ok");
                Ok(KindOutcome::Items(items))
            }
            Err(e) => Ok(KindOutcome::Degraded(format!("unparsable list: {}", e))),
        }
    }
}

/// One-shot build with default normalizer and rules.
pub async fn build_graph(
    collector: Arc<dyn ResourceCollector>,
    namespace: &str,
    context: Option<&str>,
    kinds: &[String],
) -> GraphResult {
    GraphBuilder::new(collector, GraphConfig::default()).build(namespace, context, kinds).await
}
