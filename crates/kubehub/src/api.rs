//! kube-rs backed collector: discovery plus dynamic list per kind.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use kube::{
    api::{Api, ListParams},
    config::{KubeConfigOptions, Kubeconfig},
    core::{ApiResource, DynamicObject, TypeMeta},
    discovery::{Discovery, Scope},
    Client, Config,
};
use metrics::histogram;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{check_request, CollectError, FetchOutput, ResourceCollector};

struct Cluster {
    client: Client,
    discovery: Discovery,
}

/// Bound on building a client plus discovery; a hanging API server must
/// surface as an unreachable collector, not as per-kind timeouts.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Talks to the API server directly. One client and discovery run per
/// kube context, cached for the collector's lifetime.
pub struct KubeApiCollector {
    clusters: Mutex<HashMap<Option<String>, Arc<Cluster>>>,
    kubeconfig: Option<Kubeconfig>,
    connect_timeout: Duration,
}

impl Default for KubeApiCollector {
    fn default() -> Self {
        Self { clusters: Mutex::default(), kubeconfig: None, connect_timeout: DEFAULT_CONNECT_TIMEOUT }
    }
}

impl KubeApiCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use this kubeconfig instead of the ambient one.
    pub fn with_kubeconfig(mut self, kubeconfig: Kubeconfig) -> Self {
        self.kubeconfig = Some(kubeconfig);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    async fn connect(&self, context: Option<&str>) -> Result<Cluster> {
        let t0 = Instant::now();
        let opts = KubeConfigOptions { context: context.map(|c| c.to_string()), ..Default::default() };
        let config = match (&self.kubeconfig, context) {
            (Some(kc), _) => Config::from_custom_kubeconfig(kc.clone(), &opts)
                .await
                .context("loading supplied kubeconfig")?,
            (None, Some(ctx)) => Config::from_kubeconfig(&opts)
                .await
                .with_context(|| format!("loading kubeconfig context {}", ctx))?,
            (None, None) => Config::infer().await.context("inferring kube config")?,
        };
        let client = Client::try_from(config).context("building kube client")?;
        let discovery = Discovery::new(client.clone()).run().await.context("running API discovery")?;
        histogram!("collector_discovery_ms", t0.elapsed().as_secs_f64() * 1000.0);
        info!(ctx = ?context, took_ms = %t0.elapsed().as_millis(), "collector: kube discovery ok");
        Ok(Cluster { client, discovery })
    }

    async fn cluster(&self, context: Option<&str>) -> Result<Arc<Cluster>, CollectError> {
        let key = context.map(|s| s.to_string());
        let mut clusters = self.clusters.lock().await;
        if let Some(c) = clusters.get(&key) {
            return Ok(Arc::clone(c));
        }
        // failures are not cached; the next caller retries
        let connected = tokio::time::timeout(self.connect_timeout, self.connect(context))
            .await
            .map_err(|_| {
                CollectError::Unavailable(format!(
                    "kube API not reachable: connect timed out after {}ms",
                    self.connect_timeout.as_millis()
                ))
            })?
            .map_err(|e| CollectError::Unavailable(format!("{:#}", e)))?;
        let c = Arc::new(connected);
        clusters.insert(key, Arc::clone(&c));
        Ok(c)
    }
}

/// Resolve `pods`, `Pod` or `deployments.apps` to an API resource.
fn find_api_resource(discovery: &Discovery, kind: &str) -> Option<(ApiResource, bool)> {
    let (name, group) = match kind.split_once('.') {
        Some((n, g)) => (n, Some(g)),
        None => (kind, None),
    };
    for g in discovery.groups() {
        for (ar, caps) in g.recommended_resources() {
            if let Some(group) = group {
                if !ar.group.eq_ignore_ascii_case(group) {
                    continue;
                }
            }
            if ar.plural.eq_ignore_ascii_case(name) || ar.kind.eq_ignore_ascii_case(name) {
                return Some((ar, matches!(caps.scope, Scope::Namespaced)));
            }
        }
    }
    None
}

fn strip_managed_fields(v: &mut serde_json::Value) {
    if let Some(meta) = v.get_mut("metadata").and_then(|m| m.as_object_mut()) {
        meta.remove("managedFields");
    }
}

#[async_trait::async_trait]
impl ResourceCollector for KubeApiCollector {
    fn name(&self) -> &'static str {
        "kube-api"
    }

    async fn fetch_resource_list(
        &self,
        kind: &str,
        namespace: &str,
        context: Option<&str>,
    ) -> Result<FetchOutput, CollectError> {
        check_request(kind, namespace)?;
        let cluster = self.cluster(context).await?;
        let (ar, namespaced) = find_api_resource(&cluster.discovery, kind)
            .ok_or_else(|| CollectError::fetch(kind, "resource type not served by the cluster"))?;
        let api: Api<DynamicObject> = if namespaced && !namespace.is_empty() {
            Api::namespaced_with(cluster.client.clone(), namespace, &ar)
        } else {
            Api::all_with(cluster.client.clone(), &ar)
        };
        let t0 = Instant::now();
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| CollectError::fetch(kind, e))?;
        let mut items = Vec::with_capacity(list.items.len());
        for mut obj in list.items {
            // list items come back without apiVersion/kind
            obj.types = Some(TypeMeta { api_version: ar.api_version.clone(), kind: ar.kind.clone() });
            let mut v = serde_json::to_value(&obj).map_err(|e| CollectError::fetch(kind, e))?;
            strip_managed_fields(&mut v);
            items.push(v);
        }
        debug!(kind = %kind, ns = %namespace, items = items.len(), took_ms = %t0.elapsed().as_millis(), "collector: kube list ok");
        let body = serde_json::json!({ "apiVersion": "v1", "kind": "List", "items": items });
        Ok(FetchOutput::json(body.to_string()))
    }
}
