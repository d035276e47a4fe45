//! `kubectl get <kind> -o json` as a collector.

use std::io::ErrorKind;
use std::time::Instant;

use tokio::process::Command;
use tracing::{debug, info};

use crate::{check_request, CollectError, FetchOutput, ResourceCollector};

/// Runs the kubectl binary once per kind. A missing binary makes the collector
/// unavailable; a non-zero exit is returned as output for the caller to judge.
#[derive(Debug, Clone)]
pub struct KubectlCollector {
    binary: String,
}

impl Default for KubectlCollector {
    fn default() -> Self {
        Self::new("kubectl")
    }
}

impl KubectlCollector {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn args(kind: &str, namespace: &str, context: Option<&str>) -> Vec<String> {
        let mut args = vec!["get".to_string(), kind.to_string()];
        if namespace.is_empty() {
            args.push("--all-namespaces".into());
        } else {
            args.push("-n".into());
            args.push(namespace.to_string());
        }
        if let Some(ctx) = context.filter(|c| !c.is_empty()) {
            args.push(format!("--context={}", ctx));
        }
        args.push("-o".into());
        args.push("json".into());
        args
    }
}

#[async_trait::async_trait]
impl ResourceCollector for KubectlCollector {
    fn name(&self) -> &'static str {
        "kubectl"
    }

    async fn fetch_resource_list(
        &self,
        kind: &str,
        namespace: &str,
        context: Option<&str>,
    ) -> Result<FetchOutput, CollectError> {
        check_request(kind, namespace)?;
        let args = Self::args(kind, namespace, context);
        let t0 = Instant::now();
        debug!(binary = %self.binary, args = ?args, "collector: kubectl spawn");
        let out = Command::new(&self.binary)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => CollectError::Unavailable(format!("{} not found on PATH", self.binary)),
                ErrorKind::PermissionDenied => CollectError::Unavailable(format!("{} is not executable", self.binary)),
                _ => CollectError::Unavailable(format!("failed to run {}: {}", self.binary, e)),
            })?;
        let stdout = String::from_utf8_lossy(&out.stdout).into_owned();
        let mut stderr = String::from_utf8_lossy(&out.stderr).into_owned();
        if !out.status.success() && stderr.trim().is_empty() {
            stderr = format!("{} exited with {}", self.binary, out.status);
        }
        info!(
            kind = %kind,
            ns = %namespace,
            code = ?out.status.code(),
            stdout_bytes = stdout.len(),
            took_ms = %t0.elapsed().as_millis(),
            "collector: kubectl done"
        );
        Ok(FetchOutput { stdout, stderr })
    }
}
