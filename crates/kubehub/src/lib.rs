//! Topology kubehub – collectors that fetch raw resource lists per kind.
//!
//! A collector answers one question: "give me the JSON list for this kind in this
//! namespace". Interpreting the payload (and tolerating its failure) is the graph
//! builder's job.

#![forbid(unsafe_code)]

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

mod api;
mod file;
mod kubectl;

pub use api::{KubeApiCollector, DEFAULT_CONNECT_TIMEOUT};
pub use file::FileCollector;
pub use kubectl::KubectlCollector;

/// Raw collector output for one kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FetchOutput {
    pub stdout: String,
    pub stderr: String,
}

impl FetchOutput {
    pub fn json(stdout: impl Into<String>) -> Self {
        Self { stdout: stdout.into(), stderr: String::new() }
    }

    /// stderr with no stdout: the kind failed.
    pub fn is_soft_failure(&self) -> bool {
        self.stdout.trim().is_empty() && !self.stderr.trim().is_empty()
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CollectError {
    /// The collector itself cannot be reached; aborts the whole build.
    #[error("{0}")]
    Unavailable(String),
    /// One kind could not be fetched; that kind contributes nothing.
    #[error("fetch {kind}: {message}")]
    Fetch { kind: String, message: String },
}

impl CollectError {
    pub fn fetch(kind: &str, message: impl std::fmt::Display) -> Self {
        CollectError::Fetch { kind: kind.to_string(), message: message.to_string() }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, CollectError::Unavailable(_))
    }
}

/// Source of raw resource lists.
#[async_trait::async_trait]
pub trait ResourceCollector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch the list payload (`{"items": [...]}`) for `kind` in `namespace`.
    /// An empty namespace means all namespaces.
    async fn fetch_resource_list(
        &self,
        kind: &str,
        namespace: &str,
        context: Option<&str>,
    ) -> Result<FetchOutput, CollectError>;
}

static KIND_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9.]*[A-Za-z0-9])?$").ok());
static NAMESPACE_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").ok());

/// Resource kind token: `pods`, `Deployment`, `deployments.apps`.
pub fn valid_kind(kind: &str) -> bool {
    KIND_RE.as_ref().map(|re| re.is_match(kind)).unwrap_or(false)
}

/// DNS-1123 label (or empty for all namespaces).
pub fn valid_namespace(ns: &str) -> bool {
    ns.is_empty() || (ns.len() <= 63 && NAMESPACE_RE.as_ref().map(|re| re.is_match(ns)).unwrap_or(false))
}

fn check_request(kind: &str, namespace: &str) -> Result<(), CollectError> {
    if !valid_kind(kind) {
        return Err(CollectError::fetch(kind, "invalid resource kind"));
    }
    if !valid_namespace(namespace) {
        return Err(CollectError::fetch(kind, format!("invalid namespace: {:?}", namespace)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_namespace_tokens() {
        for k in ["pods", "Deployment", "deployments.apps", "ingresses.networking.k8s.io"] {
            assert!(valid_kind(k), "{}", k);
        }
        for k in ["", "pods;rm -rf", "-o", "pods ", "a/b"] {
            assert!(!valid_kind(k), "{}", k);
        }
        assert!(valid_namespace(""));
        assert!(valid_namespace("test-ns"));
        assert!(!valid_namespace("Test"));
        assert!(!valid_namespace("--all-namespaces"));
        assert!(!valid_namespace(&"a".repeat(64)));
    }

    #[test]
    fn soft_failure_needs_stderr_without_stdout() {
        assert!(FetchOutput { stdout: " ".into(), stderr: "boom".into() }.is_soft_failure());
        assert!(!FetchOutput { stdout: "{}".into(), stderr: "warning".into() }.is_soft_failure());
        assert!(!FetchOutput::default().is_soft_failure());
    }

    #[test]
    fn fatal_only_when_unavailable() {
        assert!(CollectError::Unavailable("x".into()).is_fatal());
        assert!(!CollectError::fetch("pods", "x").is_fatal());
        assert_eq!(CollectError::Unavailable("kubectl missing".into()).to_string(), "kubectl missing");
    }
}
