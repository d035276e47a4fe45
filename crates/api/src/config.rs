//! Build configuration: which kinds to fetch, what to drop, how long to wait.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use topo_core::normalize::DEFAULT_EXCLUDED_KINDS;

/// Kinds fetched per build unless configured otherwise.
pub const DEFAULT_KINDS: &[&str] = &[
    "deployments",
    "statefulsets",
    "daemonsets",
    "replicasets",
    "pods",
    "services",
    "ingresses",
    "configmaps",
    "secrets",
    "persistentvolumeclaims",
    "serviceaccounts",
];

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphConfig {
    pub kinds: Vec<String>,
    pub exclude_kinds: Vec<String>,
    /// Per-kind fetch timeout; a timed out kind degrades like any other failure.
    pub fetch_timeout_secs: u64,
    pub max_concurrency: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            kinds: DEFAULT_KINDS.iter().map(|s| s.to_string()).collect(),
            exclude_kinds: DEFAULT_EXCLUDED_KINDS.iter().map(|s| s.to_string()).collect(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl GraphConfig {
    /// Defaults overridden by `TOPO_KINDS`, `TOPO_EXCLUDE_KINDS`,
    /// `TOPO_FETCH_TIMEOUT_SECS` and `TOPO_FETCH_CONCURRENCY`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`GraphConfig::from_env`] over an arbitrary variable source.
    /// Unparsable or empty values keep the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(kinds) = lookup("TOPO_KINDS").and_then(|s| split_list(&s)) {
            cfg.kinds = kinds;
        }
        if let Some(excl) = lookup("TOPO_EXCLUDE_KINDS").and_then(|s| split_list(&s)) {
            cfg.exclude_kinds = excl;
        }
        if let Some(secs) = lookup("TOPO_FETCH_TIMEOUT_SECS").and_then(|s| s.trim().parse::<u64>().ok()).filter(|n| *n > 0) {
            cfg.fetch_timeout_secs = secs;
        }
        if let Some(n) = lookup("TOPO_FETCH_CONCURRENCY").and_then(|s| s.trim().parse::<usize>().ok()).filter(|n| *n > 0) {
            cfg.max_concurrency = n;
        }
        cfg
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn with_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kinds = kinds.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclude_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_kinds = kinds.into_iter().map(Into::into).collect();
        self
    }
}

/// Comma separated list; `None` when nothing but separators/whitespace.
pub fn split_list(s: &str) -> Option<Vec<String>> {
    let v: Vec<String> = s.split(',').map(str::trim).filter(|p| !p.is_empty()).map(|p| p.to_string()).collect();
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}
