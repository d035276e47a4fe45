//! Collector over a directory of dumped list files (`<dir>/<kind>.json`).

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{check_request, CollectError, FetchOutput, ResourceCollector};

/// Serves `kubectl get <kind> -o json` output saved to disk. Namespace and
/// context are ignored; the dump is whatever was captured.
#[derive(Debug, Clone)]
pub struct FileCollector {
    dir: PathBuf,
}

impl FileCollector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, kind: &str) -> PathBuf {
        self.dir.join(format!("{}.json", kind))
    }
}

#[async_trait::async_trait]
impl ResourceCollector for FileCollector {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch_resource_list(
        &self,
        kind: &str,
        namespace: &str,
        _context: Option<&str>,
    ) -> Result<FetchOutput, CollectError> {
        check_request(kind, namespace)?;
        match tokio::fs::metadata(&self.dir).await {
            Ok(m) if m.is_dir() => {}
            _ => {
                return Err(CollectError::Unavailable(format!(
                    "dump directory not found: {}",
                    self.dir.display()
                )))
            }
        }
        let path = self.path_for(kind);
        debug!(path = %path.display(), "collector: reading dump");
        let stdout = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| CollectError::fetch(kind, format!("{}: {}", path.display(), e)))?;
        Ok(FetchOutput::json(stdout))
    }
}
