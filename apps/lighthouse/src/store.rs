//! # Artifact Store
//!
//! Saves and loads artifact sets as `<dir>/artifacts.json`.

use lighthouse_core::{Artifacts, BoxFuture, LighthouseError, Store};
use std::path::Path;

/// File holding the artifacts inside an artifacts directory.
pub const ARTIFACTS_FILE: &str = "artifacts.json";

/// File-system store. The directory is created on save.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStore;

impl FsStore {
    async fn read(dir: &Path) -> Result<Artifacts, LighthouseError> {
        let file = dir.join(ARTIFACTS_FILE);
        let text = tokio::fs::read_to_string(&file).await.map_err(|e| {
            LighthouseError::Store(format!("Cannot read artifacts '{}': {}", file.display(), e))
        })?;
        let artifacts: Artifacts = serde_json::from_str(&text).map_err(|e| {
            LighthouseError::Serialization(format!("Invalid artifacts '{}': {}", file.display(), e))
        })?;
        tracing::info!(path = %file.display(), url = %artifacts.url.requested_url, "artifacts loaded");
        Ok(artifacts)
    }

    async fn write(artifacts: &Artifacts, dir: &Path) -> Result<(), LighthouseError> {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            LighthouseError::Store(format!("Cannot create '{}': {}", dir.display(), e))
        })?;
        let text = serde_json::to_string_pretty(artifacts)
            .map_err(|e| LighthouseError::Serialization(e.to_string()))?;
        let file = dir.join(ARTIFACTS_FILE);
        tokio::fs::write(&file, text).await.map_err(|e| {
            LighthouseError::Store(format!("Cannot write artifacts '{}': {}", file.display(), e))
        })?;
        tracing::debug!(path = %file.display(), "artifacts written");
        Ok(())
    }
}

impl Store for FsStore {
    fn load<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<Artifacts, LighthouseError>> {
        Box::pin(Self::read(path))
    }

    fn save<'a>(
        &'a self,
        artifacts: &'a Artifacts,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<(), LighthouseError>> {
        Box::pin(Self::write(artifacts, path))
    }
}
