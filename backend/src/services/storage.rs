use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::info;

use crate::models::error::PipelineError;
use crate::services::collaborators::ImageStore;

/// Writes finished memes to a directory served under `base_url`.
pub struct OutputStore {
    dir: PathBuf,
    base_url: String,
}

impl OutputStore {
    pub async fn new(dir: impl Into<PathBuf>, base_url: &str) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ImageStore for OutputStore {
    /// Files are written under a `.partial` name and renamed once complete, so
    /// a returned reference always points at a whole image.
    async fn store(&self, bytes: &[u8], suffix: &str) -> Result<String, PipelineError> {
        let name = format!("meme_{}.{}", uuid::Uuid::new_v4().simple(), suffix);
        let path = self.dir.join(&name);
        let partial = self.dir.join(format!("{}.partial", name));

        fs::write(&partial, bytes)
            .await
            .map_err(|e| PipelineError::Persistence(format!("Failed to write {}: {}", name, e)))?;
        if let Err(e) = fs::rename(&partial, &path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(PipelineError::Persistence(format!("Failed to finalize {}: {}", name, e)));
        }

        info!(file = %name, size = bytes.len(), "Meme stored");
        Ok(format!("{}/{}", self.base_url, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_under_unique_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path().join("out"), "/output/").await.unwrap();

        let first = store.store(b"one", "png").await.unwrap();
        let second = store.store(b"two", "png").await.unwrap();
        assert_ne!(first, second);
        assert!(first.starts_with("/output/meme_"));
        assert!(first.ends_with(".png"));

        let name = first.trim_start_matches("/output/");
        assert_eq!(std::fs::read(dir.path().join("out").join(name)).unwrap(), b"one");

        let leftovers = std::fs::read_dir(dir.path().join("out"))
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn missing_directory_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path().join("out"), "/output").await.unwrap();
        std::fs::remove_dir_all(dir.path().join("out")).unwrap();

        let err = store.store(b"bytes", "png").await.unwrap_err();
        assert!(matches!(err, PipelineError::Persistence(_)));
    }
}
