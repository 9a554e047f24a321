use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::models::error::ProviderError;
use crate::services::collaborators::ImageFetcher;

/// Downloads synthesized images. References under the public output prefix
/// are read straight from the output directory instead.
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    output_dir: PathBuf,
    output_base_url: String,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, output_dir: impl Into<PathBuf>, output_base_url: &str) -> Self {
        Self {
            client: Client::new(),
            timeout,
            output_dir: output_dir.into(),
            output_base_url: output_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Path of a reference served from the output directory. Only the final
    /// path segment is used so references cannot escape the directory.
    fn local_path(&self, url: &str) -> Option<PathBuf> {
        if self.output_base_url.is_empty() {
            return None;
        }
        let rest = url.strip_prefix(&self.output_base_url)?.strip_prefix('/')?;
        let name = Path::new(rest).file_name()?;
        Some(self.output_dir.join(name))
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        if let Some(path) = self.local_path(url) {
            debug!(path = %path.display(), "Reading local output image");
            return tokio::fs::read(&path)
                .await
                .map_err(|e| ProviderError::Request(format!("failed to read {}: {}", path.display(), e)));
        }

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout.as_secs())
                } else {
                    ProviderError::from(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "Image download failed");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message: format!("image download returned {}", status),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ProviderError::EmptyResult);
        }
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_references_map_into_output_dir() {
        let fetcher = HttpFetcher::new(Duration::from_secs(5), "/srv/out", "/output/");
        assert_eq!(
            fetcher.local_path("/output/meme_1.png"),
            Some(PathBuf::from("/srv/out/meme_1.png"))
        );
        assert_eq!(
            fetcher.local_path("/output/../etc/passwd"),
            Some(PathBuf::from("/srv/out/passwd"))
        );
        assert_eq!(fetcher.local_path("https://cdn.example.com/output/a.png"), None);
        assert_eq!(fetcher.local_path("/outputs/a.png"), None);
    }

    #[tokio::test]
    async fn reads_local_output_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("meme_a.png"), b"png-bytes").unwrap();
        let fetcher = HttpFetcher::new(Duration::from_secs(5), dir.path(), "/output");

        assert_eq!(fetcher.fetch("/output/meme_a.png").await.unwrap(), b"png-bytes");
        assert!(fetcher.fetch("/output/missing.png").await.is_err());
    }
}
