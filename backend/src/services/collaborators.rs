//! Contracts for the external services the generation pipeline depends on.

use async_trait::async_trait;

use crate::models::error::{PipelineError, ProviderError};
use crate::models::generation::{ImageCaption, SynthesizedImage};

/// Describes an uploaded photo.
#[async_trait]
pub trait ImageUnderstanding: Send + Sync {
    async fn understand(&self, image_bytes: &[u8]) -> Result<ImageCaption, ProviderError>;
}

/// Produces an image for a prompt using one specific model.
#[async_trait]
pub trait ImageSynthesis: Send + Sync {
    async fn synthesize(
        &self,
        prompt: &str,
        model: &str,
        size: &str,
    ) -> Result<SynthesizedImage, ProviderError>;
}

/// Materialises a remote image reference into bytes.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ProviderError>;
}

/// Persists final images and returns their public reference.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn store(&self, bytes: &[u8], suffix: &str) -> Result<String, PipelineError>;
}
