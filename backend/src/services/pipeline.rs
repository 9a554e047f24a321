use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::models::config::AppConfig;
use crate::models::error::PipelineError;
use crate::models::filter::FilterKind;
use crate::models::generation::{GenerationRequest, GenerationResult, ModelCandidates, SynthesizedImage};
use crate::models::text_style::TextStyle;
use crate::services::collaborators::{ImageFetcher, ImageStore, ImageSynthesis, ImageUnderstanding};
use crate::services::compose::compose;
use crate::services::fallback::ModelFallback;
use crate::services::filters;
use crate::services::imaging::{decode_data_url, encode_png, load_image};
use crate::services::typeface::FontLibrary;

const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png"];

/// Captions used when the understanding service is unavailable.
const MOCK_CAPTIONS: &[&str] = &[
    "An expressive picture",
    "A fun picture",
    "A vivid expression",
    "A funny picture",
];

pub struct Collaborators {
    pub understanding: Arc<dyn ImageUnderstanding>,
    pub synthesis: Arc<dyn ImageSynthesis>,
    pub fetcher: Arc<dyn ImageFetcher>,
    pub store: Arc<dyn ImageStore>,
}

/// Photo in, meme reference out: validate, caption, synthesize, filter,
/// caption text, persist.
pub struct GenerationPipeline {
    understanding: Arc<dyn ImageUnderstanding>,
    fallback: ModelFallback,
    fetcher: Arc<dyn ImageFetcher>,
    store: Arc<dyn ImageStore>,
    fonts: Arc<FontLibrary>,
    models: ModelCandidates,
    understand_timeout: Duration,
    max_upload_bytes: u64,
    caption_seed: Option<u64>,
}

impl GenerationPipeline {
    pub fn new(config: &AppConfig, collaborators: Collaborators, fonts: Arc<FontLibrary>) -> Self {
        Self {
            understanding: collaborators.understanding,
            fallback: ModelFallback::new(
                collaborators.synthesis,
                config.image_size.clone(),
                config.synthesize_timeout(),
            ),
            fetcher: collaborators.fetcher,
            store: collaborators.store,
            fonts,
            models: config.model_candidates(),
            understand_timeout: config.understand_timeout(),
            max_upload_bytes: config.max_upload_bytes,
            caption_seed: config.caption_seed,
        }
    }

    /// Runs one request. Mock captions come from `CAPTION_SEED` when it is
    /// set, otherwise from OS entropy.
    pub async fn generate(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, PipelineError> {
        let mut rng = match self.caption_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        self.generate_with_rng(request, cancel, &mut rng).await
    }

    pub async fn generate_with_rng<R: Rng + Send>(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
        rng: &mut R,
    ) -> Result<GenerationResult, PipelineError> {
        self.validate(&request)?;
        let emotion = request.emotion;
        info!(emotion = emotion.code(), bytes = request.image_bytes.len(), "Generating meme");

        let caption = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
            caption = self.caption(&request.image_bytes, rng) => caption,
        };

        let synthesized = self
            .fallback
            .synthesize(&caption, emotion, &self.models, cancel)
            .await?;
        let Some(reference) = synthesized.image_reference else {
            return Ok(synthesized);
        };

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let bytes = self.materialize(&reference).await?;

        let filter = request.filter.unwrap_or_default();
        let text = request
            .custom_text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        let style = request.text_style.unwrap_or_default();
        let fonts = self.fonts.clone();

        let png = tokio::task::spawn_blocking(move || {
            let image = load_image(&bytes)?;
            let image = post_process(image, filter, text.as_deref(), &style, &fonts);
            encode_png(&image)
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("Post-processing task failed: {}", e)))??;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let stored = self.store.store(&png, "png").await?;
        info!(emotion = emotion.code(), reference = %stored, "Meme generated");

        Ok(GenerationResult {
            image_reference: Some(stored),
            source_description: synthesized.source_description,
            emotion_label: synthesized.emotion_label,
        })
    }

    fn validate(&self, request: &GenerationRequest) -> Result<(), PipelineError> {
        if request.image_bytes.is_empty() {
            return Err(PipelineError::Validation("Image is empty".to_string()));
        }
        if request.image_bytes.len() as u64 > self.max_upload_bytes {
            return Err(PipelineError::FileTooLarge(request.image_bytes.len() as u64));
        }
        if let Some(content_type) = request.content_type.as_deref() {
            let lower = content_type.to_ascii_lowercase();
            if !ALLOWED_CONTENT_TYPES.iter().any(|t| lower.starts_with(t)) {
                return Err(PipelineError::InvalidMimeType(content_type.to_string()));
            }
        }
        Ok(())
    }

    async fn caption<R: Rng + Send>(&self, image_bytes: &[u8], rng: &mut R) -> String {
        let outcome = tokio::time::timeout(self.understand_timeout, self.understanding.understand(image_bytes)).await;
        match outcome {
            Ok(Ok(caption)) => {
                info!(short_caption = %caption.short_caption, "Image understood");
                caption.description
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Image understanding failed, using mock caption");
                mock_caption(rng).to_string()
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.understand_timeout.as_secs(),
                    "Image understanding timed out, using mock caption"
                );
                mock_caption(rng).to_string()
            }
        }
    }

    async fn materialize(&self, reference: &str) -> Result<Vec<u8>, PipelineError> {
        match SynthesizedImage::from_reference(reference) {
            SynthesizedImage::Embedded(data) => decode_data_url(&data),
            SynthesizedImage::Url(url) => self
                .fetcher
                .fetch(&url)
                .await
                .map_err(|e| PipelineError::Fetch(e.to_string())),
            SynthesizedImage::Empty => Err(PipelineError::Internal("empty image reference".to_string())),
        }
    }
}

fn mock_caption<R: Rng>(rng: &mut R) -> &'static str {
    MOCK_CAPTIONS.choose(rng).copied().unwrap_or(MOCK_CAPTIONS[0])
}

/// Filter first, then text. The order is part of the output contract.
fn post_process(
    image: RgbaImage,
    filter: FilterKind,
    text: Option<&str>,
    style: &TextStyle,
    fonts: &FontLibrary,
) -> RgbaImage {
    let image = filters::apply(image, filter);
    match text {
        Some(text) => {
            let face = fonts.resolve(&style.font_family);
            compose(&image, text, style, face.as_ref())
        }
        None => image,
    }
}
