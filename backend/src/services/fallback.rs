use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::models::emotion::EmotionType;
use crate::models::error::{PipelineError, ProviderError};
use crate::models::generation::{GenerationResult, ModelCandidates};
use crate::services::collaborators::ImageSynthesis;
use crate::services::prompt::build_prompt;

/// Markers of credit or quota exhaustion in provider error text.
const QUOTA_MARKERS: &[&str] = &[
    "quota",
    "limit",
    "exceeded",
    "insufficient",
    "额度",
    "余额不足",
    "配额",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    QuotaExhausted,
    ProviderError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::QuotaExhausted => "quota_exhausted",
            FailureKind::ProviderError => "provider_error",
        }
    }
}

/// Labels a failed attempt for logs. Has no influence on which model is
/// tried next.
pub fn classify_failure(message: &str) -> FailureKind {
    let lower = message.to_lowercase();
    if QUOTA_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureKind::QuotaExhausted
    } else {
        FailureKind::ProviderError
    }
}

/// Tries synthesis models one at a time in priority order and keeps the first
/// image produced.
pub struct ModelFallback {
    synthesis: Arc<dyn ImageSynthesis>,
    size: String,
    attempt_timeout: Duration,
}

impl ModelFallback {
    pub fn new(synthesis: Arc<dyn ImageSynthesis>, size: impl Into<String>, attempt_timeout: Duration) -> Self {
        Self {
            synthesis,
            size: size.into(),
            attempt_timeout,
        }
    }

    /// Returns the first successful reference, or the placeholder result when
    /// every model fails. The only error is cancellation, observed before each
    /// attempt and while one is in flight.
    pub async fn synthesize(
        &self,
        caption: &str,
        emotion: EmotionType,
        models: &ModelCandidates,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, PipelineError> {
        for (attempt, model) in models.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            let prompt = build_prompt(caption, emotion);
            info!(model = %model, attempt = attempt + 1, "Requesting image synthesis");

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                outcome = self.attempt(&prompt, model) => outcome,
            };

            match outcome {
                Ok(reference) => {
                    info!(model = %model, attempt = attempt + 1, "Image synthesis succeeded");
                    return Ok(GenerationResult {
                        image_reference: Some(reference),
                        source_description: caption.to_string(),
                        emotion_label: emotion.display_name().to_string(),
                    });
                }
                Err(e) => {
                    let message = e.to_string();
                    warn!(
                        model = %model,
                        attempt = attempt + 1,
                        reason = classify_failure(&message).as_str(),
                        error = %message,
                        "Image synthesis failed, trying next model",
                    );
                }
            }
        }

        error!(emotion = emotion.code(), "All synthesis models failed, returning placeholder");
        Ok(GenerationResult::placeholder(emotion))
    }

    async fn attempt(&self, prompt: &str, model: &str) -> Result<String, ProviderError> {
        let image = tokio::time::timeout(
            self.attempt_timeout,
            self.synthesis.synthesize(prompt, model, &self.size),
        )
        .await
        .map_err(|_| ProviderError::Timeout(self.attempt_timeout.as_secs()))??;

        image
            .reference()
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .ok_or(ProviderError::EmptyResult)
    }
}
