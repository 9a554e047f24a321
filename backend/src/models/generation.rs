use serde::{Deserialize, Serialize};

use crate::models::emotion::EmotionType;
use crate::models::filter::FilterKind;
use crate::models::text_style::TextStyle;

/// Ordered, non-empty list of synthesis model ids, most preferred first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCandidates(Vec<String>);

impl ModelCandidates {
    /// Returns `None` for an empty list.
    pub fn new(models: Vec<String>) -> Option<Self> {
        if models.is_empty() {
            None
        } else {
            Some(Self(models))
        }
    }

    pub fn single(model: impl Into<String>) -> Self {
        Self(vec![model.into()])
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// One meme generation request, built by the HTTP layer.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub image_bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub emotion: EmotionType,
    pub custom_text: Option<String>,
    pub text_style: Option<TextStyle>,
    pub filter: Option<FilterKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    /// `None` when every synthesis model failed.
    pub image_reference: Option<String>,
    pub source_description: String,
    pub emotion_label: String,
}

impl GenerationResult {
    /// Result returned when no model produced an image.
    pub fn placeholder(emotion: EmotionType) -> Self {
        Self {
            image_reference: None,
            source_description: format!("Placeholder {} expression", emotion.display_name()),
            emotion_label: emotion.display_name().to_string(),
        }
    }
}

/// What the understanding collaborator says about the uploaded photo.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageCaption {
    pub description: String,
    #[serde(rename = "text", default)]
    pub short_caption: String,
}

/// First image of a synthesis response, decoded once at the provider boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesizedImage {
    /// Remote URL to fetch.
    Url(String),
    /// `data:image/...;base64,` payload.
    Embedded(String),
    Empty,
}

impl SynthesizedImage {
    /// Classifies a raw reference string.
    pub fn from_reference(reference: &str) -> Self {
        let reference = reference.trim();
        if reference.is_empty() {
            SynthesizedImage::Empty
        } else if reference.starts_with("data:image/") {
            SynthesizedImage::Embedded(reference.to_string())
        } else {
            SynthesizedImage::Url(reference.to_string())
        }
    }

    /// The non-empty reference, if any.
    pub fn reference(&self) -> Option<&str> {
        match self {
            SynthesizedImage::Url(r) | SynthesizedImage::Embedded(r) => Some(r),
            SynthesizedImage::Empty => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_candidate_list_is_rejected() {
        assert!(ModelCandidates::new(vec![]).is_none());
        let models = ModelCandidates::new(vec!["a".into(), "b".into()]).unwrap();
        assert_eq!(models.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn references_are_classified() {
        assert_eq!(
            SynthesizedImage::from_reference("https://x/img.png"),
            SynthesizedImage::Url("https://x/img.png".into())
        );
        assert!(matches!(
            SynthesizedImage::from_reference("data:image/png;base64,AAAA"),
            SynthesizedImage::Embedded(_)
        ));
        assert_eq!(SynthesizedImage::from_reference("  "), SynthesizedImage::Empty);
        assert_eq!(SynthesizedImage::Empty.reference(), None);
    }

    #[test]
    fn placeholder_has_no_image() {
        let result = GenerationResult::placeholder(EmotionType::Angry);
        assert!(result.image_reference.is_none());
        assert_eq!(result.emotion_label, "生气");
        assert!(result.source_description.contains("生气"));
    }
}
