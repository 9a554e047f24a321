use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::models::emotion::EmotionType;
use crate::models::error::PipelineError;
use crate::models::filter::FilterKind;
use crate::models::generation::{GenerationRequest, GenerationResult};
use crate::models::text_style::TextStyle;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    pub message: String,
    pub image_url: Option<String>,
    pub emotion: String,
    pub description: String,
}

impl From<GenerationResult> for GenerateResponse {
    fn from(result: GenerationResult) -> Self {
        let success = result.image_reference.is_some();
        let message = if success {
            format!("{} meme generated", result.emotion_label)
        } else {
            "Image synthesis is currently unavailable, returned a placeholder".to_string()
        };
        Self {
            success,
            message,
            image_url: result.image_reference,
            emotion: result.emotion_label,
            description: result.source_description,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CatalogEntry {
    pub code: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct EmotionsResponse {
    pub success: bool,
    pub emotions: Vec<CatalogEntry>,
}

#[derive(Debug, Serialize)]
pub struct FiltersResponse {
    pub success: bool,
    pub filters: Vec<CatalogEntry>,
}

#[derive(Default)]
struct GenerateForm {
    image: Option<Vec<u8>>,
    content_type: Option<String>,
    emotion: Option<String>,
    text: Option<String>,
    text_style: Option<String>,
    filter: Option<String>,
}

impl GenerateForm {
    fn into_request(self) -> Result<GenerationRequest, PipelineError> {
        let image_bytes = self
            .image
            .ok_or_else(|| PipelineError::Validation("No image in upload".to_string()))?;

        Ok(GenerationRequest {
            image_bytes,
            content_type: Some(
                self.content_type
                    .unwrap_or_else(|| "application/octet-stream".to_string()),
            ),
            emotion: self
                .emotion
                .as_deref()
                .map(EmotionType::resolve)
                .unwrap_or_default(),
            custom_text: self.text,
            text_style: self
                .text_style
                .as_deref()
                .filter(|raw| !raw.trim().is_empty())
                .map(|raw| TextStyle::from_json(Some(raw))),
            filter: Some(FilterKind::resolve(self.filter.as_deref())),
        })
    }
}

pub async fn generate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<GenerateResponse>, PipelineError> {
    let declared_len = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());

    let request = read_form(multipart, declared_len).await?.into_request()?;
    let cancel = state.shutdown.child_token();
    let result = state.pipeline.generate(request, &cancel).await?;

    Ok(Json(GenerateResponse::from(result)))
}

/// Body-limit rejections become `FileTooLarge` like any other oversized
/// upload; everything else is a malformed form.
fn multipart_error(e: MultipartError, declared_len: Option<u64>) -> PipelineError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        PipelineError::FileTooLarge(declared_len.unwrap_or(0))
    } else {
        PipelineError::Validation(format!("Multipart error: {}", e.body_text()))
    }
}

async fn read_form(mut multipart: Multipart, declared_len: Option<u64>) -> Result<GenerateForm, PipelineError> {
    let mut form = GenerateForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, declared_len))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                form.content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, declared_len))?;
                form.image = Some(data.to_vec());
            }
            "emotion" | "text" | "textStyle" | "filter" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, declared_len))?;
                match name.as_str() {
                    "emotion" => form.emotion = Some(value),
                    "text" => form.text = Some(value),
                    "textStyle" => form.text_style = Some(value),
                    _ => form.filter = Some(value),
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

pub async fn list_emotions() -> Json<EmotionsResponse> {
    Json(EmotionsResponse {
        success: true,
        emotions: EmotionType::ALL
            .iter()
            .map(|e| CatalogEntry {
                code: e.code(),
                name: e.display_name(),
                description: e.description(),
            })
            .collect(),
    })
}

pub async fn list_filters() -> Json<FiltersResponse> {
    Json(FiltersResponse {
        success: true,
        filters: FilterKind::ALL
            .iter()
            .map(|f| CatalogEntry {
                code: f.code(),
                name: f.display_name(),
                description: f.description(),
            })
            .collect(),
    })
}
