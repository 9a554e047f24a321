use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetail {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub code: String,
    pub request_id: String,
}

/// Errors surfaced to the caller of the generation pipeline.
///
/// Provider instability (understanding or synthesis failures) never shows up
/// here: it is absorbed by mock captions and the placeholder result.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("File too large: {0} bytes")]
    FileTooLarge(u64),

    #[error("Invalid MIME type: {0}")]
    InvalidMimeType(String),

    #[error("Image decode error: {0}")]
    Decode(String),

    #[error("Image fetch error: {0}")]
    Fetch(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn to_problem_detail(&self, request_id: &str) -> ProblemDetail {
        let (status, code, title, detail) = match self {
            PipelineError::Validation(detail) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Validation Error",
                detail.clone(),
            ),
            PipelineError::FileTooLarge(size) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "FILE_TOO_LARGE",
                "File Too Large",
                format!("Image size {} exceeds maximum allowed", size),
            ),
            PipelineError::InvalidMimeType(mime) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "INVALID_MIME_TYPE",
                "Invalid MIME Type",
                format!("MIME type '{}' is not supported, use JPG or PNG", mime),
            ),
            PipelineError::Decode(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "IMAGE_DECODE_FAILED",
                "Image Decode Failed",
                detail.clone(),
            ),
            PipelineError::Fetch(detail) => (
                StatusCode::BAD_GATEWAY,
                "IMAGE_FETCH_FAILED",
                "Image Fetch Failed",
                detail.clone(),
            ),
            PipelineError::Persistence(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PERSISTENCE_FAILED",
                "Persistence Failed",
                detail.clone(),
            ),
            PipelineError::Cancelled => (
                StatusCode::SERVICE_UNAVAILABLE,
                "REQUEST_CANCELLED",
                "Request Cancelled",
                "Generation was cancelled before completion".to_string(),
            ),
            PipelineError::Internal(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal Error",
                detail.clone(),
            ),
        };

        ProblemDetail {
            problem_type: format!("https://meme.local/problems/{}", code.to_lowercase()),
            title: title.to_string(),
            status: status.as_u16(),
            detail,
            code: code.to_string(),
            request_id: request_id.to_string(),
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::new_v4().to_string();
        let problem = self.to_problem_detail(&request_id);
        let status = StatusCode::from_u16(problem.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = (status, Json(problem)).into_response();
        if let Ok(value) = request_id.parse() {
            response.headers_mut().insert("X-Request-Id", value);
        }
        if let Ok(value) = "application/problem+json".parse() {
            response.headers_mut().insert("Content-Type", value);
        }
        response
    }
}

/// Failure reported by an external collaborator (understanding, synthesis,
/// transport). The message text is kept verbatim so it can be classified.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("provider returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("timed out after {0} seconds")]
    Timeout(u64),

    #[error("provider returned no image")]
    EmptyResult,

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_detail_codes_are_stable() {
        let pd = PipelineError::Validation("empty image".to_string()).to_problem_detail("req-1");
        assert_eq!(pd.status, 400);
        assert_eq!(pd.code, "VALIDATION_ERROR");
        assert_eq!(pd.request_id, "req-1");
        assert_eq!(pd.problem_type, "https://meme.local/problems/validation_error");

        let pd = PipelineError::Decode("bad png".to_string()).to_problem_detail("req-2");
        assert_eq!(pd.status, 422);
        assert_eq!(pd.detail, "bad png");

        let pd = PipelineError::Persistence("disk full".to_string()).to_problem_detail("req-3");
        assert_eq!(pd.status, 500);
        assert_eq!(pd.code, "PERSISTENCE_FAILED");
    }

    #[test]
    fn provider_status_error_keeps_message_text() {
        let err = ProviderError::Status {
            status: 429,
            message: "Quota exceeded for model".to_string(),
        };
        assert!(err.to_string().contains("Quota exceeded for model"));
    }
}
