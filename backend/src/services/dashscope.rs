use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::config::AppConfig;
use crate::models::error::ProviderError;
use crate::models::generation::{ImageCaption, SynthesizedImage};
use crate::services::collaborators::{ImageSynthesis, ImageUnderstanding};

const UNDERSTAND_PROMPT: &str = "Look carefully at this image and describe its content and mood. \
Reply in JSON only, formatted as {\"description\": \"image description\", \"text\": \"short caption\"}";

/// DashScope client for image understanding (multimodal chat) and image
/// synthesis (async text-to-image tasks).
pub struct DashScopeClient {
    config: Arc<AppConfig>,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    input: ChatInput,
}

#[derive(Debug, Serialize)]
struct ChatInput {
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ChatPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatPart {
    Image { image: String },
    Text { text: String },
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    output: Option<ChatOutput>,
}

#[derive(Debug, Deserialize)]
struct ChatOutput {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Vec<ChatResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ChatResponsePart {
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct SynthesisRequest<'a> {
    model: &'a str,
    input: SynthesisInput<'a>,
    parameters: SynthesisParameters<'a>,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
struct SynthesisParameters<'a> {
    size: &'a str,
    n: u32,
}

#[derive(Debug, Deserialize)]
struct TaskResponse {
    output: TaskOutput,
}

#[derive(Debug, Deserialize)]
struct TaskOutput {
    task_id: Option<String>,
    task_status: Option<String>,
    #[serde(default)]
    results: Vec<TaskResult>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskResult {
    url: Option<String>,
    b64_image: Option<String>,
    b64_encoded: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<String>,
    message: Option<String>,
}

impl DashScopeClient {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.dashscope_base_url.trim_end_matches('/'), path)
    }

    fn api_key(&self) -> Result<&str, ProviderError> {
        if self.config.dashscope_api_key.is_empty() {
            return Err(ProviderError::Status {
                status: StatusCode::UNAUTHORIZED.as_u16(),
                message: "DashScope API key is not configured".to_string(),
            });
        }
        Ok(&self.config.dashscope_api_key)
    }

    async fn submit_task(&self, prompt: &str, model: &str, size: &str) -> Result<String, ProviderError> {
        let request = SynthesisRequest {
            model,
            input: SynthesisInput { prompt },
            parameters: SynthesisParameters { size, n: 1 },
        };

        let response = self
            .client
            .post(self.endpoint("/api/v1/services/aigc/text2image/image-synthesis"))
            .bearer_auth(self.api_key()?)
            .header("X-DashScope-Async", "enable")
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let task: TaskResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("task submission: {}", e)))?;
        task.output
            .task_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::Malformed("task submission returned no task id".to_string()))
    }

    async fn poll_task(&self, task_id: &str) -> Result<SynthesizedImage, ProviderError> {
        let interval = Duration::from_millis(self.config.task_poll_interval_ms.max(1));
        let url = self.endpoint(&format!("/api/v1/tasks/{}", task_id));

        loop {
            let response = self
                .client
                .get(&url)
                .bearer_auth(self.api_key()?)
                .send()
                .await?;
            let response = check_status(response).await?;

            let task: TaskResponse = response
                .json()
                .await
                .map_err(|e| ProviderError::Malformed(format!("task status: {}", e)))?;

            if let Some(image) = image_from_task(task.output)? {
                return Ok(image);
            }
            debug!(task_id = %task_id, "Synthesis task still running");
            tokio::time::sleep(interval).await;
        }
    }
}

#[async_trait]
impl ImageUnderstanding for DashScopeClient {
    async fn understand(&self, image_bytes: &[u8]) -> Result<ImageCaption, ProviderError> {
        let b64 = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        let model = self.config.chat_model.as_str();
        let request = ChatRequest {
            model,
            input: ChatInput {
                messages: vec![ChatMessage {
                    role: "user",
                    content: vec![
                        ChatPart::Image {
                            image: format!("data:image/jpeg;base64,{}", b64),
                        },
                        ChatPart::Text {
                            text: UNDERSTAND_PROMPT.to_string(),
                        },
                    ],
                }],
            },
        };

        info!(model = %model, bytes = image_bytes.len(), "Sending image understanding request");

        let response = self
            .client
            .post(self.endpoint("/api/v1/services/aigc/multimodal-generation/generation"))
            .bearer_auth(self.api_key()?)
            .json(&request)
            .send()
            .await?;
        let response = check_status(response).await?;

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("understanding response: {}", e)))?;
        caption_from_response(chat)
    }
}

#[async_trait]
impl ImageSynthesis for DashScopeClient {
    async fn synthesize(
        &self,
        prompt: &str,
        model: &str,
        size: &str,
    ) -> Result<SynthesizedImage, ProviderError> {
        let task_id = self.submit_task(prompt, model, size).await?;
        info!(model = %model, task_id = %task_id, "Synthesis task submitted");
        self.poll_task(&task_id).await
    }
}

/// Maps non-success statuses to provider errors. 429 always mentions the
/// exhausted quota so the failure is labelled correctly downstream.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ApiError>(&body)
        .ok()
        .and_then(|e| match (e.code, e.message) {
            (Some(code), Some(message)) => Some(format!("{}: {}", code, message)),
            (None, Some(message)) => Some(message),
            (Some(code), None) => Some(code),
            (None, None) => None,
        })
        .unwrap_or(body);

    let message = match status {
        StatusCode::TOO_MANY_REQUESTS => format!("quota exceeded: {}", detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => format!("API key rejected: {}", detail),
        _ => detail,
    };
    Err(ProviderError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Slice from the first `{` to the last `}`, if any.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn caption_from_response(response: ChatResponse) -> Result<ImageCaption, ProviderError> {
    let text = response
        .output
        .and_then(|o| o.choices.into_iter().next())
        .and_then(|c| c.message.content.into_iter().find_map(|p| p.text))
        .ok_or_else(|| ProviderError::Malformed("understanding response has no text".to_string()))?;

    let json = extract_json(&text)
        .ok_or_else(|| ProviderError::Malformed("understanding response has no JSON object".to_string()))?;
    let caption: ImageCaption =
        serde_json::from_str(json).map_err(|e| ProviderError::Malformed(e.to_string()))?;

    if caption.description.trim().is_empty() {
        return Err(ProviderError::Malformed("understanding returned an empty description".to_string()));
    }
    Ok(caption)
}

/// `None` while the task is pending or running.
fn image_from_task(output: TaskOutput) -> Result<Option<SynthesizedImage>, ProviderError> {
    let status = output.task_status.unwrap_or_default();
    match status.as_str() {
        "SUCCEEDED" => {
            let first = output.results.into_iter().next().ok_or(ProviderError::EmptyResult)?;
            let image = match first.url.filter(|u| !u.is_empty()) {
                Some(url) => SynthesizedImage::Url(url),
                None => first
                    .b64_image
                    .or(first.b64_encoded)
                    .filter(|b| !b.is_empty())
                    .map(|b| SynthesizedImage::Embedded(format!("data:image/png;base64,{}", b)))
                    .unwrap_or(SynthesizedImage::Empty),
            };
            Ok(Some(image))
        }
        "FAILED" | "CANCELED" | "UNKNOWN" => Err(ProviderError::Status {
            status: StatusCode::OK.as_u16(),
            message: format!(
                "task {}: {} {}",
                status.to_lowercase(),
                output.code.unwrap_or_default(),
                output.message.unwrap_or_default()
            )
            .trim_end()
            .to_string(),
        }),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(json: &str) -> TaskOutput {
        serde_json::from_str::<TaskResponse>(json).unwrap().output
    }

    #[test]
    fn json_is_extracted_from_surrounding_prose() {
        assert_eq!(
            extract_json("Sure! ```json\n{\"description\": \"a cat\"}\n``` done"),
            Some("{\"description\": \"a cat\"}")
        );
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn caption_is_read_from_first_text_part() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"output":{"choices":[{"message":{"role":"assistant","content":[
                {"text":"{\"description\": \"a grumpy cat\", \"text\": \"grumpy\"}"}
            ]}}]},"request_id":"r1"}"#,
        )
        .unwrap();
        let caption = caption_from_response(response).unwrap();
        assert_eq!(caption.description, "a grumpy cat");
        assert_eq!(caption.short_caption, "grumpy");
    }

    #[test]
    fn caption_without_json_is_malformed() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"output":{"choices":[{"message":{"content":[{"text":"I cannot see anything"}]}}]}}"#,
        )
        .unwrap();
        assert!(matches!(caption_from_response(response), Err(ProviderError::Malformed(_))));

        let empty: ChatResponse = serde_json::from_str(r#"{"output":{"choices":[]}}"#).unwrap();
        assert!(caption_from_response(empty).is_err());
    }

    #[test]
    fn running_task_yields_nothing_yet() {
        let output = task(r#"{"output":{"task_id":"t1","task_status":"RUNNING"}}"#);
        assert!(image_from_task(output).unwrap().is_none());
    }

    #[test]
    fn succeeded_task_prefers_url_over_embedded_data() {
        let output = task(
            r#"{"output":{"task_status":"SUCCEEDED","results":[{"url":"https://x/a.png","b64_image":"AAAA"}]}}"#,
        );
        assert_eq!(
            image_from_task(output).unwrap(),
            Some(SynthesizedImage::Url("https://x/a.png".to_string()))
        );

        let output = task(r#"{"output":{"task_status":"SUCCEEDED","results":[{"b64_encoded":"AAAA"}]}}"#);
        assert_eq!(
            image_from_task(output).unwrap(),
            Some(SynthesizedImage::Embedded("data:image/png;base64,AAAA".to_string()))
        );

        let output = task(r#"{"output":{"task_status":"SUCCEEDED","results":[{"url":""}]}}"#);
        assert_eq!(image_from_task(output).unwrap(), Some(SynthesizedImage::Empty));
    }

    #[test]
    fn failed_task_carries_provider_message() {
        let output = task(
            r#"{"output":{"task_status":"FAILED","code":"Arrearage","message":"Access denied, insufficient balance"}}"#,
        );
        let err = image_from_task(output).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("Arrearage"));
        assert!(text.contains("insufficient balance"));
    }

    #[test]
    fn synthesis_request_matches_wire_format() {
        let body = serde_json::to_value(SynthesisRequest {
            model: "qwen-image-plus",
            input: SynthesisInput { prompt: "a cat" },
            parameters: SynthesisParameters { size: "1328*1328", n: 1 },
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "qwen-image-plus",
                "input": {"prompt": "a cat"},
                "parameters": {"size": "1328*1328", "n": 1}
            })
        );
    }
}
