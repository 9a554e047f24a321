use std::env;
use std::time::Duration;

use crate::models::generation::ModelCandidates;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: String,
    pub allowed_origins: Vec<String>,
    pub dashscope_api_key: String,
    pub dashscope_base_url: String,
    pub chat_model: String,
    pub image_model: String,
    pub image_models: Vec<String>,
    pub image_size: String,
    pub output_dir: String,
    pub output_base_url: String,
    pub max_upload_bytes: u64,
    pub understand_timeout_secs: u64,
    pub synthesize_timeout_secs: u64,
    pub fetch_timeout_secs: u64,
    pub task_poll_interval_ms: u64,
    pub font_dir: String,
    pub default_font: String,
    pub caption_seed: Option<u64>,
    pub log_level: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            listen_addr: env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173,http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            dashscope_api_key: env::var("DASHSCOPE_API_KEY").unwrap_or_default(),
            dashscope_base_url: env::var("DASHSCOPE_BASE_URL")
                .unwrap_or_else(|_| "https://dashscope.aliyuncs.com".to_string()),
            chat_model: env::var("CHAT_MODEL").unwrap_or_else(|_| "qwen-vl-plus".to_string()),
            image_model: env::var("IMAGE_MODEL").unwrap_or_else(|_| "qwen-image-plus".to_string()),
            image_models: parse_model_list(
                &env::var("IMAGE_MODELS").unwrap_or_else(|_| {
                    "qwen-image-plus,qwen-image-max,qwen-image-max-2025-12-30".to_string()
                }),
            ),
            image_size: env::var("IMAGE_SIZE").unwrap_or_else(|_| "1328*1328".to_string()),
            output_dir: env::var("OUTPUT_DIR").unwrap_or_else(|_| "./output".to_string()),
            output_base_url: env::var("OUTPUT_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "/output".to_string()),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10 * 1024 * 1024),
            understand_timeout_secs: env::var("UNDERSTAND_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            synthesize_timeout_secs: env::var("SYNTHESIZE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(180),
            fetch_timeout_secs: env::var("FETCH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            task_poll_interval_ms: env::var("TASK_POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1500),
            font_dir: env::var("FONT_DIR").unwrap_or_else(|_| "./fonts".to_string()),
            default_font: env::var("DEFAULT_FONT").unwrap_or_else(|_| "SimHei".to_string()),
            caption_seed: env::var("CAPTION_SEED").ok().and_then(|v| v.parse().ok()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Priority-ordered synthesis models. Falls back to the single default
    /// model when the configured list is empty.
    pub fn model_candidates(&self) -> ModelCandidates {
        ModelCandidates::new(self.image_models.clone())
            .unwrap_or_else(|| ModelCandidates::single(self.image_model.clone()))
    }

    pub fn understand_timeout(&self) -> Duration {
        Duration::from_secs(self.understand_timeout_secs)
    }

    pub fn synthesize_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesize_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
