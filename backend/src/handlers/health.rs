use axum::Json;
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Instant;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub uptime: f64,
    pub version: String,
}

static START_TIME: OnceLock<Instant> = OnceLock::new();

pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

pub async fn health_check() -> Json<HealthResponse> {
    let uptime = START_TIME
        .get()
        .map(|s| s.elapsed().as_secs_f64())
        .unwrap_or(0.0);

    Json(HealthResponse {
        status: "ok".to_string(),
        service: "meme-generator".to_string(),
        uptime,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
