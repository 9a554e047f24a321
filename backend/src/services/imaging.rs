use std::io::Cursor;

use base64::Engine as _;
use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::models::error::PipelineError;

/// Decodes any supported raster format into an RGBA buffer.
pub fn load_image(data: &[u8]) -> Result<RgbaImage, PipelineError> {
    if data.is_empty() {
        return Err(PipelineError::Decode("image payload is empty".to_string()));
    }
    image::load_from_memory(data)
        .map(|img| img.to_rgba8())
        .map_err(|e| PipelineError::Decode(e.to_string()))
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img.clone())
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| PipelineError::Internal(format!("PNG encode error: {}", e)))?;
    Ok(buf.into_inner())
}

/// Extracts the bytes of a `data:image/...;base64,` reference.
pub fn decode_data_url(reference: &str) -> Result<Vec<u8>, PipelineError> {
    let (header, payload) = reference
        .split_once(',')
        .ok_or_else(|| PipelineError::Decode("data URL has no payload".to_string()))?;
    if !header.starts_with("data:image/") || !header.ends_with(";base64") {
        return Err(PipelineError::Decode(format!("unsupported data URL header '{}'", header)));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| PipelineError::Decode(format!("invalid base64 payload: {}", e)))
}
