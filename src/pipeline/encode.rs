//! Raster pipeline: raw image bytes → bounded RGB → lossy WebP → base64.
//!
//! Docling embeds figures as full-resolution PNG (or JPEG) data URIs; at
//! `images_scale=2` a single slide can exceed 5 MB of base64. RAG ingestion
//! only needs legible figures, so every image is flattened to RGB, bounded
//! to the configured box with Lanczos resampling and re-encoded as lossy
//! WebP, typically a 10–30× reduction.

use crate::config::NormalizerConfig;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::{self, FilterType};
use image::RgbImage;
use thiserror::Error;
use tracing::debug;

/// MIME type of everything this module produces.
pub const WEBP_MIME: &str = "image/webp";

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("WebP encoder unavailable: {0}")]
    CodecUnavailable(String),

    #[error("WebP encode failed: {0}")]
    Encode(String),
}

/// Decode, bound and re-encode `raw` as base64 WebP.
pub fn reencode_to_webp_b64(raw: &[u8], settings: &NormalizerConfig) -> Result<String, EncodeError> {
    let rgb = image::load_from_memory(raw)?.to_rgb8();
    let (w0, h0) = rgb.dimensions();
    let rgb = bound_dimensions(rgb, settings.max_width, settings.max_height);
    let webp = encode_webp(&rgb, settings)?;

    debug!(
        "Re-encoded {}x{} → {}x{} WebP ({} → {} bytes)",
        w0,
        h0,
        rgb.width(),
        rgb.height(),
        raw.len(),
        webp.len()
    );
    Ok(STANDARD.encode(&webp))
}

/// Decode a base64 payload and re-encode it.
pub fn reencode_b64_to_webp_b64(b64: &str, settings: &NormalizerConfig) -> Result<String, EncodeError> {
    let raw = STANDARD.decode(b64.trim())?;
    reencode_to_webp_b64(&raw, settings)
}

/// Shrink to fit `max_width`, then (if still too tall) `max_height`.
///
/// Each pass is proportional; a bound of 0 is ignored. Images already
/// inside the box are returned untouched.
pub fn bound_dimensions(img: RgbImage, max_width: u32, max_height: u32) -> RgbImage {
    let mut img = img;

    if max_width > 0 && img.width() > max_width {
        let h = scaled(img.height(), max_width, img.width());
        img = imageops::resize(&img, max_width, h, FilterType::Lanczos3);
    }
    if max_height > 0 && img.height() > max_height {
        let w = scaled(img.width(), max_height, img.height());
        img = imageops::resize(&img, w, max_height, FilterType::Lanczos3);
    }
    img
}

/// `side * num / den`, truncated, never below 1 px.
fn scaled(side: u32, num: u32, den: u32) -> u32 {
    ((side as u64 * num as u64) / den as u64).max(1) as u32
}

/// Lossy WebP at the configured quality and method.
pub fn encode_webp(img: &RgbImage, settings: &NormalizerConfig) -> Result<Vec<u8>, EncodeError> {
    let mut config = webp::WebPConfig::new()
        .map_err(|_| EncodeError::CodecUnavailable("libwebp config init failed".into()))?;
    config.lossless = 0;
    config.quality = settings.quality as f32;
    config.method = settings.method as i32;

    let encoder = webp::Encoder::from_rgb(img.as_raw(), img.width(), img.height());
    let memory = encoder
        .encode_advanced(&config)
        .map_err(|e| EncodeError::Encode(format!("{e:?}")))?;
    Ok(memory.to_vec())
}

/// Encode a 1×1 pixel to confirm the WebP codec is usable.
pub fn probe_codec(settings: &NormalizerConfig) -> Result<(), EncodeError> {
    let pixel = RgbImage::from_pixel(1, 1, image::Rgb([255, 255, 255]));
    encode_webp(&pixel, settings).map(|_| ())
}
