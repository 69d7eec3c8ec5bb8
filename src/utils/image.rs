//! Bounded downsample for uploaded photos.
//!
//! Uploads are shrunk before they are forwarded upstream: the model does not
//! need full-resolution input and smaller payloads keep request bodies cheap.
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::GenericImageView;

use crate::error::{AppError, AppResult};

/// Downsample `bytes` so the longest side is at most `max_dim`, preserving
/// aspect ratio, and re-encode as JPEG at `quality`. Images already inside
/// the bound are re-encoded without resizing; nothing is ever upscaled.
pub fn resize_to_bound(bytes: &[u8], max_dim: u32, quality: u8) -> AppResult<Vec<u8>> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| AppError::InvalidInput(format!("could not decode image: {e}")))?;

    let (width, height) = img.dimensions();
    let img = if width.max(height) > max_dim {
        img.resize(max_dim, max_dim, FilterType::Triangle)
    } else {
        img
    };

    // JPEG has no alpha channel; flatten before encoding.
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
        .map_err(|e| AppError::InvalidInput(format!("could not encode image: {e}")))?;
    Ok(out)
}
