//! JPEG encoding of captured bitmaps and lenient decoding of fetched bytes.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, ImageError};
use tracing::debug;

/// Quality used when nothing else is configured (0.5 on a 0..1 scale).
pub const DEFAULT_JPEG_QUALITY: u8 = 50;

pub fn encode_jpeg(bitmap: &DynamicImage, quality: u8) -> Result<Bytes, ImageError> {
    let rgb = bitmap.to_rgb8();
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
    Ok(Bytes::from(out))
}

/// Malformed or empty images decode to `None`.
pub fn decode(bytes: &[u8]) -> Option<DynamicImage> {
    match image::load_from_memory(bytes) {
        Ok(img) if img.width() > 0 && img.height() > 0 => Some(img),
        Ok(_) => None,
        Err(e) => {
            debug!("image decode failed: {}", e);
            None
        }
    }
}
