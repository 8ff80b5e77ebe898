use base64::{engine::general_purpose, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::core::errors::ImageEncodeError;

/// Longest side allowed for images sent to the generation API
pub const MAX_UPLOAD_DIMENSION: u32 = 1024;

/// JPEG quality used for the re-encoded upload
pub const UPLOAD_JPEG_QUALITY: u8 = 90;

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Convert to RGB, shrink so neither side exceeds `MAX_UPLOAD_DIMENSION`, and
/// re-encode as a base64 JPEG data URL.
pub fn encode_jpeg_data_url_sync(img: DynamicImage) -> Result<String, ImageEncodeError> {
    let img = if img.width().max(img.height()) > MAX_UPLOAD_DIMENSION {
        img.resize(MAX_UPLOAD_DIMENSION, MAX_UPLOAD_DIMENSION, FilterType::Lanczos3)
    } else {
        img
    };
    let rgb = img.to_rgb8();

    let mut jpeg_bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg_bytes, UPLOAD_JPEG_QUALITY).encode_image(&rgb)?;

    let mut data_url = String::with_capacity(DATA_URL_PREFIX.len() + jpeg_bytes.len() * 4 / 3 + 4);
    data_url.push_str(DATA_URL_PREFIX);
    general_purpose::STANDARD.encode_string(&jpeg_bytes, &mut data_url);
    Ok(data_url)
}

/// Decode a file using the format sniffed from its bytes, not its extension
fn decode_by_content(path: &Path) -> Result<DynamicImage, image::ImageError> {
    image::ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
}

/// Asynchronously open an image file and encode it as a JPEG data URL.
///
/// Decoding, resizing and JPEG encoding are CPU-bound, so the whole pipeline runs
/// on the blocking pool to keep the async runtime responsive.
pub async fn encode_file_data_url_async(path: &Path) -> Result<String, ImageEncodeError> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let img = decode_by_content(&path).map_err(|source| {
            warn!("Failed to decode {}: {}", path.display(), source);
            ImageEncodeError::Open {
                path: path.display().to_string(),
                source,
            }
        })?;
        encode_jpeg_data_url_sync(img)
    })
    .await
    .map_err(|e| ImageEncodeError::TaskJoin(e.to_string()))?
}
