// Domain types shared by the adapter, the orchestrator and the HTTP layer

use axum::body::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::config::Config;
use crate::orchestration::generation_orchestrator::GenerationOrchestrator;
use crate::utils::Metrics;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub orchestrator: Arc<GenerationOrchestrator>,
    pub metrics: Metrics,
}

/// Per-request token used to namespace files and correlate log lines
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A single uploaded file as received from the multipart form
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedImage {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Browsers send an empty, unnamed part for an untouched optional file input
    pub fn is_named(&self) -> bool {
        self.filename.as_deref().is_some_and(|name| !name.is_empty())
    }

    /// Lowercased alphanumeric extension of the original filename, `jpg` otherwise
    pub fn extension(&self) -> String {
        self.filename
            .as_deref()
            .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext))
            .map(|ext| ext.to_ascii_lowercase())
            .filter(|ext| {
                !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
            })
            .unwrap_or_else(|| "jpg".to_string())
    }
}

/// Numeric and textual knobs forwarded to the generation endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub prompt: String,
    pub negative_prompt: String,
    pub num_images: u32,
    pub guidance_scale: f32,
    pub num_inference_steps: u32,
    pub width: u32,
    pub height: u32,
}

pub const DEFAULT_NEGATIVE_PROMPT: &str =
    "bad quality, low resolution, NSFW, cartoonish, disfigured, broken limbs";

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            num_images: 4,
            guidance_scale: 7.5,
            num_inference_steps: 25,
            width: 1024,
            height: 1024,
        }
    }
}

/// A parsed `/generate` request; lives for one HTTP call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub face_image: UploadedImage,
    pub mask_image: Option<UploadedImage>,
    pub params: GenerationParams,
}

/// A parsed `/face-swap` request
#[derive(Debug, Clone)]
pub struct FaceSwapRequest {
    pub face_image: UploadedImage,
    pub target_image: UploadedImage,
}

/// What the adapter needs: files already on disk plus parameters
#[derive(Debug, Clone)]
pub struct GenerationInput {
    pub face_image_path: PathBuf,
    pub mask_image_path: Option<PathBuf>,
    pub params: GenerationParams,
}

/// Generation parameters echoed back on success
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageParameters {
    pub guidance_scale: f32,
    pub num_inference_steps: u32,
    pub width: u32,
    pub height: u32,
}

impl From<&GenerationParams> for ImageParameters {
    fn from(params: &GenerationParams) -> Self {
        Self {
            guidance_scale: params.guidance_scale,
            num_inference_steps: params.num_inference_steps,
            width: params.width,
            height: params.height,
        }
    }
}

/// Uniform outcome of a generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub success: bool,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ImageParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl GenerationResult {
    pub fn succeeded(images: Vec<String>) -> Self {
        Self {
            success: true,
            images,
            error: None,
            generation_time: None,
            model_used: None,
            parameters: None,
            session_id: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            images: Vec::new(),
            error: Some(error.into()),
            generation_time: None,
            model_used: None,
            parameters: None,
            session_id: None,
        }
    }
}

/// Outcome of a face-swap call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceSwapResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
}

impl FaceSwapResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            image: None,
            error: Some(error.into()),
            model_used: None,
        }
    }
}

/// One entry of the `/gallery` listing
#[derive(Debug, Clone, Serialize)]
pub struct GalleryImage {
    pub url: String,
    pub name: String,
    pub created: String,
}

/// `/stats` payload
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub total_images_generated: usize,
    pub generations_today: usize,
    pub api_status: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(filename: Option<&str>) -> UploadedImage {
        UploadedImage {
            filename: filename.map(str::to_string),
            content_type: Some("image/png".to_string()),
            bytes: Bytes::from_static(b"abc"),
        }
    }

    #[test]
    fn test_extension_from_filename() {
        assert_eq!(upload(Some("me.PNG")).extension(), "png");
        assert_eq!(upload(Some("archive.tar.webp")).extension(), "webp");
        assert_eq!(upload(Some("noext")).extension(), "jpg");
        assert_eq!(upload(Some("evil.../../x")).extension(), "jpg");
        assert_eq!(upload(None).extension(), "jpg");
    }

    #[test]
    fn test_is_named() {
        assert!(upload(Some("mask.png")).is_named());
        assert!(!upload(Some("")).is_named());
        assert!(!upload(None).is_named());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }

    #[test]
    fn test_failed_result_serialization() {
        let json = serde_json::to_value(GenerationResult::failed("timeout")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "timeout");
        assert!(json.get("session_id").is_none());
    }
}
