use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

use super::GenerationBackend;
use crate::core::config::FalConfig;
use crate::core::errors::{FalError, FalResult};
use crate::core::types::{
    FaceSwapResult, GenerationInput, GenerationParams, GenerationResult, ImageParameters,
};
use crate::utils::image_ops::encode_file_data_url_async;

const GENERATION_ENDPOINT: &str = "flux/schnell";
const FACE_SWAP_ENDPOINT: &str = "face-swap";
const GENERATION_MODEL: &str = "fal-ai/flux/schnell";
const FACE_SWAP_MODEL: &str = "fal-ai/face-swap";

const PROMPT_PREFIX: &str = "professional portrait, ";
const MASK_STRENGTH: f32 = 0.8;

pub const GENERATION_TIMEOUT_MESSAGE: &str =
    "Generation timeout. Please try again with fewer images or simpler prompts.";
pub const FACE_SWAP_TIMEOUT_MESSAGE: &str =
    "Face swap timeout. Please try again with smaller images.";

/// fal.ai client: one POST per call, no retries
pub struct FalClient {
    api_key: String,
    base_url: String,
    http_client: reqwest::Client,
}

/// Image reference as returned by fal: either a bare URL or `{ "url": ... }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImageRef {
    Url(String),
    Object { url: String },
}

impl ImageRef {
    fn into_url(self) -> String {
        match self {
            ImageRef::Url(url) | ImageRef::Object { url } => url,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Timings {
    #[serde(default)]
    inference: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    images: Vec<ImageRef>,
    #[serde(default)]
    timings: Option<Timings>,
}

#[derive(Debug, Deserialize)]
struct FaceSwapResponse {
    #[serde(default)]
    image: Option<ImageRef>,
}

impl FalClient {
    /// Build the client. Fails immediately when no API key is configured.
    pub fn new(config: &FalConfig) -> FalResult<Self> {
        let api_key = config.api_key.clone().ok_or(FalError::MissingApiKey)?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(FalError::ClientBuild)?;

        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    /// POST a JSON body and return the raw response text of a 2xx reply
    async fn post_json(&self, endpoint: &str, body: &serde_json::Value) -> FalResult<String> {
        let response = self
            .http_client
            .post(self.endpoint_url(endpoint))
            .header("Authorization", format!("Key {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FalError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.text().await?)
    }

    async fn try_generate(&self, input: &GenerationInput) -> FalResult<GenerationResult> {
        let face_image = encode_file_data_url_async(&input.face_image_path).await?;
        let mask_image = match &input.mask_image_path {
            Some(path) => Some(encode_file_data_url_async(path).await?),
            None => None,
        };

        let payload = build_generation_payload(&input.params, face_image, mask_image);

        debug!("Sending request to {}", GENERATION_MODEL);
        let text = self.post_json(GENERATION_ENDPOINT, &payload).await?;
        let response: GenerationResponse = serde_json::from_str(&text)
            .map_err(|e| FalError::InvalidResponse(e.to_string()))?;

        let images: Vec<String> = response.images.into_iter().map(ImageRef::into_url).collect();
        let generation_time = response
            .timings
            .and_then(|t| t.inference)
            .unwrap_or(0.0);

        Ok(GenerationResult {
            generation_time: Some(generation_time),
            model_used: Some(GENERATION_MODEL.to_string()),
            parameters: Some(ImageParameters::from(&input.params)),
            ..GenerationResult::succeeded(images)
        })
    }

    async fn try_face_swap(
        &self,
        face_image_path: &Path,
        target_image_path: &Path,
    ) -> FalResult<String> {
        let payload = serde_json::json!({
            "source_image": encode_file_data_url_async(face_image_path).await?,
            "target_image": encode_file_data_url_async(target_image_path).await?,
        });

        let text = self.post_json(FACE_SWAP_ENDPOINT, &payload).await?;
        let response: FaceSwapResponse = serde_json::from_str(&text)
            .map_err(|e| FalError::InvalidResponse(e.to_string()))?;

        response
            .image
            .map(ImageRef::into_url)
            .ok_or_else(|| FalError::InvalidResponse("missing image".to_string()))
    }
}

#[async_trait]
impl GenerationBackend for FalClient {
    #[instrument(skip(self, input), fields(num_images = input.params.num_images, masked = input.mask_image_path.is_some()))]
    async fn generate_story_images(&self, input: &GenerationInput) -> GenerationResult {
        info!("Starting fal generation for {} images", input.params.num_images);
        let start = Instant::now();

        match self.try_generate(input).await {
            Ok(result) => {
                info!(
                    "fal generation completed: {} images in {:.2}s",
                    result.images.len(),
                    start.elapsed().as_secs_f64()
                );
                result
            }
            Err(FalError::Timeout) => {
                warn!("fal generation timed out after {:.2}s", start.elapsed().as_secs_f64());
                GenerationResult::failed(GENERATION_TIMEOUT_MESSAGE)
            }
            Err(FalError::Status { status, body }) => {
                error!("fal API error: {} - {}", status, body);
                GenerationResult::failed(format!("API error: {} - {}", status, body))
            }
            Err(e) => {
                error!("Error in fal generation: {}", e);
                GenerationResult::failed(format!("Generation failed: {}", e))
            }
        }
    }

    #[instrument(skip_all)]
    async fn face_swap(
        &self,
        face_image_path: &Path,
        target_image_path: &Path,
    ) -> FaceSwapResult {
        match self.try_face_swap(face_image_path, target_image_path).await {
            Ok(image) => FaceSwapResult {
                success: true,
                image: Some(image),
                error: None,
                model_used: Some(FACE_SWAP_MODEL.to_string()),
            },
            Err(FalError::Timeout) => {
                warn!("fal face swap timed out");
                FaceSwapResult::failed(FACE_SWAP_TIMEOUT_MESSAGE)
            }
            Err(FalError::Status { status, body }) => {
                error!("fal face swap error: {} - {}", status, body);
                FaceSwapResult::failed(format!("Face swap failed: {} - {}", status, body))
            }
            Err(e) => {
                error!("Error in fal face swap: {}", e);
                FaceSwapResult::failed(format!("Face swap failed: {}", e))
            }
        }
    }
}

/// Merge prompt, encoded images and numeric parameters into one request body.
///
/// Safety filtering and face enhancement are always requested. A mask adds
/// `mask_image` together with an inpainting `strength`.
pub fn build_generation_payload(
    params: &GenerationParams,
    face_image: String,
    mask_image: Option<String>,
) -> serde_json::Value {
    let mut payload = serde_json::json!({
        "prompt": format!("{}{}", PROMPT_PREFIX, params.prompt),
        "negative_prompt": params.negative_prompt,
        "image": face_image,
        "guidance_scale": params.guidance_scale,
        "num_inference_steps": params.num_inference_steps,
        "width": params.width,
        "height": params.height,
        "num_images": params.num_images,
        "safety_checker": true,
        "enhance_face": true,
    });

    if let Some(mask) = mask_image {
        payload["mask_image"] = serde_json::Value::String(mask);
        payload["strength"] = serde_json::json!(MASK_STRENGTH);
    }

    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{png_bytes, spawn_server};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fal_config(base_url: &str, timeout: Duration) -> FalConfig {
        FalConfig {
            api_key: Some("test-key".to_string()),
            base_url: base_url.to_string(),
            timeout,
        }
    }

    fn input_with_face(path: PathBuf) -> GenerationInput {
        GenerationInput {
            face_image_path: path,
            mask_image_path: None,
            params: GenerationParams {
                prompt: "astronaut in space".to_string(),
                num_images: 2,
                ..GenerationParams::default()
            },
        }
    }

    fn write_face(dir: &Path) -> PathBuf {
        let path = dir.join("face.png");
        std::fs::write(&path, png_bytes(16, 16)).unwrap();
        path
    }

    #[test]
    fn test_missing_api_key_fails_construction() {
        let config = FalConfig {
            api_key: None,
            base_url: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_secs(300),
        };
        assert!(matches!(FalClient::new(&config), Err(FalError::MissingApiKey)));
    }

    #[test]
    fn test_payload_without_mask() {
        let params = GenerationParams {
            prompt: "a knight".to_string(),
            num_images: 3,
            ..GenerationParams::default()
        };
        let payload = build_generation_payload(&params, "data:face".to_string(), None);

        assert_eq!(payload["prompt"], "professional portrait, a knight");
        assert_eq!(payload["image"], "data:face");
        assert_eq!(payload["num_images"], 3);
        assert_eq!(payload["num_inference_steps"], 25);
        assert_eq!(payload["width"], 1024);
        assert_eq!(payload["safety_checker"], true);
        assert_eq!(payload["enhance_face"], true);
        assert!(payload.get("mask_image").is_none());
        assert!(payload.get("strength").is_none());
    }

    #[test]
    fn test_payload_with_mask_adds_strength() {
        let payload = build_generation_payload(
            &GenerationParams::default(),
            "data:face".to_string(),
            Some("data:mask".to_string()),
        );

        assert_eq!(payload["mask_image"], "data:mask");
        let strength = payload["strength"].as_f64().unwrap();
        assert!((strength - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_generate_success() {
        let app = Router::new().route(
            "/flux/schnell",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Key test-key") {
                    return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({})));
                }
                assert_eq!(body["prompt"], "professional portrait, astronaut in space");
                assert!(body["image"]
                    .as_str()
                    .unwrap()
                    .starts_with("data:image/jpeg;base64,"));
                (
                    StatusCode::OK,
                    Json(serde_json::json!({
                        "images": [
                            {"url": "https://cdn.example/a.jpg", "width": 1024},
                            "https://cdn.example/b.jpg"
                        ],
                        "timings": {"inference": 1.5}
                    })),
                )
            }),
        );
        let base_url = spawn_server(app).await;
        let dir = tempfile::tempdir().unwrap();

        let client = FalClient::new(&fal_config(&base_url, Duration::from_secs(5))).unwrap();
        let result = client
            .generate_story_images(&input_with_face(write_face(dir.path())))
            .await;

        assert!(result.success, "unexpected failure: {:?}", result.error);
        assert_eq!(
            result.images,
            vec!["https://cdn.example/a.jpg", "https://cdn.example/b.jpg"]
        );
        assert_eq!(result.generation_time, Some(1.5));
        assert_eq!(result.model_used.as_deref(), Some("fal-ai/flux/schnell"));
        assert_eq!(result.parameters.unwrap().num_inference_steps, 25);
    }

    #[tokio::test]
    async fn test_generate_non_2xx_embeds_status_and_body() {
        let app = Router::new().route(
            "/flux/schnell",
            post(|| async { (StatusCode::UNPROCESSABLE_ENTITY, "bad prompt") }),
        );
        let base_url = spawn_server(app).await;
        let dir = tempfile::tempdir().unwrap();

        let client = FalClient::new(&fal_config(&base_url, Duration::from_secs(5))).unwrap();
        let result = client
            .generate_story_images(&input_with_face(write_face(dir.path())))
            .await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("API error: 422 - bad prompt"));
        assert!(result.images.is_empty());
    }

    #[tokio::test]
    async fn test_generate_timeout_has_distinct_message() {
        let app = Router::new().route(
            "/flux/schnell",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                "{}"
            }),
        );
        let base_url = spawn_server(app).await;
        let dir = tempfile::tempdir().unwrap();

        let client = FalClient::new(&fal_config(&base_url, Duration::from_millis(200))).unwrap();
        let result = client
            .generate_story_images(&input_with_face(write_face(dir.path())))
            .await;

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some(GENERATION_TIMEOUT_MESSAGE));
    }

    #[tokio::test]
    async fn test_unreadable_image_fails_before_network_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/flux/schnell",
            post(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { "{}" }
            }),
        );
        let base_url = spawn_server(app).await;
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("face.png");
        std::fs::write(&bogus, b"not an image").unwrap();

        let client = FalClient::new(&fal_config(&base_url, Duration::from_secs(5))).unwrap();
        let result = client.generate_story_images(&input_with_face(bogus)).await;

        assert!(!result.success);
        assert!(result
            .error
            .unwrap()
            .starts_with("Generation failed: Failed to process image"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transport_error_is_reported() {
        // Nothing listens on port 1
        let client = FalClient::new(&fal_config("http://127.0.0.1:1", Duration::from_secs(5))).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let result = client
            .generate_story_images(&input_with_face(write_face(dir.path())))
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Generation failed: "));
    }

    #[tokio::test]
    async fn test_face_swap_success_and_failure() {
        let app = Router::new().route(
            "/face-swap",
            post(|Json(body): Json<serde_json::Value>| async move {
                if body["source_image"].is_string() && body["target_image"].is_string() {
                    (
                        StatusCode::OK,
                        Json(serde_json::json!({"image": {"url": "https://cdn.example/swap.jpg"}})),
                    )
                } else {
                    (StatusCode::BAD_REQUEST, Json(serde_json::json!({})))
                }
            }),
        );
        let base_url = spawn_server(app).await;
        let dir = tempfile::tempdir().unwrap();
        let face = write_face(dir.path());

        let client = FalClient::new(&fal_config(&base_url, Duration::from_secs(5))).unwrap();
        let result = client.face_swap(&face, &face).await;
        assert!(result.success);
        assert_eq!(result.image.as_deref(), Some("https://cdn.example/swap.jpg"));
        assert_eq!(result.model_used.as_deref(), Some("fal-ai/face-swap"));

        let broken = Router::new().route(
            "/face-swap",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let broken_url = spawn_server(broken).await;
        let client = FalClient::new(&fal_config(&broken_url, Duration::from_secs(5))).unwrap();
        let result = client.face_swap(&face, &face).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Face swap failed: 500 - boom"));
    }
}
