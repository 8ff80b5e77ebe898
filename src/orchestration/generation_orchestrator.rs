// Generation Orchestrator: owns the lifecycle of one generation request
//
// received -> validated -> files_saved -> adapter_called -> images_fetched
//          -> responded -> cleaned_up

use anyhow::Context;
use chrono::{DateTime, Local};
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::core::errors::{ApiError, ApiResult, FetchError};
use crate::core::types::{
    FaceSwapRequest, FaceSwapResult, GalleryImage, GenerationInput, GenerationRequest,
    GenerationResult, SessionId, StatsReport, UploadedImage,
};
use crate::orchestration::session_files::SessionFiles;
use crate::services::generation::GenerationBackend;
use crate::services::generation_log::{GenerationLog, GenerationStatus};
use crate::utils::paths::{ArtifactKind, StorageLayout};
use crate::utils::Metrics;

/// Content types accepted for face/target uploads
pub const ALLOWED_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

pub struct GenerationOrchestrator {
    backend: Arc<dyn GenerationBackend>,
    layout: StorageLayout,
    log: GenerationLog,
    http_client: reqwest::Client,
    max_file_size: u64,
    metrics: Metrics,
}

impl GenerationOrchestrator {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        layout: StorageLayout,
        http_client: reqwest::Client,
        max_file_size: u64,
        metrics: Metrics,
    ) -> Self {
        let log = GenerationLog::new(layout.logs_dir());
        Self {
            backend,
            layout,
            log,
            http_client,
            max_file_size,
            metrics,
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn generation_log(&self) -> &GenerationLog {
        &self.log
    }

    /// Size and content-type check for a primary image upload
    pub fn validate_image(&self, upload: &UploadedImage) -> ApiResult<()> {
        if upload.size() > self.max_file_size {
            return Err(ApiError::PayloadTooLarge(format!(
                "File too large. Maximum size is {}",
                describe_size(self.max_file_size)
            )));
        }

        let content_type = upload
            .content_type
            .as_deref()
            .map(|ct| ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase());
        match content_type {
            Some(ct) if ALLOWED_CONTENT_TYPES.contains(&ct.as_str()) => Ok(()),
            _ => Err(ApiError::InvalidFileType(
                "Invalid file type. Please upload JPEG, PNG, or WebP images.".to_string(),
            )),
        }
    }

    /// Masks are only checked for size
    pub fn validate_mask(&self, mask: &UploadedImage) -> ApiResult<()> {
        if mask.size() > self.max_file_size {
            return Err(ApiError::PayloadTooLarge("Mask image too large".to_string()));
        }
        Ok(())
    }

    fn validate_generation(&self, request: &GenerationRequest) -> ApiResult<()> {
        self.validate_image(&request.face_image)?;
        if let Some(mask) = request.mask_image.as_ref().filter(|m| m.is_named()) {
            self.validate_mask(mask)?;
        }
        Ok(())
    }

    /// Run one `/generate` request end to end.
    ///
    /// `Err` is reserved for validation failures and internal errors; an adapter
    /// failure comes back as `Ok` with `success == false`.
    #[instrument(skip(self, request), fields(session_id = %session_id))]
    pub async fn generate(
        &self,
        session_id: SessionId,
        request: GenerationRequest,
    ) -> ApiResult<GenerationResult> {
        if let Err(e) = self.validate_generation(&request) {
            self.metrics.record_validation_rejection();
            return Err(e);
        }

        info!("Starting generation for session: {}", session_id);
        let mut temp_files = SessionFiles::new(session_id.clone());

        match self.run_generation(&session_id, request, &mut temp_files).await {
            Ok(result) => Ok(result),
            Err(e) => {
                let error_msg = format!("Generation failed: {}", e);
                error!("{}", error_msg);
                self.log
                    .append(
                        &session_id,
                        GenerationStatus::Error,
                        serde_json::json!({ "error": error_msg }),
                    )
                    .await;
                Err(ApiError::Internal(error_msg))
            }
        }
        // temp_files dropped here, after the response is assembled
    }

    async fn run_generation(
        &self,
        session_id: &SessionId,
        request: GenerationRequest,
        temp_files: &mut SessionFiles,
    ) -> anyhow::Result<GenerationResult> {
        let GenerationRequest {
            face_image,
            mask_image,
            params,
        } = request;

        let face_ext = face_image.extension();
        let face_image_path = temp_files.track(
            self.layout
                .path(ArtifactKind::FaceInput { extension: &face_ext }, session_id),
        );
        write_upload(&face_image_path, &face_image).await?;

        let mask_image_path = match mask_image.filter(|m| m.is_named()) {
            Some(mask) => {
                let mask_ext = mask.extension();
                let path = temp_files.track(
                    self.layout
                        .path(ArtifactKind::MaskInput { extension: &mask_ext }, session_id),
                );
                write_upload(&path, &mask).await?;
                Some(path)
            }
            None => None,
        };

        self.log
            .append(
                session_id,
                GenerationStatus::Started,
                serde_json::json!({
                    "prompt": params.prompt,
                    "negative_prompt": params.negative_prompt,
                    "num_images": params.num_images,
                    "guidance_scale": params.guidance_scale,
                    "num_inference_steps": params.num_inference_steps,
                }),
            )
            .await;

        let input = GenerationInput {
            face_image_path,
            mask_image_path,
            params,
        };

        let adapter_start = Instant::now();
        let mut result = self.backend.generate_story_images(&input).await;
        self.metrics
            .record_generation(result.success, adapter_start.elapsed());

        if result.success {
            let remote = std::mem::take(&mut result.images);
            result.images = self.materialize_images(session_id, remote).await;
            result.session_id = Some(session_id.to_string());

            self.log
                .append(
                    session_id,
                    GenerationStatus::Completed,
                    serde_json::json!({
                        "num_generated": result.images.len(),
                        "generation_time": result.generation_time.unwrap_or(0.0),
                    }),
                )
                .await;
        } else {
            self.log
                .append(
                    session_id,
                    GenerationStatus::Failed,
                    serde_json::json!({
                        "error": result.error.as_deref().unwrap_or("Unknown error"),
                    }),
                )
                .await;
        }

        Ok(result)
    }

    /// Download every returned image into the results directory.
    ///
    /// The output has the same length and order as `urls`; a slot whose download
    /// fails keeps its remote URL.
    pub async fn materialize_images(&self, session_id: &SessionId, urls: Vec<String>) -> Vec<String> {
        let downloads = urls.into_iter().enumerate().map(|(index, url)| async move {
            let kind = ArtifactKind::Result { index };
            match self.download_to(&url, &self.layout.path(kind, session_id)).await {
                Ok(()) => {
                    self.metrics.record_image_materialized();
                    self.layout.public_url(kind, session_id)
                }
                Err(e) => {
                    warn!("Failed to save image {}: {}", index, e);
                    self.metrics.record_image_fallback();
                    url
                }
            }
        });

        join_all(downloads).await
    }

    async fn download_to(&self, url: &str, path: &Path) -> Result<(), FetchError> {
        let bytes = self
            .http_client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        tokio::fs::write(path, &bytes)
            .await
            .map_err(|source| FetchError::Write {
                path: path.display().to_string(),
                source,
            })
    }

    /// Run one `/face-swap` request end to end
    #[instrument(skip(self, request), fields(session_id = %session_id))]
    pub async fn face_swap(
        &self,
        session_id: SessionId,
        request: FaceSwapRequest,
    ) -> ApiResult<FaceSwapResult> {
        let validation = self
            .validate_image(&request.face_image)
            .and_then(|_| self.validate_image(&request.target_image));
        if let Err(e) = validation {
            self.metrics.record_validation_rejection();
            return Err(e);
        }

        let mut temp_files = SessionFiles::new(session_id.clone());
        self.run_face_swap(&session_id, request, &mut temp_files)
            .await
            .map_err(|e| {
                let error_msg = format!("Face swap failed: {}", e);
                error!("{}", error_msg);
                ApiError::Internal(error_msg)
            })
    }

    async fn run_face_swap(
        &self,
        session_id: &SessionId,
        request: FaceSwapRequest,
        temp_files: &mut SessionFiles,
    ) -> anyhow::Result<FaceSwapResult> {
        let face_path = temp_files.track(
            self.layout
                .path(ArtifactKind::FaceInput { extension: "jpg" }, session_id),
        );
        let target_path = temp_files.track(self.layout.path(ArtifactKind::TargetInput, session_id));
        write_upload(&face_path, &request.face_image).await?;
        write_upload(&target_path, &request.target_image).await?;

        let adapter_start = Instant::now();
        let mut result = self.backend.face_swap(&face_path, &target_path).await;
        self.metrics
            .record_face_swap(result.success, adapter_start.elapsed());

        if result.success {
            if let Some(url) = result.image.take() {
                let kind = ArtifactKind::FaceSwapResult;
                result.image = Some(
                    match self.download_to(&url, &self.layout.path(kind, session_id)).await {
                        Ok(()) => {
                            self.metrics.record_image_materialized();
                            self.layout.public_url(kind, session_id)
                        }
                        Err(e) => {
                            warn!("Failed to save face swap image: {}", e);
                            self.metrics.record_image_fallback();
                            url
                        }
                    },
                );
            }
        }

        Ok(result)
    }

    /// Result images, newest first
    pub async fn gallery(&self) -> std::io::Result<Vec<GalleryImage>> {
        let mut entries = Vec::new();
        for (name, modified) in self.result_images().await? {
            let created: DateTime<Local> = modified.into();
            entries.push((
                modified,
                GalleryImage {
                    url: self.layout.result_url(&name),
                    name,
                    created: created.format("%Y-%m-%d %H:%M").to_string(),
                },
            ));
        }

        entries.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(entries.into_iter().map(|(_, image)| image).collect())
    }

    pub async fn stats(&self, api_configured: bool) -> std::io::Result<StatsReport> {
        Ok(StatsReport {
            total_images_generated: self.result_images().await?.len(),
            generations_today: self.log.completed_today().await?,
            api_status: if api_configured { "active" } else { "not_configured" },
        })
    }

    /// `*.jpg` files in the results directory with their modification times
    async fn result_images(&self) -> std::io::Result<Vec<(String, std::time::SystemTime)>> {
        let mut dir = match tokio::fs::read_dir(self.layout.results_dir()).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut images = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".jpg") {
                continue;
            }
            let metadata = entry.metadata().await?;
            if metadata.is_file() {
                images.push((name, metadata.modified()?));
            }
        }
        Ok(images)
    }
}

async fn write_upload(path: &Path, upload: &UploadedImage) -> anyhow::Result<()> {
    tokio::fs::write(path, &upload.bytes)
        .await
        .with_context(|| format!("failed to save upload to {}", path.display()))
}

fn describe_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{}MB", bytes / 1024 / 1024)
    } else {
        format!("{} bytes", bytes)
    }
}
