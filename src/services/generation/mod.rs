pub mod fal_client;

use async_trait::async_trait;
use std::path::Path;

use crate::core::types::{FaceSwapResult, GenerationInput, GenerationResult};

pub use fal_client::FalClient;

/// Remote image generation backend.
///
/// Implementations never return `Err`: every failure is folded into the result's
/// `success`/`error` fields so callers handle one shape.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate story images from a face photo (and optional mask) already on disk
    async fn generate_story_images(&self, input: &GenerationInput) -> GenerationResult;

    /// Swap the face from `face_image_path` onto `target_image_path`
    async fn face_swap(&self, face_image_path: &Path, target_image_path: &Path)
        -> FaceSwapResult;
}
