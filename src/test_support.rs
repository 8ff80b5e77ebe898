// Shared helpers for unit tests

use async_trait::async_trait;
use axum::Router;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::core::types::{FaceSwapResult, GenerationInput, GenerationResult};
use crate::services::generation::GenerationBackend;

/// Serve `app` on an ephemeral localhost port and return its base URL
pub async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Encode a solid-colour PNG of the given size
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([200, 120, 40, 255]),
    ));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Backend double that records calls and whether inputs existed at call time
pub struct StubBackend {
    pub calls: AtomicUsize,
    pub seen_inputs: Mutex<Vec<(PathBuf, bool)>>,
    result: GenerationResult,
    swap_result: FaceSwapResult,
}

impl StubBackend {
    pub fn returning(result: GenerationResult) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            seen_inputs: Mutex::new(Vec::new()),
            result,
            swap_result: FaceSwapResult::failed("not configured"),
        })
    }

    pub fn swapping(swap_result: FaceSwapResult) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            seen_inputs: Mutex::new(Vec::new()),
            result: GenerationResult::failed("not configured"),
            swap_result,
        })
    }
}

#[async_trait]
impl GenerationBackend for StubBackend {
    async fn generate_story_images(&self, input: &GenerationInput) -> GenerationResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut seen = self.seen_inputs.lock();
        seen.push((input.face_image_path.clone(), input.face_image_path.exists()));
        if let Some(mask) = &input.mask_image_path {
            seen.push((mask.clone(), mask.exists()));
        }
        self.result.clone()
    }

    async fn face_swap(&self, face: &Path, target: &Path) -> FaceSwapResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut seen = self.seen_inputs.lock();
        seen.push((face.to_path_buf(), face.exists()));
        seen.push((target.to_path_buf(), target.exists()));
        self.swap_result.clone()
    }
}
