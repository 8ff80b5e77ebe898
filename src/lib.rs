// StoryMaker: story image generation gateway backed by the fal.ai API

pub mod api;
pub mod core;
pub mod orchestration;
pub mod services;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use core::{
    config::Config,
    errors::{ApiError, ConfigError, FalError},
    types::{AppState, FaceSwapResult, GenerationParams, GenerationResult, SessionId},
};

pub use orchestration::GenerationOrchestrator;

pub use services::{FalClient, GenerationBackend, GenerationLog};

pub use utils::{Metrics, StorageLayout};
