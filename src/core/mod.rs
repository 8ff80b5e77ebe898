pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{
    ApiError, ConfigError, FalError, FetchError, GenerationLogError, ImageEncodeError,
};
pub use types::{
    AppState, FaceSwapRequest, FaceSwapResult, GenerationInput, GenerationParams,
    GenerationRequest, GenerationResult, SessionId, UploadedImage,
};
