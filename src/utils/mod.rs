pub mod image_ops;
pub mod metrics;
pub mod paths;

// Re-export commonly used items
pub use image_ops::{encode_file_data_url_async, encode_jpeg_data_url_sync};
pub use metrics::Metrics;
pub use paths::{ArtifactKind, StorageLayout};
