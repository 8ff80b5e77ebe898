pub mod generation;
pub mod generation_log;

// Re-export commonly used services
pub use generation::{FalClient, GenerationBackend};
pub use generation_log::{GenerationLog, GenerationLogEntry, GenerationStatus};
