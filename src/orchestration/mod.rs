pub mod generation_orchestrator;
pub mod session_files;

pub use generation_orchestrator::GenerationOrchestrator;
pub use session_files::SessionFiles;
