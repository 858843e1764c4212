pub mod error;
pub mod events;
pub mod logs;
pub mod model;
pub mod orchestrator;
pub mod stream;

pub use orchestrator::JobOrchestrator;
