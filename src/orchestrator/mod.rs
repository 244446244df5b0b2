//! Orchestrator module - Retry unit, batch dispatcher, progress, fallback and
//! the generation service that drives them

pub mod dispatcher;
pub mod fallback;
pub mod progress;
pub mod retry;
pub mod service;
pub mod types;

pub use dispatcher::{BatchResult, Dispatcher};
pub use fallback::FallbackSelector;
pub use progress::{BatchProgress, ProgressReporter, ProgressSnapshot};
pub use retry::{AttemptReport, AttemptState, RetryPolicy};
pub use service::GenerationService;
pub use types::{GenerationOutcome, GenerationRequest};
