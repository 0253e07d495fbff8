//! Batch processing engine
//!
//! Runs the transformation dispatcher over a list of work units under a
//! concurrency bound, with chunk barriers, pacing, per-unit failure
//! isolation, and a derived progress projection.

pub mod orchestrator;
pub mod progress;
#[cfg(test)]
mod tests;

pub use orchestrator::{AbortHandle, BatchOptions, BatchOrchestrator};
pub use progress::{await_settled, project, BatchProgress, POLL_INTERVAL};
