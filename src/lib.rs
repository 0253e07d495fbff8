//! imgedit-rs: backend engine for AI-assisted image editing
//!
//! Sessions hold a source image and accumulate edits; transformations are
//! dispatched to a hosted model provider and batches run through a bounded
//! concurrency orchestrator. The HTTP layer in [`server`] is a thin surface
//! over the engine in [`core`].

pub mod config;
pub mod core;
pub mod server;
pub mod storage;
pub mod utils;

pub use crate::config::GatewayConfig;
pub use crate::core::batch::{AbortHandle, BatchOptions, BatchOrchestrator, BatchProgress};
pub use crate::core::dispatch::{Dispatch, ProviderError, TransformDispatcher};
pub use crate::core::resolver::ImageRefResolver;
pub use crate::core::types::{
    BatchSummary, TransformOutput, TransformationSettings, UnitSettlement, UnitStatus, WorkUnit,
};
pub use crate::utils::error::{EngineError, Result};
