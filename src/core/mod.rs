//! Core engine: batch orchestration, transformation dispatch, reference
//! resolution, and the shared domain types.

pub mod batch;
pub mod dispatch;
pub mod resolver;
pub mod types;
