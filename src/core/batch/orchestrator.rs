//! Batch orchestrator: chunked dispatch with bounded concurrency
//!
//! The orchestrator owns the run of one batch: it partitions the unit list
//! into consecutive chunks of `concurrency_limit`, marks each chunk
//! `processing` before any network call completes, dispatches the chunk
//! concurrently, waits for the whole chunk to settle (hard barrier), and
//! paces between chunks. One unit's failure never aborts or skips siblings.

use crate::config::BatchConfig;
use crate::core::dispatch::{Dispatch, ProviderError};
use crate::core::types::{
    BatchSummary, TransformationSettings, UnitSettlement, UnitStatus, WorkUnit,
};
use crate::storage::sessions::{SessionStore, WorkUnitPatch};
use crate::utils::error::{EngineError, Result};
use chrono::Utc;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Tunables for one orchestrator instance
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Maximum in-flight provider calls per chunk
    pub concurrency_limit: usize,
    /// Pause between chunks; skipped after the final chunk
    pub pacing_delay: Duration,
    /// Per-dispatch timeout; a stalled call fails the unit
    pub dispatch_timeout: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency_limit: 3,
            pacing_delay: Duration::from_millis(500),
            dispatch_timeout: Duration::from_secs(60),
        }
    }
}

impl BatchOptions {
    pub fn from_config(batch: &BatchConfig, dispatch_timeout: Duration) -> Self {
        Self {
            concurrency_limit: batch.concurrency_limit,
            pacing_delay: batch.pacing_delay(),
            dispatch_timeout,
        }
    }
}

/// Cooperative cancellation for a batch run.
///
/// Checked before each new chunk starts; in-flight dispatches of the current
/// chunk still run to settlement.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs batches of work units against the dispatcher
pub struct BatchOrchestrator {
    dispatcher: Arc<dyn Dispatch>,
    sessions: Arc<dyn SessionStore>,
    options: BatchOptions,
}

impl BatchOrchestrator {
    pub fn new(
        dispatcher: Arc<dyn Dispatch>,
        sessions: Arc<dyn SessionStore>,
        options: BatchOptions,
    ) -> Self {
        Self {
            dispatcher,
            sessions,
            options,
        }
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Process every unit to settlement.
    ///
    /// Returns one settlement per input unit, in input order, regardless of
    /// which requests completed first. After return, no unit is left in
    /// `processing`: each dispatched unit is persisted as `completed` or
    /// `error`, and units skipped by an abort keep their prior status.
    pub async fn run_batch(
        &self,
        units: &[WorkUnit],
        prompt: &str,
        settings: &TransformationSettings,
        abort: &AbortHandle,
    ) -> Result<Vec<UnitSettlement>> {
        if prompt.trim().is_empty() {
            return Err(EngineError::Validation("prompt is required".to_string()));
        }

        let limit = self.options.concurrency_limit.max(1);
        let total_chunks = units.len().div_ceil(limit);
        info!(
            units = units.len(),
            chunks = total_chunks,
            limit, "starting batch run"
        );

        let mut settlements: Vec<UnitSettlement> = Vec::with_capacity(units.len());

        for (index, chunk) in units.chunks(limit).enumerate() {
            if abort.is_aborted() {
                warn!(
                    remaining = units.len() - settlements.len(),
                    "batch aborted; settling remaining units as rejected"
                );
                for unit in &units[index * limit..] {
                    settlements.push(UnitSettlement::rejected(&unit.id, ProviderError::Aborted));
                }
                break;
            }

            // mark the whole chunk processing before any network call
            // completes, so observers get immediate feedback
            for unit in chunk {
                self.mark_processing(unit, prompt).await;
            }

            let chunk_settlements =
                join_all(chunk.iter().map(|u| self.settle_unit(u, prompt, settings))).await;
            settlements.extend(chunk_settlements);

            // pace between chunks; the delay is skipped after the final chunk
            if index + 1 < total_chunks {
                tokio::time::sleep(self.options.pacing_delay).await;
            }
        }

        let summary = BatchSummary::from_settlements(&settlements);
        info!(
            fulfilled = summary.fulfilled,
            rejected = summary.rejected,
            "batch run finished"
        );
        Ok(settlements)
    }

    async fn mark_processing(&self, unit: &WorkUnit, prompt: &str) {
        let patch = WorkUnitPatch {
            status: Some(UnitStatus::Processing),
            prompt: Some(prompt.to_string()),
            processing_started_at: Some(Utc::now()),
            ..Default::default()
        };
        if let Err(e) = self.sessions.update(&unit.id, patch).await {
            warn!(unit = %unit.id, error = %e, "failed to persist processing status; stored state has diverged");
        }
    }

    /// Dispatch one unit and persist its terminal status.
    ///
    /// Never propagates an error: the outcome, success or failure, becomes
    /// this unit's settlement so siblings are unaffected.
    async fn settle_unit(
        &self,
        unit: &WorkUnit,
        prompt: &str,
        settings: &TransformationSettings,
    ) -> UnitSettlement {
        let outcome = match tokio::time::timeout(
            self.options.dispatch_timeout,
            self.dispatcher.dispatch(unit, prompt, settings),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                seconds: self.options.dispatch_timeout.as_secs(),
            }),
        };

        let patch = match &outcome {
            Ok(output) => WorkUnitPatch {
                status: Some(UnitStatus::Completed),
                result_image: Some(Some(output.url.clone())),
                processing_completed_at: Some(Utc::now()),
                ..Default::default()
            },
            Err(error) => {
                warn!(unit = %unit.id, %error, "unit dispatch failed");
                WorkUnitPatch {
                    status: Some(UnitStatus::Error),
                    result_image: Some(None),
                    processing_completed_at: Some(Utc::now()),
                    ..Default::default()
                }
            }
        };

        // a persistence failure must not fail the settlement; the returned
        // outcome still reflects the transformation result
        if let Err(e) = self.sessions.update(&unit.id, patch).await {
            warn!(unit = %unit.id, error = %e, "failed to persist terminal status; stored state has diverged");
        }

        UnitSettlement {
            unit_id: unit.id.clone(),
            outcome,
        }
    }
}
