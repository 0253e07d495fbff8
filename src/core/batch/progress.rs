//! Progress projection over a batch's unit-status snapshot
//!
//! A pure, side-effect-free view recomputed on every poll tick. Polling runs
//! on a fixed cadence while any unit is processing and stops the instant
//! none are (including the zero-unit case).

use crate::core::types::{UnitStatus, WorkUnit};
use crate::storage::sessions::SessionStore;
use crate::utils::error::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Cadence for re-fetching the unit-status snapshot
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Derived counts and completion percentage for one batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchProgress {
    pub total: usize,
    pub idle: usize,
    pub processing: usize,
    pub completed: usize,
    pub errors: usize,
    /// `completed / total * 100`; 0 when the batch is empty. Units in
    /// `error` never count toward completion.
    pub percent: f64,
}

impl BatchProgress {
    /// `Some(cadence)` while polling should continue, `None` once settled
    pub fn poll_interval(&self) -> Option<Duration> {
        (self.processing > 0).then_some(POLL_INTERVAL)
    }

    pub fn is_settled(&self) -> bool {
        self.processing == 0
    }
}

/// Project a unit snapshot into progress counts
pub fn project(units: &[WorkUnit]) -> BatchProgress {
    let mut progress = BatchProgress {
        total: units.len(),
        idle: 0,
        processing: 0,
        completed: 0,
        errors: 0,
        percent: 0.0,
    };

    for unit in units {
        match unit.status {
            UnitStatus::Idle => progress.idle += 1,
            UnitStatus::Processing => progress.processing += 1,
            UnitStatus::Completed => progress.completed += 1,
            UnitStatus::Error => progress.errors += 1,
        }
    }

    if progress.total > 0 {
        progress.percent = progress.completed as f64 / progress.total as f64 * 100.0;
    }
    progress
}

/// Poll a batch's snapshot until no unit is processing, then return the
/// final projection.
pub async fn await_settled(store: &Arc<dyn SessionStore>, batch_id: &str) -> Result<BatchProgress> {
    loop {
        let units = store.list_by_batch(batch_id).await?;
        let progress = project(&units);
        match progress.poll_interval() {
            Some(interval) => tokio::time::sleep(interval).await,
            None => return Ok(progress),
        }
    }
}
