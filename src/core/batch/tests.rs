//! Orchestrator tests with a deterministic provider stub and a paused clock

use super::orchestrator::{AbortHandle, BatchOptions, BatchOrchestrator};
use super::progress::project;
use crate::core::dispatch::{Dispatch, ProviderError};
use crate::core::types::{
    BatchSummary, TransformOutput, TransformationSettings, UnitStatus, WorkUnit,
};
use crate::storage::sessions::{
    EditRecord, InMemorySessionStore, NewEditRecord, NewWorkUnit, SessionStore, WorkUnitPatch,
};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Provider stub with per-unit latency and injected failures.
///
/// Records the dispatch start instant of every call so tests can assert
/// chunk barriers and pacing gaps.
#[derive(Default)]
struct StubDispatcher {
    default_latency: Duration,
    latencies: HashMap<String, Duration>,
    failing: HashSet<String>,
    starts: Mutex<Vec<(String, Instant)>>,
}

impl StubDispatcher {
    fn with_latency(latency: Duration) -> Self {
        Self {
            default_latency: latency,
            ..Default::default()
        }
    }

    fn fail_unit(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    fn latency_for_unit(mut self, id: &str, latency: Duration) -> Self {
        self.latencies.insert(id.to_string(), latency);
        self
    }

    async fn start_of(&self, id: &str) -> Instant {
        self.starts
            .lock()
            .await
            .iter()
            .find(|(unit, _)| unit == id)
            .map(|(_, at)| *at)
            .expect("unit was never dispatched")
    }
}

#[async_trait]
impl Dispatch for StubDispatcher {
    async fn dispatch(
        &self,
        unit: &WorkUnit,
        _prompt: &str,
        _settings: &TransformationSettings,
    ) -> std::result::Result<TransformOutput, ProviderError> {
        self.starts
            .lock()
            .await
            .push((unit.id.clone(), Instant::now()));

        let latency = self
            .latencies
            .get(&unit.id)
            .copied()
            .unwrap_or(self.default_latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.failing.contains(&unit.id) {
            Err(ProviderError::network("injected failure"))
        } else {
            Ok(TransformOutput::from_url(format!("https://cdn.example.com/{}.png", unit.id)))
        }
    }
}

/// Store wrapper recording every status write, for notification assertions
struct RecordingStore {
    inner: InMemorySessionStore,
    status_writes: Mutex<Vec<(String, UnitStatus)>>,
}

impl RecordingStore {
    fn new() -> Self {
        Self {
            inner: InMemorySessionStore::new(),
            status_writes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SessionStore for RecordingStore {
    async fn create(&self, input: NewWorkUnit) -> Result<WorkUnit> {
        self.inner.create(input).await
    }

    async fn get(&self, id: &str) -> Result<Option<WorkUnit>> {
        self.inner.get(id).await
    }

    async fn update(&self, id: &str, patch: WorkUnitPatch) -> Result<Option<WorkUnit>> {
        if let Some(status) = patch.status {
            self.status_writes
                .lock()
                .await
                .push((id.to_string(), status));
        }
        self.inner.update(id, patch).await
    }

    async fn list_all(&self) -> Result<Vec<WorkUnit>> {
        self.inner.list_all().await
    }

    async fn list_by_batch(&self, batch_id: &str) -> Result<Vec<WorkUnit>> {
        self.inner.list_by_batch(batch_id).await
    }

    async fn add_history(&self, record: NewEditRecord) -> Result<EditRecord> {
        self.inner.add_history(record).await
    }

    async fn history_for(&self, session_id: &str) -> Result<Vec<EditRecord>> {
        self.inner.history_for(session_id).await
    }
}

async fn seed_units(store: &Arc<RecordingStore>, batch_id: &str, count: usize) -> Vec<WorkUnit> {
    let mut units = Vec::with_capacity(count);
    for i in 0..count {
        let unit = store
            .create(NewWorkUnit {
                source_image: format!("/objects/uploads/{}.png", i),
                batch_id: Some(batch_id.to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        units.push(unit);
    }
    units
}

fn options(limit: usize) -> BatchOptions {
    BatchOptions {
        concurrency_limit: limit,
        pacing_delay: Duration::from_millis(500),
        dispatch_timeout: Duration::from_secs(60),
    }
}

fn orchestrator(
    dispatcher: Arc<StubDispatcher>,
    store: Arc<RecordingStore>,
    limit: usize,
) -> BatchOrchestrator {
    BatchOrchestrator::new(dispatcher, store, options(limit))
}

#[tokio::test(start_paused = true)]
async fn test_five_units_limit_three_two_chunks() {
    let store = Arc::new(RecordingStore::new());
    let dispatcher = Arc::new(StubDispatcher::with_latency(Duration::ZERO));
    let units = seed_units(&store, "b1", 5).await;
    let orch = orchestrator(dispatcher.clone(), store.clone(), 3);

    let settlements = orch
        .run_batch(&units, "add a hat", &TransformationSettings::default(), &AbortHandle::new())
        .await
        .unwrap();

    assert_eq!(settlements.len(), 5);
    assert!(settlements.iter().all(|s| s.is_fulfilled()));

    // second chunk (units 3,4) must start at least one pacing delay after
    // the first chunk's dispatch start
    let first_chunk_start = dispatcher.start_of(&units[0].id).await;
    let second_chunk_start = dispatcher.start_of(&units[3].id).await;
    assert!(second_chunk_start - first_chunk_start >= Duration::from_millis(500));

    let snapshot = store.list_by_batch("b1").await.unwrap();
    let progress = project(&snapshot);
    assert_eq!(progress.completed, 5);
    assert_eq!(progress.processing, 0);
    assert_eq!(progress.errors, 0);
    assert_eq!(progress.percent, 100.0);
}

#[tokio::test(start_paused = true)]
async fn test_elapsed_time_scales_with_chunk_count() {
    let store = Arc::new(RecordingStore::new());
    let dispatcher = Arc::new(StubDispatcher::with_latency(Duration::ZERO));
    let units = seed_units(&store, "b1", 7).await;
    let orch = orchestrator(dispatcher, store, 3);

    // 7 units at limit 3 -> 3 chunks -> 2 pacing delays
    let started = Instant::now();
    orch.run_batch(&units, "p", &TransformationSettings::default(), &AbortHandle::new())
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn test_no_pacing_delay_for_single_chunk() {
    let store = Arc::new(RecordingStore::new());
    let dispatcher = Arc::new(StubDispatcher::with_latency(Duration::ZERO));
    let units = seed_units(&store, "b1", 3).await;
    let orch = orchestrator(dispatcher, store, 3);

    let started = Instant::now();
    orch.run_batch(&units, "p", &TransformationSettings::default(), &AbortHandle::new())
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_settlement_order_matches_input_order() {
    let store = Arc::new(RecordingStore::new());
    let units = seed_units(&store, "b1", 6).await;

    // completion order inverted within each chunk via decreasing latencies
    let mut dispatcher = StubDispatcher::with_latency(Duration::ZERO);
    for (i, unit) in units.iter().enumerate() {
        dispatcher = dispatcher.latency_for_unit(&unit.id, Duration::from_millis(600 - i as u64 * 100));
    }
    let orch = orchestrator(Arc::new(dispatcher), store, 3);

    let settlements = orch
        .run_batch(&units, "p", &TransformationSettings::default(), &AbortHandle::new())
        .await
        .unwrap();

    let settled_ids: Vec<_> = settlements.iter().map(|s| s.unit_id.as_str()).collect();
    let input_ids: Vec<_> = units.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(settled_ids, input_ids);
}

#[tokio::test(start_paused = true)]
async fn test_one_failing_unit_never_skips_siblings() {
    let store = Arc::new(RecordingStore::new());
    let units = seed_units(&store, "b1", 5).await;
    let dispatcher =
        Arc::new(StubDispatcher::with_latency(Duration::ZERO).fail_unit(&units[1].id));
    let orch = orchestrator(dispatcher, store.clone(), 2);

    let settlements = orch
        .run_batch(&units, "p", &TransformationSettings::default(), &AbortHandle::new())
        .await
        .unwrap();

    let summary = BatchSummary::from_settlements(&settlements);
    assert_eq!(summary.total, 5);
    assert_eq!(summary.fulfilled, 4);
    assert_eq!(summary.rejected, 1);
    assert!(!settlements[1].is_fulfilled());

    // every unit is terminal; the failed one carries no result image
    for unit in store.list_by_batch("b1").await.unwrap() {
        assert_ne!(unit.status, UnitStatus::Processing);
        if unit.id == units[1].id {
            assert_eq!(unit.status, UnitStatus::Error);
            assert!(unit.result_image.is_none());
            assert!(unit.processing_completed_at.is_some());
        } else {
            assert_eq!(unit.status, UnitStatus::Completed);
            assert!(unit.result_image.is_some());
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_status_written_at_least_twice_per_unit() {
    let store = Arc::new(RecordingStore::new());
    let units = seed_units(&store, "b1", 4).await;
    let dispatcher = Arc::new(StubDispatcher::with_latency(Duration::ZERO).fail_unit(&units[2].id));
    let orch = orchestrator(dispatcher, store.clone(), 2);

    orch.run_batch(&units, "p", &TransformationSettings::default(), &AbortHandle::new())
        .await
        .unwrap();

    let writes = store.status_writes.lock().await;
    for unit in &units {
        let for_unit: Vec<_> = writes
            .iter()
            .filter(|(id, _)| id == &unit.id)
            .map(|(_, s)| *s)
            .collect();
        assert!(for_unit.len() >= 2, "expected >=2 status writes, got {:?}", for_unit);
        assert_eq!(for_unit[0], UnitStatus::Processing);
        assert!(for_unit.last().unwrap().is_terminal());
    }
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_dispatch_fails_the_unit() {
    let store = Arc::new(RecordingStore::new());
    let units = seed_units(&store, "b1", 1).await;
    let dispatcher = Arc::new(StubDispatcher::with_latency(Duration::from_secs(600)));
    let orch = BatchOrchestrator::new(
        dispatcher,
        store.clone(),
        BatchOptions {
            concurrency_limit: 3,
            pacing_delay: Duration::from_millis(500),
            dispatch_timeout: Duration::from_secs(1),
        },
    );

    let settlements = orch
        .run_batch(&units, "p", &TransformationSettings::default(), &AbortHandle::new())
        .await
        .unwrap();

    assert!(matches!(
        settlements[0].outcome,
        Err(ProviderError::Timeout { seconds: 1 })
    ));
    let unit = store.get(&units[0].id).await.unwrap().unwrap();
    assert_eq!(unit.status, UnitStatus::Error);
}

#[tokio::test(start_paused = true)]
async fn test_abort_settles_remaining_units_without_dispatch() {
    let store = Arc::new(RecordingStore::new());
    let units = seed_units(&store, "b1", 6).await;
    let dispatcher = Arc::new(StubDispatcher::with_latency(Duration::from_millis(200)));
    let orch = Arc::new(orchestrator(dispatcher.clone(), store.clone(), 3));

    let abort = AbortHandle::new();
    let run = {
        let orch = orch.clone();
        let units = units.clone();
        let abort = abort.clone();
        tokio::spawn(async move {
            orch.run_batch(&units, "p", &TransformationSettings::default(), &abort)
                .await
        })
    };

    // abort while chunk 1 is still in flight
    tokio::time::sleep(Duration::from_millis(100)).await;
    abort.abort();

    let settlements = run.await.unwrap().unwrap();
    assert_eq!(settlements.len(), 6);

    // chunk 1 ran to settlement, chunk 2 was never started
    for settlement in &settlements[..3] {
        assert!(settlement.is_fulfilled());
    }
    for settlement in &settlements[3..] {
        assert!(matches!(settlement.outcome, Err(ProviderError::Aborted)));
    }

    // skipped units were never marked processing
    for unit in &units[3..] {
        let stored = store.get(&unit.id).await.unwrap().unwrap();
        assert_eq!(stored.status, UnitStatus::Idle);
    }
    assert_eq!(dispatcher.starts.lock().await.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_empty_batch_settles_immediately() {
    let store = Arc::new(RecordingStore::new());
    let dispatcher = Arc::new(StubDispatcher::with_latency(Duration::ZERO));
    let orch = orchestrator(dispatcher, store, 3);

    let started = Instant::now();
    let settlements = orch
        .run_batch(&[], "p", &TransformationSettings::default(), &AbortHandle::new())
        .await
        .unwrap();
    assert!(settlements.is_empty());
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn test_blank_prompt_fails_fast() {
    let store = Arc::new(RecordingStore::new());
    let units = seed_units(&store, "b1", 2).await;
    let dispatcher = Arc::new(StubDispatcher::with_latency(Duration::ZERO));
    let orch = orchestrator(dispatcher.clone(), store.clone(), 3);

    let result = orch
        .run_batch(&units, "  ", &TransformationSettings::default(), &AbortHandle::new())
        .await;
    assert!(result.is_err());
    // nothing was dispatched and no status moved
    assert!(dispatcher.starts.lock().await.is_empty());
    for unit in store.list_by_batch("b1").await.unwrap() {
        assert_eq!(unit.status, UnitStatus::Idle);
    }
}

#[tokio::test(start_paused = true)]
async fn test_chunk_barrier_holds_under_uneven_latency() {
    let store = Arc::new(RecordingStore::new());
    let units = seed_units(&store, "b1", 4).await;

    // one slow unit in chunk 1 delays the start of chunk 2
    let dispatcher = Arc::new(
        StubDispatcher::with_latency(Duration::ZERO)
            .latency_for_unit(&units[0].id, Duration::from_secs(3)),
    );
    let orch = orchestrator(dispatcher.clone(), store, 2);

    orch.run_batch(&units, "p", &TransformationSettings::default(), &AbortHandle::new())
        .await
        .unwrap();

    let slow_start = dispatcher.start_of(&units[0].id).await;
    let chunk2_start = dispatcher.start_of(&units[2].id).await;
    // 3s slow dispatch + 500ms pacing before the next chunk begins
    assert!(chunk2_start - slow_start >= Duration::from_millis(3500));
}
