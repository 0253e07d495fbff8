//! Work-unit (edit session) persistence

use crate::core::types::{TransformationSettings, UnitStatus, WorkUnit};
use crate::utils::error::{EngineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Fields for creating a work unit
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct NewWorkUnit {
    pub source_image: String,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub settings: Option<TransformationSettings>,
}

/// Partial update applied atomically to a single unit
#[derive(Debug, Clone, Default)]
pub struct WorkUnitPatch {
    pub status: Option<UnitStatus>,
    pub prompt: Option<String>,
    /// `Some(Some(url))` attaches a result, `Some(None)` clears it
    pub result_image: Option<Option<String>>,
    pub settings: Option<TransformationSettings>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
}

/// One row of a session's edit history
#[derive(Debug, Clone, serde::Serialize)]
pub struct EditRecord {
    pub id: String,
    pub session_id: String,
    pub image_url: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

/// Fields for appending an edit history row
#[derive(Debug, Clone)]
pub struct NewEditRecord {
    pub session_id: String,
    pub image_url: String,
    pub prompt: String,
    pub processing_time_ms: Option<u64>,
}

/// Key-value persistence for work units, optionally scoped by batch
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, input: NewWorkUnit) -> Result<WorkUnit>;
    async fn get(&self, id: &str) -> Result<Option<WorkUnit>>;
    /// Apply a partial update; returns the updated unit, or `None` if absent
    async fn update(&self, id: &str, patch: WorkUnitPatch) -> Result<Option<WorkUnit>>;
    async fn list_all(&self) -> Result<Vec<WorkUnit>>;
    /// Units of one batch, in creation order
    async fn list_by_batch(&self, batch_id: &str) -> Result<Vec<WorkUnit>>;
    async fn add_history(&self, record: NewEditRecord) -> Result<EditRecord>;
    async fn history_for(&self, session_id: &str) -> Result<Vec<EditRecord>>;
}

#[derive(Default)]
struct Inner {
    units: HashMap<String, WorkUnit>,
    order: Vec<String>,
    history: HashMap<String, Vec<EditRecord>>,
}

/// In-memory reference implementation
#[derive(Default)]
pub struct InMemorySessionStore {
    inner: RwLock<Inner>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, input: NewWorkUnit) -> Result<WorkUnit> {
        if input.source_image.trim().is_empty() {
            return Err(EngineError::Validation(
                "source_image is required".to_string(),
            ));
        }

        let mut unit = WorkUnit::new(input.source_image, input.batch_id);
        unit.prompt = input.prompt;
        if let Some(settings) = input.settings {
            unit.settings = settings;
        }

        let mut inner = self.inner.write().await;
        inner.order.push(unit.id.clone());
        inner.units.insert(unit.id.clone(), unit.clone());
        Ok(unit)
    }

    async fn get(&self, id: &str) -> Result<Option<WorkUnit>> {
        Ok(self.inner.read().await.units.get(id).cloned())
    }

    async fn update(&self, id: &str, patch: WorkUnitPatch) -> Result<Option<WorkUnit>> {
        let mut inner = self.inner.write().await;
        let Some(unit) = inner.units.get_mut(id) else {
            return Ok(None);
        };

        if let Some(next) = patch.status {
            if !unit.status.can_transition(next) {
                return Err(EngineError::Validation(format!(
                    "illegal status transition {} -> {} for unit {}",
                    unit.status, next, id
                )));
            }
            unit.status = next;
        }
        if let Some(prompt) = patch.prompt {
            unit.prompt = Some(prompt);
        }
        if let Some(result) = patch.result_image {
            unit.result_image = result;
        }
        if let Some(settings) = patch.settings {
            unit.settings = settings;
        }
        if let Some(at) = patch.processing_started_at {
            unit.processing_started_at = Some(at);
        }
        if let Some(at) = patch.processing_completed_at {
            unit.processing_completed_at = Some(at);
        }
        unit.updated_at = Utc::now();
        Ok(Some(unit.clone()))
    }

    async fn list_all(&self) -> Result<Vec<WorkUnit>> {
        let inner = self.inner.read().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.units.get(id).cloned())
            .collect())
    }

    async fn list_by_batch(&self, batch_id: &str) -> Result<Vec<WorkUnit>> {
        let inner = self.inner.read().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.units.get(id))
            .filter(|u| u.batch_id.as_deref() == Some(batch_id))
            .cloned()
            .collect())
    }

    async fn add_history(&self, record: NewEditRecord) -> Result<EditRecord> {
        let row = EditRecord {
            id: Uuid::new_v4().to_string(),
            session_id: record.session_id.clone(),
            image_url: record.image_url,
            prompt: record.prompt,
            processing_time_ms: record.processing_time_ms,
            created_at: Utc::now(),
        };
        let mut inner = self.inner.write().await;
        inner
            .history
            .entry(record.session_id)
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn history_for(&self, session_id: &str) -> Result<Vec<EditRecord>> {
        Ok(self
            .inner
            .read()
            .await
            .history
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }
}
