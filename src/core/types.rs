//! Core data model: work units, settings, and settlement outcomes

use crate::core::dispatch::ProviderError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a work unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    /// Created but never dispatched
    Idle,
    /// A transformation request is in flight
    Processing,
    /// The transformation succeeded and a result image is attached
    Completed,
    /// The transformation failed
    Error,
}

impl UnitStatus {
    /// Whether a transition from `self` to `next` is legal.
    ///
    /// Terminal units may be re-dispatched (a new invocation moves them back
    /// to `Processing`) but never regress to `Idle`.
    pub fn can_transition(self, next: UnitStatus) -> bool {
        use UnitStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Idle, Processing) => true,
            (Processing, Completed) | (Processing, Error) => true,
            (Completed, Processing) | (Error, Processing) => true,
            _ => false,
        }
    }

    /// Whether the unit has reached a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, UnitStatus::Completed | UnitStatus::Error)
    }
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnitStatus::Idle => "idle",
            UnitStatus::Processing => "processing",
            UnitStatus::Completed => "completed",
            UnitStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Output quality requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    #[default]
    High,
}

/// Encoding of the result image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpg,
    Webp,
}

/// Settings captured once per dispatch call.
///
/// Different work units in the same batch may share one settings value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationSettings {
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub format: OutputFormat,
    /// Speed/strength dial, 1 (fast) to 10 (quality)
    #[serde(default = "default_speed")]
    pub speed: u8,
    /// Provider model selector; the default model is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

fn default_speed() -> u8 {
    7
}

impl Default for TransformationSettings {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            format: OutputFormat::default(),
            speed: default_speed(),
            model: None,
        }
    }
}

/// One image's end-to-end transformation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkUnit {
    pub id: String,
    /// Groups units processed together; absent for single-image flows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    /// Reference to the source image (internal object path or URL)
    pub source_image: String,
    /// Reference to the current result image; set iff status is `Completed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub status: UnitStatus,
    #[serde(default)]
    pub settings: TransformationSettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_completed_at: Option<DateTime<Utc>>,
}

impl WorkUnit {
    /// Create a fresh idle unit for a source image
    pub fn new(source_image: impl Into<String>, batch_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            batch_id,
            source_image: source_image.into(),
            result_image: None,
            prompt: None,
            status: UnitStatus::Idle,
            settings: TransformationSettings::default(),
            created_at: now,
            updated_at: now,
            processing_started_at: None,
            processing_completed_at: None,
        }
    }
}

/// Generate an opaque batch token grouping a set of work units
pub fn new_batch_id() -> String {
    format!("batch_{}", Uuid::new_v4().simple())
}

/// Normalized result of one provider call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformOutput {
    /// URL of the transformed image
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl TransformOutput {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            width: None,
            height: None,
            seed: None,
        }
    }
}

/// Fulfilled-or-rejected outcome of one unit's dispatch attempt
#[derive(Debug, Clone)]
pub struct UnitSettlement {
    pub unit_id: String,
    pub outcome: Result<TransformOutput, ProviderError>,
}

impl UnitSettlement {
    pub fn fulfilled(unit_id: impl Into<String>, output: TransformOutput) -> Self {
        Self {
            unit_id: unit_id.into(),
            outcome: Ok(output),
        }
    }

    pub fn rejected(unit_id: impl Into<String>, error: ProviderError) -> Self {
        Self {
            unit_id: unit_id.into(),
            outcome: Err(error),
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Informational success/failure counts across a batch run.
///
/// The orchestrator does not decide whether a batch "passed"; callers apply
/// their own policy to these counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub fulfilled: usize,
    pub rejected: usize,
}

impl BatchSummary {
    pub fn from_settlements(settlements: &[UnitSettlement]) -> Self {
        let fulfilled = settlements.iter().filter(|s| s.is_fulfilled()).count();
        Self {
            total: settlements.len(),
            fulfilled,
            rejected: settlements.len() - fulfilled,
        }
    }
}
