//! Model registry: selector → endpoint and request-body builder
//!
//! Each supported provider model owns its endpoint path and the builder for
//! its required fields, so new models are added here without touching the
//! dispatch loop.

use crate::core::types::TransformationSettings;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Model used when the settings carry no selector
pub const DEFAULT_MODEL: &str = "nano-banana-edit";

/// Inputs available to a request-body builder
pub struct DispatchContext<'a> {
    /// Resolved, provider-fetchable URL of the source image
    pub image_url: &'a str,
    pub prompt: &'a str,
    pub settings: &'a TransformationSettings,
}

/// One entry of the model table
pub struct ModelSpec {
    pub id: &'static str,
    /// Path under the provider API base
    pub endpoint: &'static str,
    /// Builds the model-specific request body
    pub build_body: fn(&DispatchContext<'_>) -> Value,
}

static MODEL_TABLE: Lazy<HashMap<&'static str, ModelSpec>> = Lazy::new(|| {
    let specs = [
        ModelSpec {
            id: "nano-banana-edit",
            endpoint: "/fal-ai/nano-banana/edit",
            build_body: build_edit_body,
        },
        ModelSpec {
            id: "pose-transfer",
            endpoint: "/fal-ai/pose-transfer",
            build_body: build_pose_transfer_body,
        },
        ModelSpec {
            id: "creative-upscale",
            endpoint: "/fal-ai/creative-upscaler",
            build_body: build_upscale_body,
        },
    ];
    specs.into_iter().map(|s| (s.id, s)).collect()
});

/// Look up a model spec by selector; `None` selector yields the default model.
///
/// Returns `None` for an unknown selector so the dispatcher can fail fast.
pub fn model_spec(selector: Option<&str>) -> Option<&'static ModelSpec> {
    MODEL_TABLE.get(selector.unwrap_or(DEFAULT_MODEL))
}

fn build_edit_body(ctx: &DispatchContext<'_>) -> Value {
    json!({
        "image_url": ctx.image_url,
        "prompt": ctx.prompt,
        "quality": ctx.settings.quality,
        "format": ctx.settings.format,
        "speed": ctx.settings.speed,
    })
}

fn build_pose_transfer_body(ctx: &DispatchContext<'_>) -> Value {
    json!({
        "subject_image_url": ctx.image_url,
        "pose_image_url": pose_reference_for(ctx.prompt),
        "prompt": ctx.prompt,
        "quality": ctx.settings.quality,
        "format": ctx.settings.format,
    })
}

fn build_upscale_body(ctx: &DispatchContext<'_>) -> Value {
    json!({
        "image_url": ctx.image_url,
        "prompt": ctx.prompt,
        "creativity": f64::from(ctx.settings.speed) / 10.0,
        "format": ctx.settings.format,
    })
}

/// Keyword → reference-pose image hints, checked in declaration order.
///
/// This is a best-effort substring sniff over free text, not a parser;
/// overlapping keywords resolve to the first match.
static POSE_REFERENCES: &[(&str, &str)] = &[
    ("sitting", "https://storage.googleapis.com/imgedit-poses/sitting.png"),
    ("jumping", "https://storage.googleapis.com/imgedit-poses/jumping.png"),
    ("running", "https://storage.googleapis.com/imgedit-poses/running.png"),
    ("lying", "https://storage.googleapis.com/imgedit-poses/lying.png"),
    ("kneeling", "https://storage.googleapis.com/imgedit-poses/kneeling.png"),
];

const STANDING_REFERENCE: &str = "https://storage.googleapis.com/imgedit-poses/standing.png";

/// Pick a reference-pose image for a prompt, case-insensitively.
///
/// Falls back to the standing reference when no keyword matches.
pub fn pose_reference_for(prompt: &str) -> &'static str {
    let haystack = prompt.to_lowercase();
    POSE_REFERENCES
        .iter()
        .find(|(keyword, _)| haystack.contains(keyword))
        .map(|(_, url)| *url)
        .unwrap_or(STANDING_REFERENCE)
}
