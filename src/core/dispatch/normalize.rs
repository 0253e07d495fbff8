//! Provider response normalization
//!
//! The provider returns the result image under different field names and
//! shapes depending on model and API version. Each known shape is checked in
//! a fixed priority order; anything else is a missing-image failure.

use crate::core::dispatch::ProviderError;
use crate::core::types::TransformOutput;
use serde_json::Value;

/// Normalize a parsed provider body into a single result.
///
/// Priority order: `image` (single object), `images` (array), `data` (array).
pub fn normalize_response(body: &Value) -> Result<TransformOutput, ProviderError> {
    let image = body
        .get("image")
        .and_then(output_from_value)
        .or_else(|| first_in_array(body, "images"))
        .or_else(|| first_in_array(body, "data"));

    let mut output = image.ok_or(ProviderError::MissingImage)?;
    // seed is reported at the top level, not per image
    output.seed = body.get("seed").and_then(Value::as_u64);
    Ok(output)
}

fn first_in_array(body: &Value, field: &str) -> Option<TransformOutput> {
    body.get(field)
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(output_from_value)
}

fn output_from_value(value: &Value) -> Option<TransformOutput> {
    let url = value.get("url")?.as_str()?;
    Some(TransformOutput {
        url: url.to_string(),
        width: value.get("width").and_then(Value::as_u64).map(|w| w as u32),
        height: value.get("height").and_then(Value::as_u64).map(|h| h as u32),
        seed: None,
    })
}
