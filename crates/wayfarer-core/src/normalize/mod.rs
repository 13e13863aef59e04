//! Response normalization: raw model output to a validated [`GeneratedPlan`].
//!
//! The upstream model returns free-form text wrapped in a response envelope.
//! This module extracts a usable text payload, cleans it down to a single
//! JSON object, parses and validates it, and overlays the caller's trip
//! parameters. Single pass, no retained state, no retries: a malformed
//! response is a terminal failure the caller surfaces to the user.

use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::plan::GeneratedPlan;
use crate::trip::TripRequest;

/// Normalization failures. Both map to HTTP 500 at the API boundary; the
/// discriminators are part of the wire contract and must stay stable.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("AI response contained no usable text payload")]
    EmptyAiResponse,

    #[error("AI response was not a valid plan: {detail}")]
    InvalidJsonFormat {
        detail: String,
        /// The raw extracted text, kept for diagnostics.
        raw: String,
    },
}

impl NormalizeError {
    /// Stable wire discriminator for the JSON error envelope.
    pub fn discriminator(&self) -> &'static str {
        match self {
            Self::EmptyAiResponse => "EmptyAIResponse",
            Self::InvalidJsonFormat { .. } => "InvalidJSONFormat",
        }
    }

    fn invalid(detail: impl Into<String>, raw: &str) -> Self {
        Self::InvalidJsonFormat {
            detail: detail.into(),
            raw: raw.to_owned(),
        }
    }
}

// ---------------------------------------------------------------------------
// Payload extraction
// ---------------------------------------------------------------------------

/// One strategy for locating the text payload inside a response envelope.
pub type Extractor = fn(&Value) -> Option<String>;

/// Extraction strategies in priority order; the first non-empty result wins.
pub const EXTRACTORS: &[Extractor] = &[
    extract_output_text,
    extract_first_choice,
    extract_output_serialized,
];

/// The direct `output.text` field.
fn extract_output_text(envelope: &Value) -> Option<String> {
    envelope
        .pointer("/output/text")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// The first entry of `output.choices`: its `text`, `content`, or
/// `message.content` field, whichever is present.
fn extract_first_choice(envelope: &Value) -> Option<String> {
    let choice = envelope.pointer("/output/choices")?.as_array()?.first()?;
    choice
        .get("text")
        .or_else(|| choice.get("content"))
        .or_else(|| choice.pointer("/message/content"))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// Last resort: serialize the whole `output` value back to text.
fn extract_output_serialized(envelope: &Value) -> Option<String> {
    envelope
        .get("output")
        .map(|output| output.to_string())
}

/// Locate the text payload, trying each extractor in order.
pub fn extract_payload(envelope: &Value) -> Result<String, NormalizeError> {
    EXTRACTORS
        .iter()
        .find_map(|extract| extract(envelope).filter(|text| !text.is_empty()))
        .ok_or(NormalizeError::EmptyAiResponse)
}

// ---------------------------------------------------------------------------
// Payload cleanup
// ---------------------------------------------------------------------------

/// Reduce raw model text to the JSON object substring.
///
/// Trims whitespace, strips a leading ```` ```json ```` marker and a
/// trailing ```` ``` ```` marker, then slices from the first `{` to the
/// last `}` to discard preamble ("Here is your plan:") and trailing
/// commentary.
pub fn clean_payload(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text = text.trim();

    if let Some(first_brace) = text.find('{') {
        text = &text[first_brace..];
    }
    if let Some(last_brace) = text.rfind('}') {
        text = &text[..=last_brace];
    }

    text.to_owned()
}

// ---------------------------------------------------------------------------
// Validation and overlay
// ---------------------------------------------------------------------------

/// JS-style truthiness: null, `false`, `0`, and `""` are falsy; arrays and
/// objects (even empty ones) are truthy. Stored plans were accepted under
/// these rules, so they must not tighten.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Require truthy `name` and `schedule` fields on the parsed object.
fn validate_required(parsed: &Value, raw: &str) -> Result<(), NormalizeError> {
    let object = parsed
        .as_object()
        .ok_or_else(|| NormalizeError::invalid("response is not a JSON object", raw))?;

    for field in ["name", "schedule"] {
        if !object.get(field).is_some_and(is_truthy) {
            return Err(NormalizeError::invalid(
                format!("missing required plan field: {field}"),
                raw,
            ));
        }
    }
    Ok(())
}

/// Overlay the caller's trip parameters onto the parsed object,
/// unconditionally overwriting anything the model produced for the same
/// fields. Caller values are authoritative.
fn overlay(parsed: &mut Value, trip: &TripRequest, user_id: Uuid) {
    let Some(object) = parsed.as_object_mut() else {
        return;
    };
    object.insert("destination".to_owned(), Value::from(trip.destination.clone()));
    object.insert("duration".to_owned(), Value::from(trip.duration));
    object.insert("budget".to_owned(), Value::from(trip.budget));
    object.insert("people".to_owned(), Value::from(trip.people));
    object.insert(
        "preferences".to_owned(),
        trip.preferences.clone().map_or(Value::Null, Value::from),
    );
    object.insert(
        "startDate".to_owned(),
        Value::from(trip.start_date.to_string()),
    );
    object.insert("endDate".to_owned(), Value::from(trip.end_date.to_string()));
    object.insert("user".to_owned(), Value::from(user_id.to_string()));
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the full normalization pipeline on a response envelope.
pub fn normalize_response(
    envelope: &Value,
    trip: &TripRequest,
    user_id: Uuid,
) -> Result<GeneratedPlan, NormalizeError> {
    let raw = extract_payload(envelope)?;
    normalize_text(&raw, trip, user_id)
}

/// Normalize an already-extracted text payload.
pub fn normalize_text(
    raw: &str,
    trip: &TripRequest,
    user_id: Uuid,
) -> Result<GeneratedPlan, NormalizeError> {
    let cleaned = clean_payload(raw);

    let mut parsed: Value = serde_json::from_str(&cleaned).map_err(|err| {
        warn!(
            error = %err,
            raw = %truncate(raw, 200),
            "model output did not parse as JSON"
        );
        NormalizeError::invalid(err.to_string(), raw)
    })?;

    validate_required(&parsed, raw)?;
    overlay(&mut parsed, trip, user_id);

    serde_json::from_value(parsed).map_err(|err| {
        warn!(error = %err, "merged plan object did not match the plan shape");
        NormalizeError::invalid(err.to_string(), raw)
    })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
