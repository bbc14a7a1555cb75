//! Long-running operation handles and the terminal-state policy.

use serde::Deserialize;
use serde_json::Value;

/// `metadata.state` values that mark an operation as finished.
const TERMINAL_METADATA_STATES: &[&str] = &["SUCCEEDED", "FAILED", "CANCELLED"];

/// Result URI keys accepted on a candidate response node, in order.
const URI_KEYS: &[&str] = &["uri", "videoUri", "fileUri"];

/// External long-running-operation handle, as returned by submission and by
/// polling. Never written locally; polling reads replace the whole value.
#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    /// Operation identity, e.g. `models/veo-2.0-generate-001/operations/abc`.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    /// Opaque result payload; its shape varies by model version, so it is
    /// kept raw and interpreted by [`extract_result_uri`].
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub error: Option<OperationError>,
    #[serde(default)]
    pub metadata: Option<OperationMetadata>,
}

/// Error object attached to a failed operation.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationMetadata {
    #[serde(default)]
    pub state: Option<String>,
}

impl Operation {
    pub fn is_terminal(&self) -> bool {
        is_terminal(self)
    }

    /// Upstream error message, if the operation carries an error. Falls back
    /// to the numeric code when no message was supplied.
    pub fn error_message(&self) -> Option<String> {
        let error = self.error.as_ref()?;
        match (&error.message, error.code) {
            (Some(message), _) if !message.is_empty() => Some(message.clone()),
            (_, Some(code)) => Some(format!("upstream error code {code}")),
            _ => Some("upstream reported an error".to_string()),
        }
    }
}

/// Decide whether an operation has reached a terminal state.
///
/// The upstream API is not internally consistent about which field signals
/// completion: some operations set `done`, some only attach a `response` or
/// an `error`, and some only advance `metadata.state`. Any one of the four
/// counts; checking `done` alone misses real completions.
pub fn is_terminal(op: &Operation) -> bool {
    if op.done || op.response.is_some() || op.error.is_some() {
        return true;
    }
    op.metadata
        .as_ref()
        .and_then(|m| m.state.as_deref())
        .is_some_and(|state| TERMINAL_METADATA_STATES.contains(&state))
}

/// Extract the playable result URI from a terminal operation response.
///
/// The response shape varies by model version. Candidate locations are tried
/// in fixed priority order:
/// 1. `generateVideoResponse.generatedSamples[*]` (nested samples array)
/// 2. `generatedVideos[*]` (flat videos array)
/// 3. `video` (direct field)
///
/// Within each candidate, the first non-empty string under `uri`, `videoUri`,
/// or `fileUri` wins; a `video` sub-object is checked before the entry
/// itself. Returns `None` only when every candidate is empty.
pub fn extract_result_uri(response: &Value) -> Option<String> {
    if let Some(samples) = response
        .pointer("/generateVideoResponse/generatedSamples")
        .and_then(Value::as_array)
    {
        for sample in samples {
            if let Some(uri) = uri_from_entry(sample) {
                return Some(uri);
            }
        }
    }

    if let Some(videos) = response.get("generatedVideos").and_then(Value::as_array) {
        for entry in videos {
            if let Some(uri) = uri_from_entry(entry) {
                return Some(uri);
            }
        }
    }

    if let Some(video) = response.get("video") {
        return uri_from_node(video);
    }

    None
}

fn uri_from_entry(entry: &Value) -> Option<String> {
    if let Some(video) = entry.get("video") {
        if let Some(uri) = uri_from_node(video) {
            return Some(uri);
        }
    }
    uri_from_node(entry)
}

fn uri_from_node(node: &Value) -> Option<String> {
    for key in URI_KEYS {
        if let Some(uri) = node.get(*key).and_then(Value::as_str) {
            if !uri.is_empty() {
                return Some(uri.to_string());
            }
        }
    }
    None
}
