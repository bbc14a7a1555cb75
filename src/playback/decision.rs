//! Fallback decision: fold the probe outcome into a playback choice.

use std::collections::HashMap;

use super::probe::ProbeOutcome;

/// How the presentation layer should play the result. A fallback always
/// carries its reason; a generated playback never does. The shape makes the
/// illegal combinations unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Playback {
    /// Use the produced media.
    Generated,
    /// Use a bundled static asset instead.
    Fallback { reason: String },
}

/// Terminal artifact handed to presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaResult {
    /// Fully-qualified stream URL.
    pub uri: String,
    /// Extra request headers the player must send; empty for relayed URLs,
    /// which carry their own upstream authentication server-side.
    pub headers: HashMap<String, String>,
    pub playback: Playback,
}

impl MediaResult {
    pub fn new(uri: impl Into<String>, playback: Playback) -> Self {
        Self {
            uri: uri.into(),
            headers: HashMap::new(),
            playback,
        }
    }
}

/// Combine platform policy and probe outcome.
///
/// `None` means the platform did not require probing, so the generated media
/// is trusted as-is. This only ever runs on confirmed upstream success;
/// upstream failure is a hard error and never reaches a fallback.
pub fn decide_playback(probe: Option<&ProbeOutcome>) -> Playback {
    match probe {
        None => Playback::Generated,
        Some(outcome) if outcome.ok => Playback::Generated,
        Some(outcome) => Playback::Fallback {
            reason: outcome
                .reason
                .clone()
                .unwrap_or_else(|| "probe failed".to_string()),
        },
    }
}
