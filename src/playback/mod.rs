//! Playability probing and the fallback decision.
//!
//! On platforms where native media decoding cannot be trusted, the delivered
//! stream is probed before the app commits to showing it. Probe outcomes
//! combine with platform policy into a single playback decision.

mod decision;
mod probe;

pub use decision::{decide_playback, MediaResult, Playback};
pub use probe::{HttpProbe, ProbeOutcome, Prober, DEFAULT_PROBE_TIMEOUT, PROBE_TIMEOUT_REASON};
