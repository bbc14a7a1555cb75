//! story-media library crate.
//!
//! Media generation orchestration for the story app: submit a generation
//! request to the upstream long-running-operation API, poll it to a terminal
//! state under a bounded time budget, relay the resulting bytes to clients
//! without buffering, and (on platforms that need it) probe the delivered
//! media for playability before committing to show it.

pub mod client;
pub mod config;
pub mod job;
pub mod playback;
pub mod relay;
pub mod server;
pub mod upstream;
