//! Upstream generative media API integration.
//!
//! Wraps the long-running-operation endpoints of the generation API:
//! submission, poll-by-name, and authenticated result fetch. Pure
//! request/response; polling loops live in the `job` module.

mod client;
mod operation;

pub use client::{FetchedMedia, GenerationRequest, OperationClient, UpstreamError};
pub use operation::{
    extract_result_uri, is_terminal, Operation, OperationError, OperationMetadata,
};
