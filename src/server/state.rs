//! Shared application state.

use std::sync::Arc;

use crate::config::PollBudget;
use crate::job::JobRegistry;
use crate::upstream::OperationClient;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Upstream API client; credentials are injected at construction.
    pub client: Arc<OperationClient>,
    /// Per-process job tracking.
    pub registry: Arc<JobRegistry>,
    /// Poll budget applied to every spawned job poller.
    pub budget: PollBudget,
}

impl AppState {
    pub fn new(client: Arc<OperationClient>, registry: Arc<JobRegistry>, budget: PollBudget) -> Self {
        Self {
            client,
            registry,
            budget,
        }
    }
}
