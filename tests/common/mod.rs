//! Shared helpers for integration tests.

use std::sync::Arc;
use std::time::Duration;

use story_media::config::PollBudget;
use story_media::job::JobRegistry;
use story_media::server::{router, AppState};
use story_media::upstream::OperationClient;

use wiremock::MockServer;

/// Poll budget small enough to keep tests fast.
pub fn fast_budget() -> PollBudget {
    PollBudget::new(Duration::from_millis(20), Duration::from_millis(2000)).unwrap()
}

pub fn app_state(upstream: &MockServer, max_jobs: usize, budget: PollBudget) -> AppState {
    let client = Arc::new(
        OperationClient::with_base_url("test-api-key".to_string(), upstream.uri()).unwrap(),
    );
    AppState::new(client, Arc::new(JobRegistry::new(max_jobs)), budget)
}

/// Bind the job status service on an ephemeral port and return its base URL.
pub async fn spawn_service(state: AppState) -> String {
    let app = router().with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
