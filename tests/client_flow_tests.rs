//! Client poller tests: generate() end to end against the real service.

mod common;

use std::time::Duration;

use async_trait::async_trait;
use common::{app_state, fast_budget, spawn_service};
use story_media::client::{GenerateError, MediaClient};
use story_media::config::PollBudget;
use story_media::playback::{Playback, ProbeOutcome, Prober};
use story_media::upstream::GenerationRequest;

use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> GenerationRequest {
    GenerationRequest::new("break the ice", "Mia broke the ice at the party.")
}

fn client_budget() -> PollBudget {
    PollBudget::new(Duration::from_millis(25), Duration::from_millis(3000)).unwrap()
}

fn mount_ready_upstream(upstream: &MockServer) -> (String, Vec<u8>) {
    let result_uri = format!("{}/files/result.mp4", upstream.uri());
    (result_uri, b"tiny video payload".to_vec())
}

async fn mount_happy_path(upstream: &MockServer) {
    let (result_uri, payload) = mount_ready_upstream(upstream);

    Mock::given(method("POST"))
        .and(path_regex(r"^/models/.*:predictLongRunning$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "models/veo/operations/op-ok"
        })))
        .mount(upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/models/veo/operations/op-ok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "models/veo/operations/op-ok",
            "done": true,
            "response": {"video": {"uri": result_uri}}
        })))
        .mount(upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/result.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(payload),
        )
        .mount(upstream)
        .await;
}

#[tokio::test]
async fn test_generate_resolves_stream_url_without_probing() {
    let upstream = MockServer::start().await;
    mount_happy_path(&upstream).await;

    let base = spawn_service(app_state(&upstream, 4, fast_budget())).await;
    let client = MediaClient::new(base.clone())
        .unwrap()
        .with_budget(client_budget());

    let result = client.generate(&request()).await.unwrap();

    assert!(result.uri.starts_with(&base));
    assert!(result.uri.ends_with("/stream"));
    assert_eq!(result.playback, Playback::Generated);
    assert!(result.headers.is_empty());
}

#[tokio::test]
async fn test_generate_with_passing_probe_stays_generated() {
    let upstream = MockServer::start().await;
    mount_happy_path(&upstream).await;

    let base = spawn_service(app_state(&upstream, 4, fast_budget())).await;
    // The real HTTP probe against the relayed stream URL.
    let client = MediaClient::new(base)
        .unwrap()
        .with_budget(client_budget())
        .with_probing();

    let result = client.generate(&request()).await.unwrap();
    assert_eq!(result.playback, Playback::Generated);
}

struct DeadProbe;

#[async_trait]
impl Prober for DeadProbe {
    async fn probe(&self, _uri: &str) -> ProbeOutcome {
        // Mimics a probe window that elapsed without any decode signal.
        ProbeOutcome::fail("web_probe_timeout")
    }
}

#[tokio::test]
async fn test_generate_with_failing_probe_falls_back_with_reason() {
    let upstream = MockServer::start().await;
    mount_happy_path(&upstream).await;

    let base = spawn_service(app_state(&upstream, 4, fast_budget())).await;
    let client = MediaClient::new(base)
        .unwrap()
        .with_budget(client_budget())
        .with_prober(Box::new(DeadProbe));

    let result = client.generate(&request()).await.unwrap();
    assert_eq!(
        result.playback,
        Playback::Fallback {
            reason: "web_probe_timeout".to_string()
        }
    );
}

#[tokio::test]
async fn test_generate_surfaces_upstream_error_message() {
    let upstream = MockServer::start().await;
    let op_path = "/models/veo/operations/op-quota";

    Mock::given(method("POST"))
        .and(path_regex(r"^/models/.*:predictLongRunning$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "models/veo/operations/op-quota"
        })))
        .mount(&upstream)
        .await;
    // A few processing polls before the terminal error.
    Mock::given(method("GET"))
        .and(path(op_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "models/veo/operations/op-quota"
        })))
        .up_to_n_times(3)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path(op_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "models/veo/operations/op-quota",
            "done": true,
            "error": {"message": "quota exceeded"}
        })))
        .mount(&upstream)
        .await;

    let base = spawn_service(app_state(&upstream, 4, fast_budget())).await;
    let client = MediaClient::new(base)
        .unwrap()
        .with_budget(client_budget());

    let result = client.generate(&request()).await;
    match result {
        Err(GenerateError::GenerationFailed { message }) => {
            assert_eq!(message, "quota exceeded");
        }
        other => panic!("expected GenerationFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_generate_times_out_when_job_never_finishes() {
    let upstream = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/models/.*:predictLongRunning$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "models/veo/operations/op-stuck"
        })))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "models/veo/operations/op-stuck"
        })))
        .mount(&upstream)
        .await;

    // Server keeps polling well past the client's short deadline.
    let server_budget =
        PollBudget::new(Duration::from_millis(50), Duration::from_secs(30)).unwrap();
    let base = spawn_service(app_state(&upstream, 4, server_budget)).await;

    let client_budget =
        PollBudget::new(Duration::from_millis(20), Duration::from_millis(120)).unwrap();
    let client = MediaClient::new(base).unwrap().with_budget(client_budget);

    let result = client.generate(&request()).await;
    assert!(matches!(result, Err(GenerateError::Timeout)));
}

#[tokio::test]
async fn test_generate_fails_job_creation_on_service_refusal() {
    let upstream = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path_regex(r"^/models/.*:predictLongRunning$"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&upstream)
        .await;

    let base = spawn_service(app_state(&upstream, 4, fast_budget())).await;
    let client = MediaClient::new(base).unwrap();

    let result = client.generate(&request()).await;
    assert!(matches!(result, Err(GenerateError::JobCreation(_))));
}
