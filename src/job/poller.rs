//! Job poller: fixed-interval polling of one operation within a hard
//! deadline.

use tokio::time::Instant;

use crate::config::PollBudget;
use crate::upstream::{extract_result_uri, Operation, OperationClient};

/// Lifecycle of one generation job. `Ready`, `Failed`, and `TimedOut` are
/// absorbing; a job never moves back to `Queued` or `Processing`.
///
/// `TimedOut` is deliberately distinct from `Failed`: the deadline expiring
/// says nothing about the upstream operation, which may still complete later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Processing,
    Ready { uri: String },
    Failed { message: String },
    TimedOut,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Ready { .. } | JobState::Failed { .. } | JobState::TimedOut
        )
    }
}

/// Drive a submitted operation to a terminal job state.
///
/// If the operation is already terminal on entry (the upstream occasionally
/// completes within the submission call), it is resolved immediately with no
/// sleep. Otherwise the loop sleeps exactly `budget.interval` between polls
/// and forces `TimedOut` once elapsed wall-clock time reaches
/// `budget.deadline`. Polls are strictly sequential; there is never more
/// than one request in flight for a job.
pub async fn drive_to_terminal(
    client: &OperationClient,
    operation: Operation,
    budget: PollBudget,
) -> JobState {
    let started = Instant::now();
    let name = operation.name.clone();
    let mut current = operation;

    loop {
        if current.is_terminal() {
            return resolve_terminal(&current);
        }

        if started.elapsed() >= budget.deadline {
            log::warn!(
                "operation {} exceeded deadline of {:?}, giving up",
                name,
                budget.deadline
            );
            return JobState::TimedOut;
        }

        tokio::time::sleep(budget.interval).await;

        match client.poll(&name).await {
            Ok(next) => current = next,
            Err(err) => {
                // A poll failure is not swallowed; "still processing" is the
                // normal path, a transport or API error is not.
                log::error!("polling operation {} failed: {}", name, err);
                return JobState::Failed {
                    message: format!("polling failed: {err}"),
                };
            }
        }
    }
}

/// Map a terminal operation to its job state. An explicit upstream error wins
/// over any result payload; a terminal operation without an extractable URI
/// is a failure, not a success.
pub(crate) fn resolve_terminal(operation: &Operation) -> JobState {
    if let Some(message) = operation.error_message() {
        log::warn!("operation {} failed upstream: {}", operation.name, message);
        return JobState::Failed { message };
    }

    let uri = operation.response.as_ref().and_then(extract_result_uri);
    match uri {
        Some(uri) => {
            log::info!("operation {} ready: {}", operation.name, uri);
            JobState::Ready { uri }
        }
        None => JobState::Failed {
            message: "no playable uri".to_string(),
        },
    }
}
