//! Job registry: owns one poller task per job and a cap on how many run at
//! once.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

use super::poller::{drive_to_terminal, JobState};
use crate::config::PollBudget;
use crate::upstream::{Operation, OperationClient};

/// Errors raised when registering a job.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("too many concurrent generation jobs")]
    AtCapacity,
}

/// A reserved slot under the concurrent-job cap.
///
/// Reserved *before* the upstream operation is submitted, so a creation
/// refused at capacity never starts an operation nobody will poll. Handed to
/// [`JobRegistry::spawn`], which keeps it alive for the life of the poller;
/// dropping it unspawned releases the slot.
pub struct JobSlot {
    permit: OwnedSemaphorePermit,
}

/// Tracks all jobs in the process. Each job is a spawned poller task that
/// publishes state through a watch channel; the registry holds the receiving
/// ends. Pollers are fully independent of each other, and a client
/// abandoning its side never cancels one: jobs are fire-and-poll, running to
/// their own terminal state or deadline regardless of watchers.
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, watch::Receiver<JobState>>>>,
    permits: Arc<Semaphore>,
    retention: Option<Duration>,
}

impl JobRegistry {
    /// Create a registry allowing at most `max_concurrent_jobs` running
    /// pollers. Unbounded concurrent upstream operations would be a resource
    /// exhaustion risk, so the cap is mandatory. Job records are kept until
    /// the process exits unless [`JobRegistry::with_retention`] is set.
    pub fn new(max_concurrent_jobs: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            permits: Arc::new(Semaphore::new(max_concurrent_jobs)),
            retention: None,
        }
    }

    /// Evict each job record `ttl` after its poller reaches a terminal
    /// state, so a long-lived server does not accumulate records forever.
    pub fn with_retention(mut self, ttl: Duration) -> Self {
        self.retention = Some(ttl);
        self
    }

    /// Reserve a slot under the concurrent-job cap.
    ///
    /// Callers reserve first, then submit the upstream operation, then hand
    /// the slot to [`JobRegistry::spawn`]; that ordering keeps the cap a
    /// bound on operations actually started.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::AtCapacity` when the cap is reached.
    pub fn reserve(&self) -> Result<JobSlot, RegistryError> {
        let permit = self
            .permits
            .clone()
            .try_acquire_owned()
            .map_err(|_| RegistryError::AtCapacity)?;
        Ok(JobSlot { permit })
    }

    /// Register an already-submitted operation and spawn its poller task in
    /// the reserved slot. Returns the job id immediately; completion is
    /// observed via [`JobRegistry::status`].
    pub fn spawn(
        &self,
        slot: JobSlot,
        client: Arc<OperationClient>,
        operation: Operation,
        budget: PollBudget,
    ) -> Uuid {
        let job_id = Uuid::new_v4();
        let (tx, rx) = watch::channel(JobState::Queued);

        {
            let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
            jobs.insert(job_id, rx);
        }

        log::info!("job {} registered for operation {}", job_id, operation.name);

        let jobs = Arc::clone(&self.jobs);
        let retention = self.retention;
        tokio::spawn(async move {
            // Permit is held for the life of the poller, bounding in-flight
            // upstream operations started by this process.
            let permit = slot.permit;

            if !operation.is_terminal() {
                let _ = tx.send(JobState::Processing);
            }

            let terminal = drive_to_terminal(&client, operation, budget).await;
            log::info!("job {} finished: {:?}", job_id, terminal);
            let _ = tx.send(terminal);

            // The slot frees as soon as polling ends; retention only keeps
            // the record readable, not the capacity occupied.
            drop(permit);

            if let Some(ttl) = retention {
                tokio::time::sleep(ttl).await;
                let mut jobs = jobs.write().unwrap_or_else(|e| e.into_inner());
                jobs.remove(&job_id);
            }
        });

        job_id
    }

    /// Current state of a job, or `None` for an unknown id.
    pub fn status(&self, job_id: &Uuid) -> Option<JobState> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        jobs.get(job_id).map(|rx| rx.borrow().clone())
    }

    /// Drop a job record once the caller is done with it. The poller task,
    /// if still running, is unaffected.
    pub fn forget(&self, job_id: &Uuid) {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        jobs.remove(job_id);
    }

    /// Number of currently tracked jobs.
    pub fn len(&self) -> usize {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
