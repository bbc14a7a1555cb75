//! Server-side job tracking: one poller task per job, driving an upstream
//! operation from submission to a terminal state under a poll budget.

mod poller;
mod registry;

pub use poller::{drive_to_terminal, JobState};
pub use registry::{JobRegistry, JobSlot, RegistryError};
