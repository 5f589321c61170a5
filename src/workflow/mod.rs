//! Orchestration of the bot's jobs.
//!
//! - `issue`: turn a call-request issue into a forum topic and a meeting
//! - `transcript`: post a meeting transcript to the forum
//! - `recordings`: poll finished meetings and publish their recordings
//!
//! Workflows only talk to collaborators through the traits in
//! [`crate::clients`], so tests drive them with in-memory fakes.

pub mod issue;
pub mod recordings;
pub mod transcript;

pub use issue::{HandleIssueOutcome, IssueWorkflow, MeetingOutcome};
pub use recordings::{is_meeting_eligible, PollSummary, RecordingWorkflow, UploadOutcome};
pub use transcript::TranscriptOutcome;

use thiserror::Error;

use crate::clients::ClientError;
use crate::storage::StorageError;

/// Errors that can occur while running a workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("No transcript file found for meeting {0}")]
    TranscriptNotFound(String),

    #[error("No video recording found for meeting {0}")]
    RecordingNotFound(String),

    #[error("No video host configured")]
    NoVideoHost,
}

#[cfg(test)]
pub(crate) mod fakes;
