//! Upload Coordinator
//!
//! Drives one single-attempt transfer per accepted file. Each file gets an
//! `UploadTask` whose lifecycle is
//!
//! ```text
//! Pending -> InProgress -> Completed | Failed
//! Pending | InProgress -> Cancelled
//! ```
//!
//! Progress shown to the client is synthetic (time based) until the
//! transfer finishes; only a successful transfer reaches 100.

pub mod coordinator;
pub mod progress;

pub use coordinator::UploadCoordinator;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::storage::{StorageError, StoredObjectReference};
use crate::types::OwnerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl UploadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadState::Completed | UploadState::Failed | UploadState::Cancelled)
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

/// Client-side record of one file's transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadTask {
    pub id: Uuid,
    pub session_id: Uuid,
    pub owner_id: Option<OwnerId>,
    pub file_name: String,
    pub file_size_bytes: u64,
    pub progress_percent: u8,
    pub state: UploadState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<StoredObjectReference>,
}

/// Result of accepting a batch of files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadBatch {
    pub session_id: Uuid,
    pub tasks: Vec<UploadTask>,
    /// Files beyond the batch cap, ignored without error.
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadEvent {
    Queued { task: UploadTask },
    Started { task_id: Uuid },
    Progress { task_id: Uuid, progress_percent: u8 },
    Completed { task_id: Uuid, object: StoredObjectReference },
    Failed { task_id: Uuid, file_name: String, error: String },
    Cancelled { task_id: Uuid },
    Removed { task_id: Uuid },
}

impl UploadEvent {
    pub fn task_id(&self) -> Uuid {
        match self {
            UploadEvent::Queued { task } => task.id,
            UploadEvent::Started { task_id }
            | UploadEvent::Progress { task_id, .. }
            | UploadEvent::Completed { task_id, .. }
            | UploadEvent::Failed { task_id, .. }
            | UploadEvent::Cancelled { task_id }
            | UploadEvent::Removed { task_id } => *task_id,
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Upload task not found: {0}")]
    TaskNotFound(Uuid),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
