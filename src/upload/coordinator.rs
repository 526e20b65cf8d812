use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::progress::with_synthetic_progress;
use super::{UploadBatch, UploadError, UploadEvent, UploadState, UploadTask};
use crate::config::UploadSettings;
use crate::models::FileUpload;
use crate::storage::{StorageError, StorageGateway, StoredObjectReference};
use crate::types::OwnerId;

const EVENT_BUFFER: usize = 256;

struct Entry {
    task: UploadTask,
    worker: Option<AbortHandle>,
}

struct Inner {
    gateway: Arc<StorageGateway>,
    settings: UploadSettings,
    // Visible tasks in submission order.
    entries: Mutex<Vec<Entry>>,
    events: broadcast::Sender<UploadEvent>,
}

/// Runs every accepted file as an independent transfer and keeps the list
/// of tasks the client should display.
#[derive(Clone)]
pub struct UploadCoordinator {
    inner: Arc<Inner>,
}

impl UploadCoordinator {
    pub fn new(gateway: Arc<StorageGateway>, settings: UploadSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(Inner {
                gateway,
                settings,
                entries: Mutex::new(Vec::new()),
                events,
            }),
        }
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.inner.settings
    }

    /// Makes sure the bucket exists before the first batch arrives.
    pub async fn prepare_storage(&self) -> Result<(), UploadError> {
        self.inner.gateway.ensure_ready().await?;
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.inner.events.subscribe()
    }

    /// Accepts up to `max_files` files and starts one worker per file.
    /// Without an owner every file fails at once and nothing is kept.
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, owner: Option<OwnerId>, mut files: Vec<FileUpload>) -> UploadBatch {
        let session_id = Uuid::new_v4();
        let max_files = self.inner.settings.max_files;
        let dropped = files.len().saturating_sub(max_files);
        files.truncate(max_files);
        if dropped > 0 {
            debug!(session = %session_id, dropped, max_files, "Batch exceeds file limit, extra files ignored");
        }

        let Some(owner) = owner else {
            return reject_unauthenticated(session_id, files, dropped);
        };

        let mut tasks = Vec::with_capacity(files.len());
        for file in files {
            let task = UploadTask {
                id: Uuid::new_v4(),
                session_id,
                owner_id: Some(owner.clone()),
                file_name: file.filename.clone(),
                file_size_bytes: file.size_bytes(),
                progress_percent: 0,
                state: UploadState::Pending,
                error: None,
                object: None,
            };
            let id = task.id;

            self.inner.lock().push(Entry {
                task: task.clone(),
                worker: None,
            });
            self.inner.emit(UploadEvent::Queued { task: task.clone() });

            let handle = tokio::spawn(run_task(self.inner.clone(), id, owner.clone(), file));
            if let Some(entry) = self.inner.lock().iter_mut().find(|e| e.task.id == id) {
                entry.worker = Some(handle.abort_handle());
            }
            tasks.push(task);
        }

        info!(
            session = %session_id,
            owner = %owner,
            accepted = tasks.len(),
            "Upload batch accepted"
        );

        UploadBatch {
            session_id,
            tasks,
            dropped,
        }
    }

    /// Cancels an active task, or dismisses a finished one. Either way the
    /// task leaves the visible list. Active transfers are aborted.
    pub fn cancel(&self, task_id: Uuid) -> Result<UploadTask, UploadError> {
        let mut entry = {
            let mut entries = self.inner.lock();
            let index = entries
                .iter()
                .position(|e| e.task.id == task_id)
                .ok_or(UploadError::TaskNotFound(task_id))?;
            entries.remove(index)
        };

        if let Some(worker) = entry.worker.take() {
            worker.abort();
        }

        if entry.task.state.is_active() {
            entry.task.state = UploadState::Cancelled;
            info!(task = %task_id, file = %entry.task.file_name, "Upload cancelled");
            self.inner.emit(UploadEvent::Cancelled { task_id });
        }
        self.inner.emit(UploadEvent::Removed { task_id });
        Ok(entry.task)
    }

    /// Visible tasks belonging to `owner`, in submission order.
    pub fn tasks(&self, owner: Option<&OwnerId>) -> Vec<UploadTask> {
        self.inner
            .lock()
            .iter()
            .filter(|e| e.task.owner_id.as_ref() == owner)
            .map(|e| e.task.clone())
            .collect()
    }

    pub fn task(&self, task_id: Uuid) -> Option<UploadTask> {
        self.inner
            .lock()
            .iter()
            .find(|e| e.task.id == task_id)
            .map(|e| e.task.clone())
    }
}

/// Failed tasks for a batch that arrived without an identity. They are
/// returned to the caller only; no worker, no events, nothing retained.
fn reject_unauthenticated(session_id: Uuid, files: Vec<FileUpload>, dropped: usize) -> UploadBatch {
    let tasks: Vec<UploadTask> = files
        .into_iter()
        .map(|file| UploadTask {
            id: Uuid::new_v4(),
            session_id,
            owner_id: None,
            error: Some(failure_message(&file.filename, &StorageError::NotAuthenticated)),
            file_size_bytes: file.size_bytes(),
            file_name: file.filename,
            progress_percent: 0,
            state: UploadState::Failed,
            object: None,
        })
        .collect();

    warn!(session = %session_id, files = tasks.len(), "Upload batch rejected without identity");
    UploadBatch {
        session_id,
        tasks,
        dropped,
    }
}

fn failure_message(file_name: &str, err: &StorageError) -> String {
    format!("Failed to upload {}: {}", file_name, err)
}

async fn run_task(inner: Arc<Inner>, id: Uuid, owner: OwnerId, file: FileUpload) {
    if !inner.start(id) {
        return;
    }

    let tick = inner.settings.progress_tick;
    let result = with_synthetic_progress(inner.gateway.store(&file, &owner), tick, |percent| {
        inner.advance(id, percent)
    })
    .await;

    match result {
        Ok(object) => {
            if inner.complete(id, object) {
                tokio::time::sleep(inner.settings.completion_display_delay).await;
                inner.remove(id);
            }
        }
        Err(err) => {
            if inner.fail(id, &file.filename, err) {
                tokio::time::sleep(inner.settings.failed_retention).await;
                inner.remove(id);
            }
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: UploadEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Applies `f` to the task if it is still visible and active.
    fn update_active<F>(&self, id: Uuid, f: F) -> bool
    where
        F: FnOnce(&mut UploadTask),
    {
        let mut entries = self.lock();
        match entries.iter_mut().find(|e| e.task.id == id) {
            Some(entry) if entry.task.state.is_active() => {
                f(&mut entry.task);
                true
            }
            _ => false,
        }
    }

    fn start(&self, id: Uuid) -> bool {
        let started = self.update_active(id, |task| task.state = UploadState::InProgress);
        if started {
            self.emit(UploadEvent::Started { task_id: id });
        }
        started
    }

    fn advance(&self, id: Uuid, percent: u8) {
        let mut changed = false;
        self.update_active(id, |task| {
            if percent > task.progress_percent {
                task.progress_percent = percent;
                changed = true;
            }
        });
        if changed {
            self.emit(UploadEvent::Progress {
                task_id: id,
                progress_percent: percent,
            });
        }
    }

    fn complete(&self, id: Uuid, object: StoredObjectReference) -> bool {
        let done = self.update_active(id, |task| {
            task.state = UploadState::Completed;
            task.progress_percent = 100;
            task.object = Some(object.clone());
        });
        if done {
            info!(task = %id, path = %object.path, "Upload completed");
            self.emit(UploadEvent::Completed { task_id: id, object });
        }
        done
    }

    fn fail(&self, id: Uuid, file_name: &str, err: StorageError) -> bool {
        let message = failure_message(file_name, &err);
        let failed = self.update_active(id, |task| {
            task.state = UploadState::Failed;
            task.progress_percent = 0;
            task.error = Some(message.clone());
        });
        if failed {
            warn!(task = %id, file = %file_name, error = %err, "Upload failed");
            self.emit(UploadEvent::Failed {
                task_id: id,
                file_name: file_name.to_string(),
                error: message,
            });
        }
        failed
    }

    fn remove(&self, id: Uuid) {
        let removed = {
            let mut entries = self.lock();
            let before = entries.len();
            entries.retain(|e| e.task.id != id);
            entries.len() != before
        };
        if removed {
            debug!(task = %id, "Upload task removed from visible list");
            self.emit(UploadEvent::Removed { task_id: id });
        }
    }
}
