//! The queue coordinator and its public handle
//!
//! [`MediaQueue`] is a cheap-to-clone handle. All state lives in a single
//! coordinator task (see [`dispatch`]); the handle validates input, mints
//! task ids, and exchanges messages with the loop:
//! - [`submit`] - Submission-time validation
//! - [`state`] - The task table and admission
//! - [`dispatch`] - The coordinator loop
//! - [`control`] - Pause/resume/cancel/clear handling
//! - [`events`] - Runner-event handling, fan-out, batch detection
//! - [`runner`] - The spawned per-task workers

mod control;
mod dispatch;
mod events;
mod runner;
mod state;
mod submit;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::info;

use crate::adapter::{Adapters, ConversionOptions};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{
    Category, ConversionKind, DownloadOptions, Event, QueueStats, TaskId, TaskInfo, TaskKind,
};

use state::{CoordinatorState, Task, TaskSpec};

/// Request sent from a handle to the coordinator loop
pub(crate) enum Command {
    Submit(Box<Task>),
    Pause(TaskId, oneshot::Sender<Result<()>>),
    Resume(TaskId, oneshot::Sender<Result<()>>),
    Cancel(TaskId, oneshot::Sender<Result<()>>),
    Clear(TaskId, oneshot::Sender<Result<()>>),
    /// Timer-driven clear; unlike [`Command::Clear`] it never fails
    AutoClear(TaskId),
    ClearFinished(oneshot::Sender<usize>),
    GetTask(TaskId, oneshot::Sender<Option<TaskInfo>>),
    ListTasks(oneshot::Sender<Vec<TaskInfo>>),
    Stats(oneshot::Sender<QueueStats>),
    SetLimit(Category, usize),
    Shutdown,
}

/// Handle to a running media queue
///
/// Clones share the same coordinator. Submissions are validated and
/// assigned an id synchronously; lifecycle operations round-trip through
/// the coordinator loop.
#[derive(Clone)]
pub struct MediaQueue {
    command_tx: mpsc::UnboundedSender<Command>,
    event_tx: broadcast::Sender<Event>,
    config: Arc<Config>,
    next_id: Arc<AtomicI64>,
    accepting_new: Arc<AtomicBool>,
    loop_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl MediaQueue {
    /// Creates a queue and spawns its coordinator loop
    ///
    /// Must be called within a tokio runtime.
    pub fn new(config: Config, adapters: Adapters) -> Self {
        // also covers configs built in code, not just loaded files
        let config = config.sanitized();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (runner_tx, runner_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(config.event_buffer);
        let next_id = Arc::new(AtomicI64::new(1));

        let state = CoordinatorState::new(
            config.clone(),
            adapters,
            event_tx.clone(),
            runner_tx,
            command_tx.clone(),
            next_id.clone(),
        );
        let loop_handle = tokio::spawn(dispatch::run(state, command_rx, runner_rx));
        info!(
            max_downloads = config.max_concurrent_downloads,
            max_conversions = config.max_concurrent_conversions,
            "media queue started"
        );

        Self {
            command_tx,
            event_tx,
            config: Arc::new(config),
            next_id,
            accepting_new: Arc::new(AtomicBool::new(true)),
            loop_handle: Arc::new(Mutex::new(Some(loop_handle))),
        }
    }

    /// Subscribes to lifecycle events
    ///
    /// Events emitted before the subscription are not replayed; subscribe
    /// before submitting to observe a task's full lifecycle.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The configuration the queue was started with
    pub fn get_config(&self) -> Arc<Config> {
        self.config.clone()
    }

    /// Queues a single-video download
    ///
    /// Validation is synchronous; an accepted submission is queued and will
    /// start as soon as a download slot is free.
    pub fn add_download(&self, url: &str, options: DownloadOptions) -> Result<TaskId> {
        self.ensure_accepting()?;
        let url = submit::validate_video_url(url)?;
        let output_dir = options
            .output_dir
            .unwrap_or_else(|| self.config.download_dir.clone());
        let id = self.mint_id();
        let task = Task::new(
            id,
            TaskKind::SingleVideo,
            url.to_string(),
            TaskSpec::Download {
                url,
                output_dir,
                quality: options.quality,
                container: options.container,
            },
        );
        self.send(Command::Submit(Box::new(task)))?;
        Ok(id)
    }

    /// Queues a playlist fetch
    ///
    /// The fetch itself downloads nothing; on success it spawns one download
    /// task per playlist entry, all inheriting `options`.
    pub fn add_playlist(&self, url: &str, options: DownloadOptions) -> Result<TaskId> {
        self.ensure_accepting()?;
        let url = submit::validate_playlist_url(url)?;
        let output_dir = options
            .output_dir
            .unwrap_or_else(|| self.config.download_dir.clone());
        let id = self.mint_id();
        let task = Task::new(
            id,
            TaskKind::PlaylistFetch,
            url.to_string(),
            TaskSpec::PlaylistFetch {
                url,
                output_dir,
                quality: options.quality,
                container: options.container,
            },
        );
        self.send(Command::Submit(Box::new(task)))?;
        Ok(id)
    }

    /// Queues a file conversion
    ///
    /// The output lands in the configured conversion directory under the
    /// input's file stem with the target extension.
    pub fn add_conversion(
        &self,
        input: impl Into<PathBuf>,
        kind: ConversionKind,
        target_ext: &str,
        options: Option<ConversionOptions>,
    ) -> Result<TaskId> {
        self.ensure_accepting()?;
        let input = input.into();
        submit::validate_conversion(&input, kind, target_ext)?;

        let target_ext = target_ext.to_ascii_lowercase();
        let stem = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("converted");
        let output = self
            .config
            .conversion_dir
            .join(format!("{stem}.{target_ext}"));
        let name = input
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("conversion")
            .to_string();

        let id = self.mint_id();
        let task = Task::new(
            id,
            TaskKind::from(kind),
            name,
            TaskSpec::Conversion {
                input,
                output,
                kind,
                target_ext,
                options: options.unwrap_or_default(),
            },
        );
        self.send(Command::Submit(Box::new(task)))?;
        Ok(id)
    }

    /// Pauses a starting/running/retrying task
    pub async fn pause(&self, id: TaskId) -> Result<()> {
        self.request(|reply| Command::Pause(id, reply)).await?
    }

    /// Requeues a paused task from the beginning
    pub async fn resume(&self, id: TaskId) -> Result<()> {
        self.request(|reply| Command::Resume(id, reply)).await?
    }

    /// Cancels a queued or admitted task
    pub async fn cancel(&self, id: TaskId) -> Result<()> {
        self.request(|reply| Command::Cancel(id, reply)).await?
    }

    /// Removes a terminal task from the table
    pub async fn clear(&self, id: TaskId) -> Result<()> {
        self.request(|reply| Command::Clear(id, reply)).await?
    }

    /// Removes all terminal tasks, returning how many were cleared
    pub async fn clear_finished(&self) -> Result<usize> {
        self.request(Command::ClearFinished).await
    }

    /// Snapshot of one task
    pub async fn get_task(&self, id: TaskId) -> Result<Option<TaskInfo>> {
        self.request(|reply| Command::GetTask(id, reply)).await
    }

    /// Snapshot of every task, in submission order
    pub async fn list_tasks(&self) -> Result<Vec<TaskInfo>> {
        self.request(Command::ListTasks).await
    }

    /// Aggregate queue statistics
    pub async fn stats(&self) -> Result<QueueStats> {
        self.request(Command::Stats).await
    }

    /// Changes a category's concurrency limit at runtime
    ///
    /// Raising the limit admits queued tasks immediately; lowering it never
    /// interrupts tasks already running.
    pub fn set_concurrency_limit(&self, category: Category, limit: usize) -> Result<()> {
        self.send(Command::SetLimit(category, limit))
    }

    /// Shuts the queue down
    ///
    /// Stops accepting submissions, cancels every bound runner, emits
    /// [`Event::Shutdown`] and waits for the coordinator loop to finish.
    pub async fn shutdown(&self) -> Result<()> {
        self.accepting_new.store(false, Ordering::SeqCst);
        // an Err here means the loop already stopped
        let _ = self.command_tx.send(Command::Shutdown);

        let handle = {
            let mut guard = self
                .loop_handle
                .lock()
                .map_err(|_| Error::Config("coordinator handle lock poisoned".to_string()))?;
            guard.take()
        };
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "coordinator loop did not stop cleanly");
            }
        }
        Ok(())
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.accepting_new.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }

    fn mint_id(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn send(&self, command: Command) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| Error::ShuttingDown)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(make(reply_tx))?;
        reply_rx.await.map_err(|_| Error::ShuttingDown)
    }
}
