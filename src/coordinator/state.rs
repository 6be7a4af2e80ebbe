//! Coordinator state — the single-writer task table
//!
//! Every mutation of tasks, counters and latches happens on the coordinator
//! loop. Runners and handles only ever send messages; nothing here is behind
//! a lock.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use url::Url;

use crate::adapter::{Adapters, ConversionOptions};
use crate::config::Config;
use crate::format::QualityLabel;
use crate::types::{
    Category, ConversionKind, Event, Progress, QueueStats, Status, TaskId, TaskInfo, TaskKind,
    TaskResult,
};

use super::runner::{self, RunnerEvent};
use super::Command;

/// What a task's runner will actually do, fixed at submission time
#[derive(Clone, Debug)]
pub(crate) enum TaskSpec {
    /// Download one video
    Download {
        /// Source URL
        url: Url,
        /// Directory the file lands in
        output_dir: PathBuf,
        /// Requested quality
        quality: QualityLabel,
        /// Preferred container
        container: String,
    },
    /// Resolve a playlist and fan out child downloads
    PlaylistFetch {
        /// Playlist URL
        url: Url,
        /// Base directory; children download into a playlist subdirectory
        output_dir: PathBuf,
        /// Quality inherited by child tasks
        quality: QualityLabel,
        /// Container inherited by child tasks
        container: String,
    },
    /// Convert one local file
    Conversion {
        /// Input file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Which adapter handles it
        kind: ConversionKind,
        /// Target extension
        target_ext: String,
        /// Encoder settings (video/audio only)
        options: ConversionOptions,
    },
}

/// Handle to a spawned runner; present exactly while the runner is bound
#[derive(Debug)]
pub(crate) struct RunnerHandle {
    /// Cancels the runner's work
    pub(crate) cancel: CancellationToken,
}

/// One entry of the task table
#[derive(Debug)]
pub(crate) struct Task {
    pub(crate) id: TaskId,
    pub(crate) kind: TaskKind,
    pub(crate) name: String,
    pub(crate) spec: TaskSpec,
    pub(crate) status: Status,
    pub(crate) progress: Progress,
    pub(crate) result: Option<TaskResult>,
    /// Some while a runner is bound; cleared exactly once, with the counter
    pub(crate) runner: Option<RunnerHandle>,
    /// Pause intent; distinguishes pause-then-resume from plain cancel
    pub(crate) pause_requested: bool,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) started_at: Option<DateTime<Utc>>,
}

impl Task {
    pub(crate) fn new(id: TaskId, kind: TaskKind, name: String, spec: TaskSpec) -> Self {
        Self {
            id,
            kind,
            name,
            spec,
            status: Status::Queued,
            progress: Progress::Pending,
            result: None,
            runner: None,
            pause_requested: false,
            created_at: Utc::now(),
            started_at: None,
        }
    }
}

/// State owned by the coordinator loop
pub(crate) struct CoordinatorState {
    pub(crate) config: Config,
    pub(crate) adapters: Adapters,
    pub(crate) tasks: HashMap<TaskId, Task>,
    /// Insertion order; admission scans this for FIFO fairness
    pub(crate) order: Vec<TaskId>,
    pub(crate) active_downloads: usize,
    pub(crate) active_conversions: usize,
    pub(crate) download_limit: usize,
    pub(crate) conversion_limit: usize,
    /// Per-category batch-completion latches
    pub(crate) batch_notified_downloads: bool,
    pub(crate) batch_notified_conversions: bool,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) runner_tx: mpsc::UnboundedSender<RunnerEvent>,
    /// For timer-driven commands (auto-clear)
    pub(crate) command_tx: mpsc::UnboundedSender<Command>,
    /// Shared with the handle, which mints submission ids; the loop mints
    /// child-task ids from the same sequence
    pub(crate) next_id: Arc<AtomicI64>,
}

impl CoordinatorState {
    pub(crate) fn new(
        config: Config,
        adapters: Adapters,
        event_tx: broadcast::Sender<Event>,
        runner_tx: mpsc::UnboundedSender<RunnerEvent>,
        command_tx: mpsc::UnboundedSender<Command>,
        next_id: Arc<AtomicI64>,
    ) -> Self {
        Self {
            download_limit: config.max_concurrent_downloads,
            conversion_limit: config.max_concurrent_conversions,
            config,
            adapters,
            tasks: HashMap::new(),
            order: Vec::new(),
            active_downloads: 0,
            active_conversions: 0,
            batch_notified_downloads: false,
            batch_notified_conversions: false,
            event_tx,
            runner_tx,
            command_tx,
            next_id,
        }
    }

    /// Broadcasts an event; a send error only means nobody is subscribed
    pub(crate) fn emit(&self, event: Event) {
        let _ = self.event_tx.send(event);
    }

    pub(crate) fn mint_id(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn active(&self, category: Category) -> usize {
        match category {
            Category::Download => self.active_downloads,
            Category::Conversion => self.active_conversions,
        }
    }

    pub(crate) fn limit(&self, category: Category) -> usize {
        match category {
            Category::Download => self.download_limit,
            Category::Conversion => self.conversion_limit,
        }
    }

    pub(crate) fn increment_active(&mut self, category: Category) {
        match category {
            Category::Download => self.active_downloads += 1,
            Category::Conversion => self.active_conversions += 1,
        }
    }

    pub(crate) fn decrement_active(&mut self, category: Category) {
        let counter = match category {
            Category::Download => &mut self.active_downloads,
            Category::Conversion => &mut self.active_conversions,
        };
        match counter.checked_sub(1) {
            Some(n) => *counter = n,
            // can't happen while runner handles gate the decrement
            None => error!(?category, "active counter underflow"),
        }
    }

    /// Re-arms the batch latch; called whenever a task (re)enters Queued
    pub(crate) fn reset_batch_latch(&mut self, category: Category) {
        match category {
            Category::Download => self.batch_notified_downloads = false,
            Category::Conversion => self.batch_notified_conversions = false,
        }
    }

    /// Adds a task to the table and announces it
    pub(crate) fn insert_task(&mut self, task: Task) {
        let id = task.id;
        let category = task.kind.category();
        self.emit(Event::TaskCreated {
            id,
            category,
            name: task.name.clone(),
        });
        self.order.push(id);
        self.tasks.insert(id, task);
        self.reset_batch_latch(category);
    }

    /// Promotes queued tasks of a category until the limit is reached
    ///
    /// FIFO over insertion order. Safe to call any time; does nothing when
    /// there is no capacity or nothing queued.
    pub(crate) fn admit(&mut self, category: Category) {
        while self.active(category) < self.limit(category) {
            let next = self.order.iter().copied().find(|id| {
                self.tasks
                    .get(id)
                    .is_some_and(|t| t.status == Status::Queued && t.kind.category() == category)
            });
            let Some(id) = next else { return };

            let token = CancellationToken::new();
            let spec = match self.tasks.get_mut(&id) {
                Some(task) => {
                    task.status = Status::Starting;
                    task.progress = Progress::Starting;
                    task.started_at = Some(Utc::now());
                    task.runner = Some(RunnerHandle {
                        cancel: token.clone(),
                    });
                    task.spec.clone()
                }
                None => continue,
            };
            self.increment_active(category);
            debug!(task_id = id.0, ?category, active = self.active(category), "task admitted");
            self.spawn_runner(id, spec, token);
        }
    }

    /// Spawns the runner for an admitted task
    ///
    /// The runner future is wrapped in `catch_unwind` so a panicking adapter
    /// fails the one task instead of wedging its concurrency slot.
    fn spawn_runner(&self, id: TaskId, spec: TaskSpec, cancel: CancellationToken) {
        let events = self.runner_tx.clone();
        let fut: BoxFuture<'static, ()> = match spec {
            TaskSpec::Download {
                url,
                output_dir,
                quality,
                container,
            } => Box::pin(runner::download::run_download(
                runner::download::DownloadJob {
                    id,
                    url,
                    output_dir,
                    quality,
                    container,
                    max_retries: self.config.max_retries,
                },
                self.adapters.fetcher.clone(),
                cancel,
                events.clone(),
            )),
            TaskSpec::PlaylistFetch { url, .. } => Box::pin(runner::download::run_playlist_fetch(
                id,
                url,
                self.adapters.fetcher.clone(),
                cancel,
                events.clone(),
            )),
            TaskSpec::Conversion {
                input,
                output,
                kind,
                target_ext,
                options,
            } => Box::pin(runner::conversion::run_conversion(
                runner::conversion::ConversionJob {
                    id,
                    input,
                    output,
                    kind,
                    target_ext,
                    options,
                },
                self.adapters.clone(),
                cancel,
                events.clone(),
            )),
        };

        tokio::spawn(async move {
            if std::panic::AssertUnwindSafe(fut).catch_unwind().await.is_err() {
                error!(task_id = id.0, "task runner panicked");
                let _ = events.send(RunnerEvent::Terminal {
                    id,
                    outcome: runner::Outcome::Failed {
                        error: "internal error: task runner panicked".to_string(),
                    },
                });
            }
        });
    }

    /// Cancels every bound runner; used during shutdown
    pub(crate) fn cancel_all_runners(&self) {
        for task in self.tasks.values() {
            if let Some(handle) = &task.runner {
                handle.cancel.cancel();
            }
        }
    }

    pub(crate) fn to_info(task: &Task) -> TaskInfo {
        TaskInfo {
            id: task.id,
            category: task.kind.category(),
            kind: task.kind,
            name: task.name.clone(),
            status: task.status,
            progress: task.progress.clone(),
            result: task.result.clone(),
            created_at: task.created_at,
            started_at: task.started_at,
        }
    }

    pub(crate) fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total: self.tasks.len(),
            queued: 0,
            active_downloads: self.active_downloads,
            active_conversions: self.active_conversions,
            paused: 0,
            completed: 0,
            failed: 0,
            cancelled: 0,
            download_limit: self.download_limit,
            conversion_limit: self.conversion_limit,
        };
        for task in self.tasks.values() {
            match task.status {
                Status::Queued => stats.queued += 1,
                Status::Paused => stats.paused += 1,
                Status::Completed => stats.completed += 1,
                Status::Failed => stats.failed += 1,
                Status::Cancelled => stats.cancelled += 1,
                Status::Starting | Status::Running | Status::Retrying => {}
            }
        }
        stats
    }
}
