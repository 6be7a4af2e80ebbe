//! Runner-event handling
//!
//! Terminal events are the only place the active counters are decremented,
//! keyed on the still-bound runner handle so pause/cancel races can never
//! decrement twice. Everything else here is bookkeeping: progress mapping,
//! playlist fan-out, batch-completion detection and auto-clear timers.

use tracing::{debug, info, warn};

use crate::adapter::PlaylistEntry;
use crate::types::{Category, Event, Progress, Status, TaskId, TaskKind, TaskResult};
use crate::util::sanitize_title;

use super::runner::{Outcome, RunnerEvent};
use super::state::{CoordinatorState, Task, TaskSpec};
use super::Command;

impl CoordinatorState {
    /// Applies one message from a runner to the task table
    pub(crate) fn handle_runner_event(&mut self, event: RunnerEvent) {
        match event {
            RunnerEvent::Progress { id, progress } => self.handle_progress(id, progress),
            RunnerEvent::Title { id, title } => {
                if let Some(task) = self.tasks.get_mut(&id) {
                    if !task.status.is_terminal() {
                        task.name = title;
                    }
                }
            }
            RunnerEvent::Children { parent, entries } => self.handle_children(parent, entries),
            RunnerEvent::Terminal { id, outcome } => self.handle_terminal(id, outcome),
        }
    }

    fn handle_progress(&mut self, id: TaskId, progress: Progress) {
        let Some(task) = self.tasks.get_mut(&id) else {
            return;
        };
        // late reports from a runner that lost a pause/cancel race are stale
        if task.status.is_terminal() || task.status == Status::Paused {
            return;
        }
        task.status = match progress {
            Progress::Starting => Status::Starting,
            Progress::Retrying { .. } => Status::Retrying,
            Progress::Pending
            | Progress::Indeterminate { .. }
            | Progress::Downloading { .. }
            | Progress::Converting { .. } => Status::Running,
        };
        task.progress = progress.clone();
        self.emit(Event::TaskProgress { id, progress });
    }

    fn handle_children(&mut self, parent: TaskId, entries: Vec<PlaylistEntry>) {
        let Some(parent_task) = self.tasks.get(&parent) else {
            return;
        };
        // a cancelled or paused playlist fetch spawns nothing
        if parent_task.status.is_terminal() || parent_task.status == Status::Paused {
            debug!(task_id = parent.0, "dropping children of inactive playlist fetch");
            return;
        }
        let TaskSpec::PlaylistFetch {
            output_dir,
            quality,
            container,
            ..
        } = parent_task.spec.clone()
        else {
            warn!(task_id = parent.0, "children reported for a non-playlist task");
            return;
        };

        let mut children = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = self.mint_id();
            let child_dir = output_dir.join(sanitize_title(&entry.playlist_title));
            let task = Task::new(
                id,
                TaskKind::SingleVideo,
                entry.title.clone(),
                TaskSpec::Download {
                    url: entry.url,
                    output_dir: child_dir,
                    quality: quality.clone(),
                    container: container.clone(),
                },
            );
            self.insert_task(task);
            children.push(id);
        }
        info!(
            task_id = parent.0,
            count = children.len(),
            "spawned playlist child tasks"
        );
        self.emit(Event::ChildTasksSpawned { parent, children });
        self.admit(Category::Download);
    }

    fn handle_terminal(&mut self, id: TaskId, outcome: Outcome) {
        let Some(task) = self.tasks.get_mut(&id) else {
            // terminal from a runner whose task was force-cleared
            debug!(task_id = id.0, "terminal event for unknown task");
            return;
        };
        let category = task.kind.category();
        let had_runner = task.runner.take().is_some();

        let announce = if task.status.is_terminal() {
            // the user's cancel already decided this task; merge silently
            None
        } else if task.pause_requested {
            // pause converges to Cancelled once the runner actually stops;
            // the intent flag stays set so resume() can tell this apart
            let result = TaskResult::message("Paused by user.");
            task.status = Status::Cancelled;
            task.result = Some(result.clone());
            Some((Status::Cancelled, result))
        } else {
            let (status, result) = match outcome {
                Outcome::Completed { path, message } => {
                    (Status::Completed, TaskResult::success(path, message))
                }
                Outcome::Failed { error } => (Status::Failed, TaskResult::message(error)),
                Outcome::Cancelled => (Status::Cancelled, TaskResult::message("Cancelled.")),
            };
            task.status = status;
            task.result = Some(result.clone());
            Some((status, result))
        };
        let final_status = task.status;

        if had_runner {
            self.decrement_active(category);
        }
        if let Some((status, result)) = announce {
            self.emit(Event::TaskTerminal { id, status, result });
        }
        if final_status == Status::Completed && self.config.auto_clear_completed {
            self.schedule_auto_clear(id);
        }
        self.check_batch_completion(category);
        self.admit(category);
    }

    /// Fires `BatchComplete` once per drain of a category
    pub(crate) fn check_batch_completion(&mut self, category: Category) {
        let notified = match category {
            Category::Download => self.batch_notified_downloads,
            Category::Conversion => self.batch_notified_conversions,
        };
        if notified || self.active(category) > 0 {
            return;
        }

        let mut any_terminal = false;
        for task in self.tasks.values() {
            if task.kind.category() != category {
                continue;
            }
            match task.status {
                Status::Queued | Status::Starting | Status::Running | Status::Retrying => return,
                Status::Completed | Status::Failed | Status::Cancelled => any_terminal = true,
                Status::Paused => {}
            }
        }
        if !any_terminal {
            return;
        }

        info!(?category, "all tasks in category finished");
        match category {
            Category::Download => self.batch_notified_downloads = true,
            Category::Conversion => self.batch_notified_conversions = true,
        }
        self.emit(Event::BatchComplete { category });
    }

    fn schedule_auto_clear(&self, id: TaskId) {
        let tx = self.command_tx.clone();
        let delay = self.config.auto_clear_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Command::AutoClear(id));
        });
    }
}
