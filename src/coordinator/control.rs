//! Task lifecycle control
//!
//! Pause and cancel share one mechanism: cancel the runner's token and mark
//! the task immediately so the UI gets instant feedback. The runner handle
//! stays bound until the runner's own terminal event arrives, which is the
//! single place the concurrency counter is released.

use tracing::info;

use crate::error::{Error, Result};
use crate::types::{Category, Event, Progress, Status, TaskId, TaskInfo, TaskResult};

use super::state::CoordinatorState;

impl CoordinatorState {
    /// Pauses an admitted task
    ///
    /// The task shows `Paused` immediately; once the runner observes the
    /// token and stops, the task converges to `Cancelled` and can be
    /// requeued with resume.
    pub(crate) fn pause_task(&mut self, id: TaskId) -> Result<()> {
        let task = self.tasks.get_mut(&id).ok_or(Error::NotFound(id))?;
        if !task.status.is_active() {
            return Err(Error::InvalidState {
                id,
                operation: "paused",
                state: task.status,
            });
        }
        if let Some(handle) = &task.runner {
            handle.cancel.cancel();
        }
        task.pause_requested = true;
        task.status = Status::Paused;
        info!(task_id = id.0, "task paused");
        Ok(())
    }

    /// Requeues a previously paused task
    ///
    /// Only valid once the runner has fully stopped (handle cleared) so a
    /// resumed task can never race its own old runner.
    pub(crate) fn resume_task(&mut self, id: TaskId) -> Result<()> {
        let (category, resumed) = {
            let task = self.tasks.get_mut(&id).ok_or(Error::NotFound(id))?;
            let resumable = task.pause_requested
                && task.runner.is_none()
                && matches!(task.status, Status::Paused | Status::Cancelled);
            if !resumable {
                return Err(Error::InvalidState {
                    id,
                    operation: "resumed",
                    state: task.status,
                });
            }
            task.status = Status::Queued;
            task.progress = Progress::Pending;
            task.result = None;
            task.pause_requested = false;
            task.started_at = None;
            (task.kind.category(), task.id)
        };
        info!(task_id = resumed.0, "task resumed");
        self.reset_batch_latch(category);
        self.emit(Event::TaskProgress {
            id,
            progress: Progress::Pending,
        });
        self.admit(category);
        Ok(())
    }

    /// Cancels a queued or admitted task
    ///
    /// The task is terminal immediately; for admitted tasks the runner's
    /// late terminal event is merged silently and releases the counter.
    pub(crate) fn cancel_task(&mut self, id: TaskId) -> Result<()> {
        let (category, had_runner) = {
            let task = self.tasks.get_mut(&id).ok_or(Error::NotFound(id))?;
            if task.status.is_terminal() {
                return Err(Error::InvalidState {
                    id,
                    operation: "cancelled",
                    state: task.status,
                });
            }
            if let Some(handle) = &task.runner {
                handle.cancel.cancel();
            }
            task.status = Status::Cancelled;
            task.result = Some(TaskResult::message("Cancelled."));
            task.pause_requested = false;
            (task.kind.category(), task.runner.is_some())
        };
        info!(task_id = id.0, "task cancelled");
        self.emit(Event::TaskTerminal {
            id,
            status: Status::Cancelled,
            result: TaskResult::message("Cancelled."),
        });
        if !had_runner {
            // never admitted (or already converged): no runner terminal will
            // follow, so the batch check has to happen here
            self.check_batch_completion(category);
        }
        Ok(())
    }

    /// Removes a terminal task from the table
    pub(crate) fn clear_task(&mut self, id: TaskId) -> Result<()> {
        let task = self.tasks.get(&id).ok_or(Error::NotFound(id))?;
        if !task.status.is_terminal() {
            return Err(Error::InvalidState {
                id,
                operation: "cleared",
                state: task.status,
            });
        }
        self.remove_task(id);
        Ok(())
    }

    /// Timer-driven clear; silently ignores tasks that were resumed,
    /// already cleared, or are somehow no longer terminal
    pub(crate) fn auto_clear_task(&mut self, id: TaskId) {
        if self
            .tasks
            .get(&id)
            .is_some_and(|t| t.status.is_terminal())
        {
            self.remove_task(id);
        }
    }

    /// Removes every terminal task, returning how many were cleared
    pub(crate) fn clear_finished(&mut self) -> usize {
        let terminal: Vec<TaskId> = self
            .order
            .iter()
            .copied()
            .filter(|id| {
                self.tasks
                    .get(id)
                    .is_some_and(|t| t.status.is_terminal())
            })
            .collect();
        for id in &terminal {
            self.remove_task(*id);
        }
        terminal.len()
    }

    fn remove_task(&mut self, id: TaskId) {
        self.tasks.remove(&id);
        self.order.retain(|other| *other != id);
        self.emit(Event::TaskCleared { id });
    }

    pub(crate) fn task_info(&self, id: TaskId) -> Option<TaskInfo> {
        self.tasks.get(&id).map(Self::to_info)
    }

    pub(crate) fn list_tasks(&self) -> Vec<TaskInfo> {
        self.order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .map(Self::to_info)
            .collect()
    }

    /// Applies a live concurrency-limit change
    ///
    /// Raising a limit admits immediately; lowering one never preempts
    /// running tasks, the surplus just drains as they finish.
    pub(crate) fn set_limit(&mut self, category: Category, limit: usize) {
        info!(?category, limit, "concurrency limit changed");
        match category {
            Category::Download => self.download_limit = limit,
            Category::Conversion => self.conversion_limit = limit,
        }
        self.admit(category);
    }
}
