//! Task runners — the spawned futures that perform one task's work
//!
//! Runners never touch the task table. They report back to the coordinator
//! loop through an unbounded channel; the loop is the only writer of task
//! state. Sends are best-effort because the loop may already have shut down.

pub(crate) mod conversion;
pub(crate) mod download;

use std::path::PathBuf;

use crate::adapter::PlaylistEntry;
use crate::types::{Progress, TaskId};

/// Message from a runner to the coordinator loop
#[derive(Debug)]
pub(crate) enum RunnerEvent {
    /// Progress update for a running task
    Progress {
        /// Reporting task
        id: TaskId,
        /// New progress snapshot
        progress: Progress,
    },
    /// The video title became known; updates the task's display name
    Title {
        /// Reporting task
        id: TaskId,
        /// Title from metadata
        title: String,
    },
    /// A playlist fetch resolved its entries
    Children {
        /// The playlist-fetch task
        parent: TaskId,
        /// Entries to spawn download tasks for
        entries: Vec<PlaylistEntry>,
    },
    /// The runner finished; exactly one per spawned runner
    Terminal {
        /// Reporting task
        id: TaskId,
        /// How the run ended
        outcome: Outcome,
    },
}

/// How a runner's work ended
#[derive(Debug)]
pub(crate) enum Outcome {
    /// Work finished successfully
    Completed {
        /// Output file path, if the task produces one
        path: Option<PathBuf>,
        /// Human-readable summary
        message: String,
    },
    /// Work failed; the message preserves the adapter error
    Failed {
        /// Failure description
        error: String,
    },
    /// The cancellation token was observed
    Cancelled,
}
