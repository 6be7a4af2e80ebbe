//! Core types for media-queue

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::format::QualityLabel;

/// Unique identifier for a task
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaskId(pub i64);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<TaskId> for i64 {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Work category — each category has its own queue and concurrency limit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Network fetch work (single videos, playlist expansion)
    Download,
    /// Local transformation work (video/audio/image/document conversion)
    Conversion,
}

/// Conversion subtype, selected at submission time
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionKind {
    /// Video container/codec conversion (progress is best-effort)
    Video,
    /// Audio transcoding (progress is best-effort)
    Audio,
    /// Image re-encoding (no granular progress)
    Image,
    /// Document conversion to PDF (no granular progress)
    Document,
}

/// The concrete kind of a task, spanning both categories
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Download one video
    SingleVideo,
    /// Enumerate a playlist and spawn one download task per entry
    PlaylistFetch,
    /// Video conversion
    VideoConversion,
    /// Audio conversion
    AudioConversion,
    /// Image conversion
    ImageConversion,
    /// Document conversion
    DocumentConversion,
}

impl TaskKind {
    /// The category this kind is scheduled under
    pub fn category(&self) -> Category {
        match self {
            TaskKind::SingleVideo | TaskKind::PlaylistFetch => Category::Download,
            TaskKind::VideoConversion
            | TaskKind::AudioConversion
            | TaskKind::ImageConversion
            | TaskKind::DocumentConversion => Category::Conversion,
        }
    }
}

impl From<ConversionKind> for TaskKind {
    fn from(kind: ConversionKind) -> Self {
        match kind {
            ConversionKind::Video => TaskKind::VideoConversion,
            ConversionKind::Audio => TaskKind::AudioConversion,
            ConversionKind::Image => TaskKind::ImageConversion,
            ConversionKind::Document => TaskKind::DocumentConversion,
        }
    }
}

/// Task status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting for admission
    Queued,
    /// Admitted, runner bound but no progress yet
    Starting,
    /// Runner is actively working
    Running,
    /// Runner is between retry attempts
    Retrying,
    /// Pause requested by the user; converges to Cancelled once the runner stops
    Paused,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Discarded by the user
    Cancelled,
}

impl Status {
    /// True for Completed, Failed and Cancelled — no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed | Status::Cancelled)
    }

    /// True while a runner is (or may be) bound to the task
    pub fn is_active(&self) -> bool {
        matches!(self, Status::Starting | Status::Running | Status::Retrying)
    }
}

/// Progress snapshot for a task
///
/// Downloads report percentage/speed/ETA. Image and document conversions only
/// report indeterminate progress because the underlying adapters provide no
/// granular feedback. Video/audio conversion percentage is best-effort.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Progress {
    /// Not started yet
    Pending,
    /// Runner bound, work about to begin
    Starting,
    /// Working, but no percentage is available
    Indeterminate {
        /// Human-readable description of the current step
        message: String,
    },
    /// Download in flight
    Downloading {
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
        /// Current speed in bytes per second, if known
        speed_bps: Option<u64>,
        /// Estimated seconds to completion, if known
        eta_seconds: Option<u64>,
    },
    /// A retry attempt is about to begin
    Retrying {
        /// 1-based attempt number
        attempt: u32,
        /// Total allowed attempts (max_retries + 1)
        total_attempts: u32,
    },
    /// Video/audio conversion in flight
    Converting {
        /// Best-effort percentage, if the transcoder reports one
        percent: Option<f32>,
    },
}

/// Terminal payload for a task — an output path on success, or an error message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Output file path (present on success)
    pub path: Option<PathBuf>,
    /// Human-readable summary; for failures, the preserved adapter error
    pub message: String,
}

impl TaskResult {
    /// Successful result with an optional output path
    pub fn success(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }

    /// Failed or cancelled result carrying only a message
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            path: None,
            message: message.into(),
        }
    }
}

/// Event emitted during the task lifecycle
///
/// Consumers subscribe via [`crate::MediaQueue::subscribe`] and receive every
/// event on a broadcast channel. Per-task ordering is progress events followed
/// by exactly one terminal event; no ordering is guaranteed across tasks.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Task added to the queue
    TaskCreated {
        /// Task ID
        id: TaskId,
        /// Scheduling category
        category: Category,
        /// Display name (URL or file name until metadata arrives)
        name: String,
    },

    /// Progress update for a task
    TaskProgress {
        /// Task ID
        id: TaskId,
        /// Current progress snapshot
        progress: Progress,
    },

    /// Task reached a terminal state
    TaskTerminal {
        /// Task ID
        id: TaskId,
        /// Terminal status (Completed, Failed or Cancelled)
        status: Status,
        /// Output path or error message
        result: TaskResult,
    },

    /// A playlist fetch produced child download tasks
    ChildTasksSpawned {
        /// The playlist-fetch task that produced the children
        parent: TaskId,
        /// IDs of the newly queued download tasks, in playlist order
        children: Vec<TaskId>,
    },

    /// Every task in a category has drained to a terminal state
    BatchComplete {
        /// The drained category
        category: Category,
    },

    /// Task removed from the table (explicit clear or auto-clear)
    TaskCleared {
        /// Task ID
        id: TaskId,
    },

    /// Graceful shutdown initiated
    Shutdown,
}

/// Options for submitting a download
#[derive(Clone, Debug)]
pub struct DownloadOptions {
    /// Requested quality (default: best available)
    pub quality: QualityLabel,
    /// Preferred container format (default: "mp4")
    pub container: String,
    /// Override the configured download directory
    pub output_dir: Option<PathBuf>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            quality: QualityLabel::Best,
            container: "mp4".to_string(),
            output_dir: None,
        }
    }
}

/// Snapshot of one task, as returned by queries
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Unique task identifier
    pub id: TaskId,

    /// Scheduling category
    pub category: Category,

    /// Concrete kind
    pub kind: TaskKind,

    /// Display name (video title once metadata is known)
    pub name: String,

    /// Current status
    pub status: Status,

    /// Current progress snapshot
    pub progress: Progress,

    /// Terminal payload (None while non-terminal)
    pub result: Option<TaskResult>,

    /// When the task was submitted
    pub created_at: DateTime<Utc>,

    /// When the task was first admitted (None if never started)
    pub started_at: Option<DateTime<Utc>>,
}

/// Queue statistics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueStats {
    /// Total number of tasks in the table
    pub total: usize,

    /// Number of queued tasks (waiting for admission)
    pub queued: usize,

    /// Download tasks currently bound to a runner
    pub active_downloads: usize,

    /// Conversion tasks currently bound to a runner
    pub active_conversions: usize,

    /// Number of paused tasks
    pub paused: usize,

    /// Number of completed tasks
    pub completed: usize,

    /// Number of failed tasks
    pub failed: usize,

    /// Number of cancelled tasks
    pub cancelled: usize,

    /// Current download concurrency limit
    pub download_limit: usize,

    /// Current conversion concurrency limit
    pub conversion_limit: usize,
}
