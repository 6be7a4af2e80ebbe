//! Download and playlist-fetch runners
//!
//! The retry policy lives here: the fetcher performs one attempt per call,
//! and this runner drives the attempt loop. Attempt 0 honors the user's
//! quality and container choice; later attempts fall back to a broadly
//! compatible mp4 selection under a distinct filename so partial files from
//! the failed attempt are never overwritten.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::adapter::{DownloadAttempt, DownloadProgress, VideoFetcher};
use crate::format::{self, QualityLabel};
use crate::types::{Progress, TaskId};
use crate::util::sanitize_title;

use super::{Outcome, RunnerEvent};

/// Inputs for one download runner
pub(crate) struct DownloadJob {
    pub(crate) id: TaskId,
    pub(crate) url: Url,
    pub(crate) output_dir: PathBuf,
    pub(crate) quality: QualityLabel,
    pub(crate) container: String,
    pub(crate) max_retries: u32,
}

/// Downloads a single video, retrying with fallback options on failure
pub(crate) async fn run_download(
    job: DownloadJob,
    fetcher: Arc<dyn VideoFetcher>,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<RunnerEvent>,
) {
    let id = job.id;
    if cancel.is_cancelled() {
        let _ = events.send(RunnerEvent::Terminal {
            id,
            outcome: Outcome::Cancelled,
        });
        return;
    }

    let _ = events.send(RunnerEvent::Progress {
        id,
        progress: Progress::Starting,
    });

    // Metadata failures are not retried: if the source can't even describe
    // the video, download attempts would fail the same way.
    let metadata = match fetcher.fetch_metadata(&job.url).await {
        Ok(m) => m,
        Err(e) => {
            let outcome = if cancel.is_cancelled() {
                Outcome::Cancelled
            } else {
                warn!(task_id = id.0, url = %job.url, error = %e, "metadata fetch failed");
                Outcome::Failed {
                    error: format!("Failed to fetch video info for {}: {e}", job.url),
                }
            };
            let _ = events.send(RunnerEvent::Terminal { id, outcome });
            return;
        }
    };
    if cancel.is_cancelled() {
        let _ = events.send(RunnerEvent::Terminal {
            id,
            outcome: Outcome::Cancelled,
        });
        return;
    }

    let safe_title = sanitize_title(&metadata.title);
    let _ = events.send(RunnerEvent::Title {
        id,
        title: metadata.title.clone(),
    });

    if let Err(e) = tokio::fs::create_dir_all(&job.output_dir).await {
        let _ = events.send(RunnerEvent::Terminal {
            id,
            outcome: Outcome::Failed {
                error: format!(
                    "Failed to create output directory {}: {e}",
                    job.output_dir.display()
                ),
            },
        });
        return;
    }

    let total_attempts = job.max_retries + 1;
    let mut last_error = String::new();

    for attempt_num in 0..total_attempts {
        if cancel.is_cancelled() {
            let _ = events.send(RunnerEvent::Terminal {
                id,
                outcome: Outcome::Cancelled,
            });
            return;
        }

        let attempt = if attempt_num == 0 {
            info!(
                task_id = id.0,
                url = %job.url,
                quality = %job.quality,
                container = %job.container,
                "starting download"
            );
            DownloadAttempt {
                url: job.url.clone(),
                output_template: job.output_dir.join(format!("{safe_title}.%(ext)s")),
                selection: format::initial_selection(&job.quality, &job.container),
                attempt: attempt_num,
            }
        } else {
            warn!(
                task_id = id.0,
                attempt = attempt_num + 1,
                total = total_attempts,
                "previous attempt failed, retrying with fallback options"
            );
            let _ = events.send(RunnerEvent::Progress {
                id,
                progress: Progress::Retrying {
                    attempt: attempt_num + 1,
                    total_attempts,
                },
            });
            DownloadAttempt {
                url: job.url.clone(),
                output_template: job
                    .output_dir
                    .join(format!("{safe_title}_fallback_attempt{attempt_num}.%(ext)s")),
                selection: format::fallback_selection(),
                attempt: attempt_num,
            }
        };

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<DownloadProgress>();
        let forward_events = events.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(p) = progress_rx.recv().await {
                let _ = forward_events.send(RunnerEvent::Progress {
                    id,
                    progress: Progress::Downloading {
                        percent: p.percent,
                        speed_bps: p.speed_bps,
                        eta_seconds: p.eta_seconds,
                    },
                });
            }
        });

        let result = fetcher.download(&attempt, progress_tx).await;
        // the fetcher dropped its sender; wait so progress lands before the terminal
        let _ = forwarder.await;

        if cancel.is_cancelled() {
            let _ = events.send(RunnerEvent::Terminal {
                id,
                outcome: Outcome::Cancelled,
            });
            return;
        }

        match result {
            Ok(path) => {
                info!(task_id = id.0, path = %path.display(), "download finished");
                let _ = events.send(RunnerEvent::Terminal {
                    id,
                    outcome: Outcome::Completed {
                        path: Some(path),
                        message: format!(
                            "Download successful after {} attempt(s).",
                            attempt_num + 1
                        ),
                    },
                });
                return;
            }
            Err(e) if !e.is_recoverable() => {
                warn!(task_id = id.0, error = %e, "download failed with non-recoverable error");
                let _ = events.send(RunnerEvent::Terminal {
                    id,
                    outcome: Outcome::Failed {
                        error: format!("Download failed: {e}"),
                    },
                });
                return;
            }
            Err(e) => {
                debug!(
                    task_id = id.0,
                    attempt = attempt_num + 1,
                    error = %e,
                    "download attempt failed"
                );
                last_error = e.to_string();
            }
        }
    }

    let _ = events.send(RunnerEvent::Terminal {
        id,
        outcome: Outcome::Failed {
            error: format!("All {total_attempts} attempts failed. Last error: {last_error}"),
        },
    });
}

/// Resolves a playlist into entries for the coordinator to fan out
///
/// Playlist resolution is never retried and downloads nothing itself; the
/// spawned child tasks do the downloading under the download limit.
pub(crate) async fn run_playlist_fetch(
    id: TaskId,
    url: Url,
    fetcher: Arc<dyn VideoFetcher>,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<RunnerEvent>,
) {
    if cancel.is_cancelled() {
        let _ = events.send(RunnerEvent::Terminal {
            id,
            outcome: Outcome::Cancelled,
        });
        return;
    }

    let _ = events.send(RunnerEvent::Progress {
        id,
        progress: Progress::Starting,
    });
    let _ = events.send(RunnerEvent::Progress {
        id,
        progress: Progress::Indeterminate {
            message: "Fetching playlist entries".to_string(),
        },
    });

    let result = fetcher.fetch_playlist_entries(&url).await;

    if cancel.is_cancelled() {
        let _ = events.send(RunnerEvent::Terminal {
            id,
            outcome: Outcome::Cancelled,
        });
        return;
    }

    match result {
        Ok(entries) if entries.is_empty() => {
            let _ = events.send(RunnerEvent::Terminal {
                id,
                outcome: Outcome::Failed {
                    error: format!("Playlist at {url} contains no downloadable entries."),
                },
            });
        }
        Ok(entries) => {
            info!(task_id = id.0, count = entries.len(), "playlist resolved");
            let count = entries.len();
            let _ = events.send(RunnerEvent::Children {
                parent: id,
                entries,
            });
            let _ = events.send(RunnerEvent::Terminal {
                id,
                outcome: Outcome::Completed {
                    path: None,
                    message: format!("Playlist resolved: {count} video(s) queued."),
                },
            });
        }
        Err(e) => {
            warn!(task_id = id.0, url = %url, error = %e, "playlist fetch failed");
            let _ = events.send(RunnerEvent::Terminal {
                id,
                outcome: Outcome::Failed {
                    error: format!("Failed to fetch playlist info for {url}: {e}"),
                },
            });
        }
    }
}
