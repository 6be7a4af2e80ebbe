//! Conversion runners
//!
//! Video and audio conversions go through the transcoder and report
//! best-effort percentage progress. Image and document conversions are
//! call-and-return with indeterminate progress because those adapters give
//! no granular feedback.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapter::{Adapters, ConversionOptions, TranscodeProgress};
use crate::types::{ConversionKind, Progress, TaskId};

use super::{Outcome, RunnerEvent};

/// Inputs for one conversion runner
pub(crate) struct ConversionJob {
    pub(crate) id: TaskId,
    pub(crate) input: PathBuf,
    pub(crate) output: PathBuf,
    pub(crate) kind: ConversionKind,
    pub(crate) target_ext: String,
    pub(crate) options: ConversionOptions,
}

/// Converts one file through the adapter matching its kind
pub(crate) async fn run_conversion(
    job: ConversionJob,
    adapters: Adapters,
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

    if let Some(parent) = job.output.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                let _ = events.send(RunnerEvent::Terminal {
                    id,
                    outcome: Outcome::Failed {
                        error: format!(
                            "Failed to create output directory {}: {e}",
                            parent.display()
                        ),
                    },
                });
                return;
            }
        }
    }

    info!(
        task_id = id.0,
        input = %job.input.display(),
        target = %job.target_ext,
        kind = ?job.kind,
        "starting conversion"
    );

    let result = match job.kind {
        ConversionKind::Video | ConversionKind::Audio => {
            let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<TranscodeProgress>();
            let forward_events = events.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(p) = progress_rx.recv().await {
                    let _ = forward_events.send(RunnerEvent::Progress {
                        id,
                        progress: Progress::Converting { percent: p.percent },
                    });
                }
            });
            let result = adapters
                .transcoder
                .convert(
                    &job.input,
                    &job.output,
                    &job.target_ext,
                    &job.options,
                    progress_tx,
                )
                .await;
            let _ = forwarder.await;
            result
        }
        ConversionKind::Image => {
            let _ = events.send(RunnerEvent::Progress {
                id,
                progress: Progress::Indeterminate {
                    message: format!("Converting image to {}", job.target_ext),
                },
            });
            adapters
                .images
                .convert(&job.input, &job.output, &job.target_ext)
                .await
        }
        ConversionKind::Document => {
            let _ = events.send(RunnerEvent::Progress {
                id,
                progress: Progress::Indeterminate {
                    message: "Converting document to PDF".to_string(),
                },
            });
            adapters
                .documents
                .convert(&job.input, &job.output, &job.target_ext)
                .await
        }
    };

    // a cancel that landed mid-call wins over whatever the adapter returned
    let outcome = if cancel.is_cancelled() {
        Outcome::Cancelled
    } else {
        match result {
            Ok(path) => {
                info!(task_id = id.0, path = %path.display(), "conversion finished");
                Outcome::Completed {
                    path: Some(path),
                    message: "Conversion successful.".to_string(),
                }
            }
            Err(e) => {
                warn!(task_id = id.0, error = %e, "conversion failed");
                Outcome::Failed {
                    error: format!("Conversion failed: {e}"),
                }
            }
        }
    };
    let _ = events.send(RunnerEvent::Terminal { id, outcome });
}
