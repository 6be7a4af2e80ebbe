//! Shared test helpers: scripted mock adapters and a queue harness.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, Notify};
use url::Url;

use crate::adapter::{
    Adapters, ConversionOptions, DocumentConverter, DownloadAttempt, DownloadProgress,
    ImageConverter, MediaTranscoder, PlaylistEntry, TranscodeProgress, VideoFetcher, VideoMetadata,
};
use crate::config::Config;
use crate::coordinator::MediaQueue;
use crate::error::AdapterError;
use crate::types::{Event, Status, TaskId, TaskResult};

/// Script for one download attempt of the mock fetcher.
pub(crate) struct AttemptScript {
    /// Progress reports emitted before the attempt resolves.
    pub(crate) progress: Vec<DownloadProgress>,
    /// What the attempt returns.
    pub(crate) result: Result<PathBuf, AdapterError>,
    /// If set, the attempt blocks until the gate is notified.
    pub(crate) gate: Option<Arc<Notify>>,
}

impl AttemptScript {
    pub(crate) fn ok(path: &str) -> Self {
        Self {
            progress: vec![],
            result: Ok(PathBuf::from(path)),
            gate: None,
        }
    }

    pub(crate) fn fail(error: AdapterError) -> Self {
        Self {
            progress: vec![],
            result: Err(error),
            gate: None,
        }
    }

    pub(crate) fn with_progress(mut self, percent: f32) -> Self {
        self.progress.push(DownloadProgress {
            percent,
            speed_bps: Some(1_000_000),
            eta_seconds: Some(10),
            downloaded_bytes: 0,
            total_bytes: None,
        });
        self
    }

    pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

/// Scripted video fetcher. Attempts are consumed FIFO across all tasks;
/// when the script queue is empty, downloads succeed with a default path.
pub(crate) struct MockFetcher {
    pub(crate) metadata: Mutex<Result<VideoMetadata, AdapterError>>,
    pub(crate) scripts: Mutex<VecDeque<AttemptScript>>,
    pub(crate) playlist: Mutex<Result<Vec<PlaylistEntry>, AdapterError>>,
    pub(crate) metadata_calls: AtomicUsize,
    pub(crate) download_calls: AtomicUsize,
    pub(crate) playlist_calls: AtomicUsize,
    /// Every DownloadAttempt the queue handed us, in call order.
    pub(crate) attempts: Mutex<Vec<DownloadAttempt>>,
}

impl MockFetcher {
    pub(crate) fn new() -> Self {
        Self {
            metadata: Mutex::new(Ok(VideoMetadata {
                id: "vid1".to_string(),
                title: "Test Video".to_string(),
                formats: vec![],
            })),
            scripts: Mutex::new(VecDeque::new()),
            playlist: Mutex::new(Ok(vec![])),
            metadata_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
            playlist_calls: AtomicUsize::new(0),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_attempts(self, scripts: Vec<AttemptScript>) -> Self {
        *self.scripts.lock().unwrap() = scripts.into();
        self
    }

    pub(crate) fn with_metadata_error(self, error: AdapterError) -> Self {
        *self.metadata.lock().unwrap() = Err(error);
        self
    }

    pub(crate) fn with_playlist(self, entries: Vec<PlaylistEntry>) -> Self {
        *self.playlist.lock().unwrap() = Ok(entries);
        self
    }

    pub(crate) fn with_playlist_error(self, error: AdapterError) -> Self {
        *self.playlist.lock().unwrap() = Err(error);
        self
    }

    pub(crate) fn captured_attempts(&self) -> Vec<DownloadAttempt> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoFetcher for MockFetcher {
    async fn fetch_metadata(&self, _url: &Url) -> Result<VideoMetadata, AdapterError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.metadata.lock().unwrap().clone()
    }

    async fn download(
        &self,
        attempt: &DownloadAttempt,
        progress: mpsc::UnboundedSender<DownloadProgress>,
    ) -> Result<PathBuf, AdapterError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.attempts.lock().unwrap().push(attempt.clone());

        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(script) => {
                for p in &script.progress {
                    let _ = progress.send(*p);
                }
                if let Some(gate) = &script.gate {
                    gate.notified().await;
                }
                script.result
            }
            None => Ok(PathBuf::from("/out/video.mp4")),
        }
    }

    async fn fetch_playlist_entries(&self, _url: &Url) -> Result<Vec<PlaylistEntry>, AdapterError> {
        self.playlist_calls.fetch_add(1, Ordering::SeqCst);
        self.playlist.lock().unwrap().clone()
    }
}

/// Mock transcoder; optionally blocks on a gate or panics to exercise the
/// runner's panic boundary.
pub(crate) struct MockTranscoder {
    pub(crate) result: Mutex<Result<PathBuf, AdapterError>>,
    pub(crate) progress: Vec<TranscodeProgress>,
    pub(crate) gate: Option<Arc<Notify>>,
    pub(crate) panic_on_call: bool,
    pub(crate) calls: AtomicUsize,
}

impl MockTranscoder {
    pub(crate) fn new() -> Self {
        Self {
            result: Mutex::new(Ok(PathBuf::from("/out/converted.mp4"))),
            progress: vec![],
            gate: None,
            panic_on_call: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing(error: AdapterError) -> Self {
        let mock = Self::new();
        *mock.result.lock().unwrap() = Err(error);
        mock
    }

    pub(crate) fn panicking() -> Self {
        Self {
            panic_on_call: true,
            ..Self::new()
        }
    }

    pub(crate) fn with_progress(mut self, percents: &[f32]) -> Self {
        self.progress = percents
            .iter()
            .map(|p| TranscodeProgress { percent: Some(*p) })
            .collect();
        self
    }

    pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl MediaTranscoder for MockTranscoder {
    async fn convert(
        &self,
        _input: &Path,
        _output: &Path,
        _target_ext: &str,
        _options: &ConversionOptions,
        progress: mpsc::UnboundedSender<TranscodeProgress>,
    ) -> Result<PathBuf, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_call {
            panic!("mock transcoder asked to panic");
        }
        for p in &self.progress {
            let _ = progress.send(*p);
        }
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.result.lock().unwrap().clone()
    }
}

/// Mock image converter recording the targets it was asked for.
pub(crate) struct MockImageConverter {
    pub(crate) result: Mutex<Result<PathBuf, AdapterError>>,
    pub(crate) calls: AtomicUsize,
}

impl MockImageConverter {
    pub(crate) fn new() -> Self {
        Self {
            result: Mutex::new(Ok(PathBuf::from("/out/converted.png"))),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ImageConverter for MockImageConverter {
    async fn convert(
        &self,
        _input: &Path,
        _output: &Path,
        _target_ext: &str,
    ) -> Result<PathBuf, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.lock().unwrap().clone()
    }
}

/// Mock document converter.
pub(crate) struct MockDocumentConverter {
    pub(crate) result: Mutex<Result<PathBuf, AdapterError>>,
    pub(crate) calls: AtomicUsize,
}

impl MockDocumentConverter {
    pub(crate) fn new() -> Self {
        Self {
            result: Mutex::new(Ok(PathBuf::from("/out/converted.pdf"))),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DocumentConverter for MockDocumentConverter {
    async fn convert(
        &self,
        _input: &Path,
        _output: &Path,
        _target_ext: &str,
    ) -> Result<PathBuf, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.lock().unwrap().clone()
    }
}

/// A queue wired to mock adapters, with an event subscription opened before
/// anything is submitted. Keep the struct alive: it owns the tempdir.
pub(crate) struct TestHarness {
    pub(crate) queue: MediaQueue,
    pub(crate) events: broadcast::Receiver<Event>,
    pub(crate) fetcher: Arc<MockFetcher>,
    pub(crate) transcoder: Arc<MockTranscoder>,
    pub(crate) images: Arc<MockImageConverter>,
    pub(crate) documents: Arc<MockDocumentConverter>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub(crate) fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub(crate) fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        Self::build(tweak, MockFetcher::new(), MockTranscoder::new())
    }

    pub(crate) fn with_fetcher(fetcher: MockFetcher) -> Self {
        Self::build(|_| {}, fetcher, MockTranscoder::new())
    }

    pub(crate) fn with_transcoder(transcoder: MockTranscoder) -> Self {
        Self::build(|_| {}, MockFetcher::new(), transcoder)
    }

    pub(crate) fn build(
        tweak: impl FnOnce(&mut Config),
        fetcher: MockFetcher,
        transcoder: MockTranscoder,
    ) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config {
            download_dir: temp_dir.path().join("downloads"),
            conversion_dir: temp_dir.path().join("conversions"),
            // fast ticks keep admission-related tests quick
            dispatch_interval: Duration::from_millis(20),
            auto_clear_delay: Duration::from_millis(50),
            ..Config::default()
        };
        tweak(&mut config);

        let fetcher = Arc::new(fetcher);
        let transcoder = Arc::new(transcoder);
        let images = Arc::new(MockImageConverter::new());
        let documents = Arc::new(MockDocumentConverter::new());
        let adapters = Adapters {
            fetcher: fetcher.clone(),
            transcoder: transcoder.clone(),
            images: images.clone(),
            documents: documents.clone(),
        };

        let queue = MediaQueue::new(config, adapters);
        let events = queue.subscribe();
        Self {
            queue,
            events,
            fetcher,
            transcoder,
            images,
            documents,
            _temp_dir: temp_dir,
        }
    }
}

pub(crate) const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Next event, or panic after a timeout so a hung test fails loudly.
pub(crate) async fn next_event(events: &mut broadcast::Receiver<Event>) -> Event {
    tokio::time::timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Skips events until one matches the predicate.
pub(crate) async fn wait_for_event(
    events: &mut broadcast::Receiver<Event>,
    mut predicate: impl FnMut(&Event) -> bool,
) -> Event {
    loop {
        let event = next_event(events).await;
        if predicate(&event) {
            return event;
        }
    }
}

/// Waits for the terminal event of one task, skipping unrelated events.
pub(crate) async fn wait_for_terminal(
    events: &mut broadcast::Receiver<Event>,
    task: TaskId,
) -> (Status, TaskResult) {
    loop {
        if let Event::TaskTerminal { id, status, result } = next_event(events).await {
            if id == task {
                return (status, result);
            }
        }
    }
}

/// Polls the queue until the task reaches the expected status.
pub(crate) async fn wait_for_status(queue: &MediaQueue, id: TaskId, expected: Status) {
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    loop {
        let info = queue.get_task(id).await.unwrap();
        if info.as_ref().map(|i| i.status) == Some(expected) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for task {id} to reach {expected:?}, currently {:?}",
            info.map(|i| i.status)
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Builds a playlist entry pointing at a distinct watch URL.
pub(crate) fn playlist_entry(index: usize, playlist_title: &str) -> PlaylistEntry {
    PlaylistEntry {
        id: format!("entry{index}"),
        title: format!("Entry {index}"),
        url: Url::parse(&format!("https://www.youtube.com/watch?v=entry{index}")).unwrap(),
        playlist_title: playlist_title.to_string(),
    }
}
