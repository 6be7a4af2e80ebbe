//! Adapter traits for the external operations the queue coordinates
//!
//! The queue itself never talks to the network or spawns media tools; it
//! drives these traits. Applications plug in real implementations (a
//! yt-dlp wrapper, an ffmpeg wrapper) and tests plug in scripted mocks.
//!
//! Adapters perform exactly one attempt per call. Retry and fallback policy
//! lives in the queue, not here.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::error::AdapterError;
use crate::format::FormatSelection;

/// Video metadata returned before a download starts
#[derive(Clone, Debug)]
pub struct VideoMetadata {
    /// Source-side video identifier
    pub id: String,
    /// Video title, used for display and filenames
    pub title: String,
    /// Formats available for this video, if the fetcher reports them
    pub formats: Vec<FormatInfo>,
}

/// A single available format for a video
#[derive(Clone, Debug)]
pub struct FormatInfo {
    /// Source-side format identifier
    pub format_id: String,
    /// Container extension
    pub ext: String,
    /// Video height in pixels, if applicable
    pub height: Option<u32>,
    /// Human-readable note from the source
    pub note: Option<String>,
}

/// One entry of a resolved playlist
#[derive(Clone, Debug)]
pub struct PlaylistEntry {
    /// Source-side video identifier
    pub id: String,
    /// Entry title
    pub title: String,
    /// Direct URL for the entry's video
    pub url: Url,
    /// Title of the playlist the entry came from
    pub playlist_title: String,
}

/// Everything a fetcher needs for one download attempt
#[derive(Clone, Debug)]
pub struct DownloadAttempt {
    /// The video URL
    pub url: Url,
    /// Output path template; `%(ext)s` is substituted by the fetcher
    pub output_template: PathBuf,
    /// Resolved format selection for this attempt
    pub selection: FormatSelection,
    /// Zero-based attempt number (0 = initial, 1.. = fallback retries)
    pub attempt: u32,
}

/// Progress report for a running download
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DownloadProgress {
    /// Completion percentage, 0.0 to 100.0
    pub percent: f32,
    /// Current transfer speed in bytes per second, if known
    pub speed_bps: Option<u64>,
    /// Estimated seconds remaining, if known
    pub eta_seconds: Option<u64>,
    /// Bytes downloaded so far
    pub downloaded_bytes: u64,
    /// Total bytes expected, if known
    pub total_bytes: Option<u64>,
}

/// Progress report for a running transcode
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TranscodeProgress {
    /// Completion percentage if the tool reports duration, otherwise None
    pub percent: Option<f32>,
}

/// Encoder settings for audio/video transcodes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionOptions {
    /// Video codec
    pub video_codec: String,
    /// Constant rate factor (lower is higher quality)
    pub crf: u32,
    /// Audio codec
    pub audio_codec: String,
    /// Audio bitrate, e.g. "192k"
    pub audio_bitrate: String,
    /// Encoder speed preset
    pub preset: String,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            crf: 23,
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            preset: "medium".to_string(),
        }
    }
}

/// Fetches video metadata, downloads videos, and resolves playlists
#[async_trait]
pub trait VideoFetcher: Send + Sync {
    /// Fetches metadata for a single video without downloading it
    async fn fetch_metadata(&self, url: &Url) -> Result<VideoMetadata, AdapterError>;

    /// Performs one download attempt, streaming progress through `progress`
    ///
    /// Returns the path of the finished file. The implementation should
    /// drop `progress` when the attempt ends.
    async fn download(
        &self,
        attempt: &DownloadAttempt,
        progress: mpsc::UnboundedSender<DownloadProgress>,
    ) -> Result<PathBuf, AdapterError>;

    /// Resolves a playlist URL into its entries without downloading anything
    async fn fetch_playlist_entries(&self, url: &Url) -> Result<Vec<PlaylistEntry>, AdapterError>;
}

/// Transcodes audio and video files
#[async_trait]
pub trait MediaTranscoder: Send + Sync {
    /// Converts `input` to `output` with the given target extension
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        target_ext: &str,
        options: &ConversionOptions,
        progress: mpsc::UnboundedSender<TranscodeProgress>,
    ) -> Result<PathBuf, AdapterError>;
}

/// Converts image files between formats
#[async_trait]
pub trait ImageConverter: Send + Sync {
    /// Converts `input` to `output` with the given target extension
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        target_ext: &str,
    ) -> Result<PathBuf, AdapterError>;
}

/// Converts document files to PDF
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Converts `input` to `output`; the only supported target is "pdf"
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        target_ext: &str,
    ) -> Result<PathBuf, AdapterError>;
}

/// The full set of adapters the queue is constructed with
#[derive(Clone)]
pub struct Adapters {
    /// Video metadata, download, and playlist resolution
    pub fetcher: Arc<dyn VideoFetcher>,
    /// Audio/video transcoding
    pub transcoder: Arc<dyn MediaTranscoder>,
    /// Image format conversion
    pub images: Arc<dyn ImageConverter>,
    /// Document-to-PDF conversion
    pub documents: Arc<dyn DocumentConverter>,
}
