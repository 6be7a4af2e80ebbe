//! # media-queue
//!
//! Task queue and concurrency coordinator for media download and conversion
//! applications.
//!
//! ## Design Philosophy
//!
//! media-queue is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Pluggable** - The actual downloading and converting happens behind
//!   adapter traits; the crate coordinates lifecycle, retries and limits
//! - **Bounded** - Per-category concurrency limits are never exceeded
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_queue::{Config, DownloadOptions, MediaQueue};
//!
//! # fn adapters() -> media_queue::Adapters { unimplemented!() }
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let queue = MediaQueue::new(Config::default(), adapters());
//!
//!     // Subscribe to events before submitting
//!     let mut events = queue.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let id = queue.add_download(
//!         "https://www.youtube.com/watch?v=abc123",
//!         DownloadOptions::default(),
//!     )?;
//!     println!("queued task {id}");
//!
//!     queue.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Adapter traits for downloads and conversions
pub mod adapter;
/// Configuration types
pub mod config;
/// The queue coordinator (decomposed into focused submodules)
pub mod coordinator;
/// Error types
pub mod error;
/// Quality labels and format selection
pub mod format;
/// Core types and events
pub mod types;
/// Utility functions
pub mod util;

// Re-export commonly used types
pub use adapter::{
    Adapters, ConversionOptions, DocumentConverter, DownloadAttempt, DownloadProgress, FormatInfo,
    ImageConverter, MediaTranscoder, PlaylistEntry, TranscodeProgress, VideoFetcher, VideoMetadata,
};
pub use config::Config;
pub use coordinator::MediaQueue;
pub use error::{AdapterError, Error, Result, SubmitError};
pub use format::{AudioExtraction, FormatSelection, QualityLabel};
pub use types::{
    Category, ConversionKind, DownloadOptions, Event, Progress, QueueStats, Status, TaskId,
    TaskInfo, TaskKind, TaskResult,
};
