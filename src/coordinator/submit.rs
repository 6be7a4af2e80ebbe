//! Submission validation
//!
//! All validation is synchronous and happens before a task is created, so a
//! rejected submission never appears in the table or emits events.

use std::path::Path;

use url::Url;

use crate::error::SubmitError;
use crate::types::ConversionKind;

/// Extensions accepted as video conversion input (and output targets)
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm", "flv", "wmv", "mpg", "mpeg"];
/// Extensions accepted as audio conversion input (and output targets)
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "aac", "wav", "flac", "ogg", "m4a", "wma", "opus"];
/// Extensions accepted as image conversion input (and output targets)
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "gif", "tiff", "heic"];
/// Extensions accepted as document conversion input
const DOCUMENT_EXTENSIONS: &[&str] = &["docx", "txt"];

/// What a submitted URL points at
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UrlKind {
    /// A single video page
    Video,
    /// A playlist page
    Playlist,
}

/// Parses and classifies a submitted URL
///
/// Anything with a `list` query parameter or a playlist path segment is a
/// playlist; every other valid http(s) URL is treated as a single video and
/// left for the fetcher to judge.
pub(crate) fn classify_url(raw: &str) -> Result<(Url, UrlKind), SubmitError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SubmitError::EmptyUrl);
    }
    let url = Url::parse(raw).map_err(|e| SubmitError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(SubmitError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    let has_list_param = url
        .query_pairs()
        .any(|(key, value)| key == "list" && !value.is_empty());
    let kind = if has_list_param || url.path().contains("playlist") {
        UrlKind::Playlist
    } else {
        UrlKind::Video
    };
    Ok((url, kind))
}

/// Validates a single-video submission
pub(crate) fn validate_video_url(raw: &str) -> Result<Url, SubmitError> {
    match classify_url(raw)? {
        (url, UrlKind::Video) => Ok(url),
        (url, UrlKind::Playlist) => Err(SubmitError::NotVideoUrl(url.to_string())),
    }
}

/// Validates a playlist submission
pub(crate) fn validate_playlist_url(raw: &str) -> Result<Url, SubmitError> {
    match classify_url(raw)? {
        (url, UrlKind::Playlist) => Ok(url),
        (url, UrlKind::Video) => Err(SubmitError::NotPlaylistUrl(url.to_string())),
    }
}

fn extensions_for(kind: ConversionKind) -> &'static [&'static str] {
    match kind {
        ConversionKind::Video => VIDEO_EXTENSIONS,
        ConversionKind::Audio => AUDIO_EXTENSIONS,
        ConversionKind::Image => IMAGE_EXTENSIONS,
        ConversionKind::Document => DOCUMENT_EXTENSIONS,
    }
}

/// Validates a conversion submission: the input extension must match the
/// requested kind and the target must be producible for that kind
pub(crate) fn validate_conversion(
    input: &Path,
    kind: ConversionKind,
    target_ext: &str,
) -> Result<(), SubmitError> {
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| SubmitError::MissingExtension(input.to_path_buf()))?;

    if !extensions_for(kind).contains(&extension.as_str()) {
        return Err(SubmitError::KindMismatch { extension, kind });
    }

    let target = target_ext.to_ascii_lowercase();
    match kind {
        ConversionKind::Document => {
            if target != "pdf" {
                return Err(SubmitError::DocumentTarget(target));
            }
        }
        ConversionKind::Video | ConversionKind::Audio | ConversionKind::Image => {
            if !extensions_for(kind).contains(&target.as_str()) {
                return Err(SubmitError::UnsupportedTarget { target, kind });
            }
        }
    }
    Ok(())
}
