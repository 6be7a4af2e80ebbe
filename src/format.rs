//! Quality labels and download format selection
//!
//! Translates the user-facing quality choice into tiered format selectors
//! for the video fetcher, and provides the fixed fallback selection used by
//! retry attempts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// User-facing download quality choice
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum QualityLabel {
    /// Best available quality, no height cap
    Best,
    /// Best quality capped at the given video height (e.g. 720 for "720p")
    MaxHeight(u32),
    /// Audio only, extracted to the given codec (e.g. "mp3")
    AudioOnly(String),
}

impl Default for QualityLabel {
    fn default() -> Self {
        QualityLabel::Best
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityLabel::Best => write!(f, "best"),
            QualityLabel::MaxHeight(h) => write!(f, "{h}p"),
            QualityLabel::AudioOnly(codec) => write!(f, "audio_only_{codec}"),
        }
    }
}

impl FromStr for QualityLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty quality label".to_string());
        }
        if s.eq_ignore_ascii_case("best") {
            return Ok(QualityLabel::Best);
        }
        if let Some(codec) = s.strip_prefix("audio_only_") {
            if codec.is_empty() {
                return Err(format!("missing audio codec in '{s}'"));
            }
            return Ok(QualityLabel::AudioOnly(codec.to_string()));
        }
        if let Some(height) = s.strip_suffix('p') {
            return height
                .parse::<u32>()
                .map(QualityLabel::MaxHeight)
                .map_err(|_| format!("invalid height in '{s}'"));
        }
        Err(format!("unrecognized quality label '{s}'"))
    }
}

impl From<QualityLabel> for String {
    fn from(label: QualityLabel) -> Self {
        label.to_string()
    }
}

impl TryFrom<String> for QualityLabel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl QualityLabel {
    /// Parses a label, falling back to [`QualityLabel::Best`] on bad input
    ///
    /// Used where a stored preference may be stale; a warning is logged so
    /// the silent fallback is still visible.
    pub fn parse_lossy(s: &str) -> Self {
        match s.parse() {
            Ok(label) => label,
            Err(reason) => {
                warn!(label = s, reason = %reason, "unrecognized quality label, using best");
                QualityLabel::Best
            }
        }
    }
}

/// Audio codecs supported for audio-only extraction
const AUDIO_CODECS: &[&str] = &["mp3", "m4a", "ogg"];

/// Audio extraction settings for audio-only downloads
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioExtraction {
    /// Target audio codec
    pub codec: String,
    /// Encoder quality argument (bitrate in kbps as a string)
    pub quality: String,
}

/// A fully resolved format selection handed to the video fetcher
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatSelection {
    /// Tiered format selector expression
    pub selector: String,
    /// Container the fetcher should merge video and audio streams into
    pub merge_container: Option<String>,
    /// Present for audio-only downloads: post-download extraction settings
    pub extract_audio: Option<AudioExtraction>,
}

/// Builds the format selection for the first download attempt
///
/// Video selections are tiered so the fetcher can degrade gracefully:
/// preferred container streams first, then a merged best pair, then the
/// single best stream. Audio-only selections skip the video tiers entirely.
pub fn initial_selection(quality: &QualityLabel, container: &str) -> FormatSelection {
    match quality {
        QualityLabel::AudioOnly(codec) => {
            let codec = if AUDIO_CODECS.contains(&codec.as_str()) {
                codec.clone()
            } else {
                warn!(codec = %codec, "unsupported audio codec, extracting mp3");
                "mp3".to_string()
            };
            FormatSelection {
                selector: format!("bestaudio[ext={codec}]/bestaudio"),
                merge_container: None,
                extract_audio: Some(AudioExtraction {
                    codec,
                    quality: "192".to_string(),
                }),
            }
        }
        QualityLabel::Best => video_selection("", container),
        QualityLabel::MaxHeight(h) => video_selection(&format!("[height<={h}]"), container),
    }
}

// The height cap applies to the merged-stream tiers only; the single-stream
// `best` tiers stay uncapped so a too-strict cap still downloads something.
fn video_selection(height_filter: &str, container: &str) -> FormatSelection {
    FormatSelection {
        selector: format!(
            "bestvideo{height_filter}[ext={container}]+bestaudio[ext=m4a]\
             /bestvideo{height_filter}[ext=webm]+bestaudio[ext=m4a]\
             /bestvideo{height_filter}+bestaudio\
             /best[ext={container}]\
             /best[ext=webm]\
             /best"
        ),
        merge_container: Some(container.to_string()),
        extract_audio: None,
    }
}

/// Builds the fixed selection used by retry attempts
///
/// Retries deliberately discard the user's quality preference and ask for a
/// broadly compatible mp4, trading fidelity for a better chance of success.
pub fn fallback_selection() -> FormatSelection {
    FormatSelection {
        selector: "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".to_string(),
        merge_container: Some("mp4".to_string()),
        extract_audio: None,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_round_trippable_labels() {
        for raw in ["best", "720p", "1080p", "audio_only_mp3"] {
            let label: QualityLabel = raw.parse().unwrap();
            assert_eq!(label.to_string(), raw);
        }
    }

    #[test]
    fn rejects_garbage_labels() {
        for raw in ["", "bestest", "720", "audio_only_", "-1p"] {
            assert!(raw.parse::<QualityLabel>().is_err(), "should reject '{raw}'");
        }
    }

    #[test]
    fn parse_lossy_falls_back_to_best() {
        assert_eq!(QualityLabel::parse_lossy("4k ultra"), QualityLabel::Best);
        assert_eq!(
            QualityLabel::parse_lossy("480p"),
            QualityLabel::MaxHeight(480)
        );
    }

    #[test]
    fn capped_selection_embeds_height_in_merged_tiers_only() {
        let sel = initial_selection(&QualityLabel::MaxHeight(720), "mp4");
        assert_eq!(sel.selector.matches("height<=720").count(), 3);
        assert!(sel.selector.ends_with("/best[ext=mp4]/best[ext=webm]/best"));
        assert_eq!(sel.merge_container.as_deref(), Some("mp4"));
        assert!(sel.extract_audio.is_none());
    }

    #[test]
    fn best_selection_prefers_requested_container() {
        let sel = initial_selection(&QualityLabel::Best, "mkv");
        assert!(sel.selector.starts_with("bestvideo[ext=mkv]+bestaudio[ext=m4a]"));
        assert!(sel.selector.contains("/bestvideo[ext=webm]+bestaudio[ext=m4a]/"));
        assert_eq!(sel.merge_container.as_deref(), Some("mkv"));
    }

    #[test]
    fn audio_only_selection_extracts_requested_codec() {
        let sel = initial_selection(&QualityLabel::AudioOnly("ogg".into()), "mp4");
        assert_eq!(sel.selector, "bestaudio[ext=ogg]/bestaudio");
        assert!(sel.merge_container.is_none());
        let extract = sel.extract_audio.unwrap();
        assert_eq!(extract.codec, "ogg");
        assert_eq!(extract.quality, "192");
    }

    #[test]
    fn unknown_audio_codec_falls_back_to_mp3() {
        let sel = initial_selection(&QualityLabel::AudioOnly("xyz".into()), "mp4");
        assert_eq!(sel.extract_audio.unwrap().codec, "mp3");
    }

    #[test]
    fn fallback_ignores_quality_and_targets_mp4() {
        let sel = fallback_selection();
        assert_eq!(
            sel.selector,
            "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best"
        );
        assert_eq!(sel.merge_container.as_deref(), Some("mp4"));
        assert!(sel.extract_audio.is_none());
    }

    #[test]
    fn quality_label_serde_uses_string_form() {
        let json = serde_json::to_string(&QualityLabel::MaxHeight(720)).unwrap();
        assert_eq!(json, "\"720p\"");
        let back: QualityLabel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, QualityLabel::MaxHeight(720));
    }
}
