// Common data models for the downloader

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

/// One raw stream descriptor as reported by the extraction engine.
///
/// Every field is optional: the engine reports whatever the source exposes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFormat {
    /// Format ID (e.g., "137", "140")
    pub format_id: Option<String>,
    /// File extension (mp4, webm, m4a)
    pub ext: Option<String>,
    /// Resolution string (e.g., "1920x1080")
    pub resolution: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Frames per second
    pub fps: Option<f64>,
    /// Video codec (avc1, vp9, av01, none)
    pub vcodec: Option<String>,
    /// Audio codec (mp4a, opus, none)
    pub acodec: Option<String>,
    /// File size in bytes
    pub filesize: Option<f64>,
    /// Approximate file size (when exact is unknown)
    pub filesize_approx: Option<f64>,
}

impl RawFormat {
    /// Exact size, else the approximate one
    pub fn effective_size(&self) -> Option<f64> {
        self.filesize.or(self.filesize_approx)
    }

    /// True when the descriptor carries a video track
    pub fn has_video(&self) -> bool {
        self.vcodec
            .as_deref()
            .is_some_and(|v| !v.is_empty() && v != "none")
    }
}

/// Media information produced by one successful fetch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaInfo {
    pub id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    pub uploader: Option<String>,
    /// Duration in seconds
    pub duration: Option<f64>,
    /// Thumbnail URL
    pub thumbnail: Option<String>,
    pub webpage_url: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub formats: Vec<RawFormat>,
}

// yt-dlp writes `null` for fields it could not fill
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// User-facing stream variant (never audio-only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamVariant {
    /// Display label
    pub label: String,
    /// Identifier handed back to the transfer engine
    pub format_id: String,
    /// Height in pixels, 0 if unknown
    pub height: u32,
    /// Frames per second, 0 if unknown
    pub frame_rate: f64,
    pub ext: String,
    pub vcodec: String,
}

/// Severity of a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// Status reported with each progress event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressStatus {
    Downloading,
    Finished,
    Other(String),
}

impl ProgressStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "downloading" => Self::Downloading,
            "finished" => Self::Finished,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One progress report from the transfer engine
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub status: ProgressStatus,
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub total_bytes_estimate: Option<f64>,
    /// Bytes per second
    pub speed: Option<f64>,
    /// Seconds remaining
    pub eta: Option<u64>,
}

impl ProgressEvent {
    pub fn new(status: ProgressStatus) -> Self {
        Self {
            status,
            downloaded_bytes: None,
            total_bytes: None,
            total_bytes_estimate: None,
            speed: None,
            eta: None,
        }
    }

    /// Total size: exact, else the estimate
    pub fn total(&self) -> Option<f64> {
        self.total_bytes
            .map(|t| t as f64)
            .or(self.total_bytes_estimate)
    }

    /// `floor(downloaded / total * 100)`, 0 when the total is unknown
    pub fn percent(&self) -> u8 {
        match self.total() {
            Some(total) if total > 0.0 => {
                let downloaded = self.downloaded_bytes.unwrap_or(0) as f64;
                (downloaded / total * 100.0).floor().clamp(0.0, 100.0) as u8
            }
            _ => 0,
        }
    }
}

/// What the caller asks `DownloadManager::download` to fetch
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub url: String,
    /// Format ID of a previously fetched [`StreamVariant`]
    pub format_id: String,
    /// Height of that variant, 0 if unknown
    pub height: u32,
    pub output_dir: PathBuf,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, variant: &StreamVariant, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            format_id: variant.format_id.clone(),
            height: variant.height,
            output_dir: output_dir.into(),
        }
    }
}

/// Default output directory: the user's download dir, else the current dir
pub fn default_output_dir() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| PathBuf::from("."))
}
