// MediaEngine trait and common types

use std::path::PathBuf;

use async_trait::async_trait;

use crate::downloader::errors::{Cancelled, EngineError};
use crate::downloader::models::{MediaInfo, ProgressEvent};

/// Callback the engine invokes for every progress report.
///
/// Returning `Err(Cancelled)` aborts the transfer; the engine then reports
/// [`EngineError::Cancelled`].
pub type ProgressHook<'a> = dyn FnMut(ProgressEvent) -> Result<(), Cancelled> + Send + 'a;

/// Configuration for the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Explicit yt-dlp binary; resolved automatically when `None`
    pub ytdlp_path: Option<PathBuf>,
    /// SOCKS5/HTTP proxy URL
    pub proxy: Option<String>,
    /// Network socket timeout passed to the engine, in seconds
    pub socket_timeout: Option<u32>,
    /// Upper bound for one metadata extraction, in seconds
    pub info_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: None,
            proxy: None,
            socket_timeout: Some(30),
            info_timeout_secs: 60,
        }
    }
}

impl EngineConfig {
    pub fn with_ytdlp_path(mut self, path: Option<PathBuf>) -> Self {
        self.ytdlp_path = path;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_socket_timeout(mut self, seconds: Option<u32>) -> Self {
        self.socket_timeout = seconds;
        self
    }

    pub fn with_info_timeout(mut self, seconds: u64) -> Self {
        self.info_timeout_secs = seconds;
        self
    }
}

/// Everything the engine needs for one extract+transfer run
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub url: String,
    /// Format selector chain (`-f`)
    pub format_selector: String,
    /// Output template with `%(title)s` / `%(ext)s` placeholders
    pub output_template: String,
    /// Container of the merged file
    pub merge_output_format: String,
    /// Keep the intermediate video/audio streams after merging
    pub keep_intermediates: bool,
    /// Extra ffmpeg arguments applied to the merge step only
    pub merger_args: Vec<String>,
    /// Directory containing the ffmpeg binary
    pub ffmpeg_location: Option<PathBuf>,
}

/// Metadata extraction and stream transfer
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Name of the engine (for logging)
    fn name(&self) -> &'static str;

    /// Extract metadata without downloading.
    ///
    /// `Ok(None)` means the engine produced no usable info (private,
    /// deleted or otherwise unavailable media).
    async fn extract_info(&self, url: &str) -> Result<Option<MediaInfo>, EngineError>;

    /// Download, merge and remux according to `request`, reporting progress
    /// through `hook`.
    async fn transfer(
        &self,
        request: &TransferRequest,
        hook: &mut ProgressHook<'_>,
    ) -> Result<(), EngineError>;
}
