// yt-dlp engine - drives the native `yt-dlp` binary as a subprocess
//
// Metadata comes from `--dump-single-json`; transfers stream one progress
// line per report through `--progress-template`, which feeds the hook.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use super::progress::{parse_progress_line, progress_template};
use super::traits::{EngineConfig, MediaEngine, ProgressHook, TransferRequest};
use crate::downloader::errors::{summarize_stderr, EngineError, ToolError};
use crate::downloader::models::MediaInfo;
use crate::downloader::tools::{self, ToolType};
use crate::downloader::utils::{run_output_with_timeout, RunError};

/// Env override for the yt-dlp binary
pub const YTDLP_PATH_ENV: &str = "YTDLP_PATH";

/// Subprocess-backed engine using the yt-dlp binary
pub struct YtDlpEngine {
    ytdlp_path: PathBuf,
    config: EngineConfig,
}

impl YtDlpEngine {
    pub fn new(config: EngineConfig) -> Self {
        let ytdlp_path = Self::find_ytdlp(&config);
        tracing::debug!("[YtDlp] using binary {}", ytdlp_path.display());
        Self { ytdlp_path, config }
    }

    /// Explicit config, then `YTDLP_PATH`, then the located binary, then bare `yt-dlp`
    fn find_ytdlp(config: &EngineConfig) -> PathBuf {
        if let Some(path) = &config.ytdlp_path {
            return path.clone();
        }
        if let Some(custom) = std::env::var_os(YTDLP_PATH_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(custom);
        }
        tools::ytdlp_path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(ToolType::YtDlp.binary_name()))
    }

    pub fn ytdlp_path(&self) -> &Path {
        &self.ytdlp_path
    }

    fn network_args(&self, args: &mut Vec<String>) {
        if let Some(timeout) = self.config.socket_timeout {
            args.push("--socket-timeout".to_string());
            args.push(timeout.to_string());
        }
        if let Some(proxy) = &self.config.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }
    }

    /// Arguments for metadata-only extraction
    pub fn build_info_args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-single-json".to_string(),
            "--skip-download".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
        ];
        self.network_args(&mut args);
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    /// Arguments for extract + transfer + merge
    pub fn build_transfer_args(&self, request: &TransferRequest) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            request.format_selector.clone(),
            "-o".to_string(),
            request.output_template.clone(),
            "--merge-output-format".to_string(),
            request.merge_output_format.clone(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            progress_template(),
        ];

        // `Merger+ffmpeg:` scopes the arguments to the merge step
        if !request.merger_args.is_empty() {
            args.push("--postprocessor-args".to_string());
            args.push(format!("Merger+ffmpeg:{}", request.merger_args.join(" ")));
        }

        if request.keep_intermediates {
            args.push("-k".to_string());
        }

        if let Some(location) = &request.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(location.to_string_lossy().to_string());
        }

        self.network_args(&mut args);
        args.push("--".to_string());
        args.push(request.url.clone());
        args
    }

    /// Parse `--dump-single-json` output; empty output or `null` means no info
    pub fn parse_info(stdout: &[u8]) -> Result<Option<MediaInfo>, EngineError> {
        let json_str = String::from_utf8_lossy(stdout);
        let trimmed = json_str.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let info: Option<MediaInfo> =
            serde_json::from_str(trimmed).map_err(EngineError::unexpected)?;
        Ok(info)
    }
}

impl Default for YtDlpEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[async_trait]
impl MediaEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn extract_info(&self, url: &str) -> Result<Option<MediaInfo>, EngineError> {
        let args = self.build_info_args(url);
        tracing::debug!("[YtDlp] running: {} {}", self.ytdlp_path.display(), args.join(" "));

        let output = match run_output_with_timeout(&self.ytdlp_path, &args, self.config.info_timeout_secs).await {
            Ok(output) => output,
            Err(RunError::TimedOut(secs)) => {
                return Err(EngineError::Extraction(format!("timed out after {}s", secs)));
            }
            Err(e) => return Err(EngineError::unexpected(e)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!("[YtDlp] info failed: {}", stderr);
            return Err(EngineError::Extraction(summarize_stderr(&stderr)));
        }

        Self::parse_info(&output.stdout)
    }

    async fn transfer(
        &self,
        request: &TransferRequest,
        hook: &mut ProgressHook<'_>,
    ) -> Result<(), EngineError> {
        let args = self.build_transfer_args(request);
        tracing::debug!("[YtDlp] running: {} {}", self.ytdlp_path.display(), args.join(" "));

        let mut child = Command::new(&self.ytdlp_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                EngineError::unexpected(ToolError::Execution {
                    tool: self.ytdlp_path.display().to_string(),
                    source,
                })
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::unexpected_msg("failed to capture yt-dlp stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::unexpected_msg("failed to capture yt-dlp stderr"))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut lines = BufReader::new(stdout).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!("[YtDlp] stdout read error: {}", e);
                    break;
                }
            };

            let Some(event) = parse_progress_line(&line) else {
                tracing::trace!("[yt-dlp] {}", line);
                continue;
            };

            if hook(event).is_err() {
                tracing::info!("[YtDlp] cancellation requested, stopping yt-dlp");
                let _ = child.kill().await;
                stderr_task.abort();
                return Err(EngineError::Cancelled);
            }
        }

        let status = child.wait().await.map_err(EngineError::unexpected)?;
        let stderr_output = stderr_task.await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            tracing::debug!("[YtDlp] transfer failed ({}): {}", status, stderr_output);
            Err(EngineError::Transfer(summarize_stderr(&stderr_output)))
        }
    }
}
