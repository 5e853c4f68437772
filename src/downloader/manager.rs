// Download manager - runs fetch/download operations off the caller's thread
//
// Each download gets its own cancellation token. The most recent download's
// token sits in the active slot, which is what `cancel()` reaches. Fetches
// are never cancelled and leave the slot alone.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use super::engine::{MediaEngine, TransferRequest};
use super::errors::{Cancelled, EngineError};
use super::format_selector::{FormatSelector, MERGE_CONTAINER, MERGE_FFMPEG_ARGS};
use super::models::{DownloadRequest, ProgressEvent, ProgressStatus, Severity};
use super::tools;
use super::traits::{DownloadCallbacks, FetchCallbacks};
use super::utils::{cleanup_part_files, format_rate};

pub const MSG_INFO_UNAVAILABLE: &str =
    "info unavailable: the media may be private, deleted or unavailable";
pub const MSG_STARTING: &str = "starting download";
pub const MSG_MERGING: &str = "merging video and audio";
pub const MSG_CANCELLED: &str = "download cancelled";

/// Identifies one fetch or download call in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(u64);

impl OperationId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

pub struct DownloadManager {
    engine: Arc<dyn MediaEngine>,
    handle: Handle,
    active: Mutex<Option<CancellationToken>>,
    next_id: AtomicU64,
    ffmpeg_location: Option<PathBuf>,
}

impl DownloadManager {
    /// Workers are spawned on `handle`, so the manager can be driven from
    /// threads that are not part of the runtime.
    pub fn new(engine: Arc<dyn MediaEngine>, handle: Handle) -> Self {
        Self {
            engine,
            handle,
            active: Mutex::new(None),
            next_id: AtomicU64::new(0),
            ffmpeg_location: tools::ffmpeg_dir(),
        }
    }

    /// Directory handed to the engine as the ffmpeg location
    pub fn with_ffmpeg_location(mut self, dir: Option<PathBuf>) -> Self {
        self.ffmpeg_location = dir;
        self
    }

    pub fn ffmpeg_location(&self) -> Option<&PathBuf> {
        self.ffmpeg_location.as_ref()
    }

    /// Extract the format list for `url` without downloading.
    ///
    /// Exactly one of `on_success` / `on_error` fires. Cancellation is not
    /// observed here.
    pub fn fetch_formats<C>(&self, url: impl Into<String>, callbacks: C) -> OperationId
    where
        C: FetchCallbacks,
    {
        let url = url.into();
        let op = self.next_op();
        tracing::info!("[Manager] {} fetch formats via {}: {}", op, self.engine.name(), url);

        let callbacks = Arc::new(callbacks);
        let engine = self.engine.clone();
        let worker_callbacks = callbacks.clone();

        self.spawn_worker(
            op,
            async move { run_fetch(op, engine, url, worker_callbacks).await },
            move |message| callbacks.on_error(message),
        );
        op
    }

    /// Download and merge the chosen variant into `request.output_dir`.
    pub fn download<C>(&self, request: DownloadRequest, callbacks: C) -> OperationId
    where
        C: DownloadCallbacks,
    {
        let op = self.next_op();
        let token = self.install_token();
        tracing::info!(
            "[Manager] {} download {} (format {}, height {}) -> {}",
            op,
            request.url,
            request.format_id,
            request.height,
            request.output_dir.display()
        );

        let callbacks = Arc::new(callbacks);
        let engine = self.engine.clone();
        let ffmpeg_location = self.ffmpeg_location.clone();
        let worker_callbacks = callbacks.clone();

        self.spawn_worker(
            op,
            async move {
                run_download(op, engine, request, ffmpeg_location, token, worker_callbacks).await
            },
            move |message| callbacks.on_error(message),
        );
        op
    }

    /// Signal the active operation to stop. Safe to call any number of times.
    pub fn cancel(&self) {
        if let Some(token) = self.active.lock().as_ref() {
            if !token.is_cancelled() {
                tracing::info!("[Manager] cancellation requested");
            }
            token.cancel();
        }
    }

    fn next_op(&self) -> OperationId {
        OperationId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Fresh token for a download, installed before its worker starts
    fn install_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.active.lock() = Some(token.clone());
        token
    }

    /// Run `work` in its own task; a panic inside it is reported through
    /// `on_crash` instead of escaping.
    fn spawn_worker<F, E>(&self, op: OperationId, work: F, on_crash: E)
    where
        F: Future<Output = ()> + Send + 'static,
        E: FnOnce(String) + Send + 'static,
    {
        self.handle.spawn(async move {
            if let Err(err) = tokio::spawn(work).await {
                let detail = join_error_detail(err);
                tracing::error!("[Manager] {} worker crashed: {}", op, detail);
                on_crash(describe_unexpected(EngineError::unexpected_msg(detail)));
            }
        });
    }
}

async fn run_fetch<C: FetchCallbacks>(
    op: OperationId,
    engine: Arc<dyn MediaEngine>,
    url: String,
    callbacks: Arc<C>,
) {
    match engine.extract_info(&url).await {
        Ok(Some(info)) => {
            let variants = FormatSelector::normalize(&info.formats);
            tracing::info!(
                "[Manager] {} found {} variants for \"{}\"",
                op,
                variants.len(),
                info.title
            );
            callbacks.on_success(variants, info);
        }
        Ok(None) => {
            tracing::info!("[Manager] {} no info returned", op);
            callbacks.on_error(MSG_INFO_UNAVAILABLE.to_string());
        }
        Err(EngineError::Extraction(detail)) => {
            tracing::info!("[Manager] {} extraction failed: {}", op, detail);
            callbacks.on_error(format!("extraction error: {}", detail));
        }
        Err(err) => {
            tracing::error!("[Manager] {} fetch failed unexpectedly: {}", op, err);
            callbacks.on_error(describe_unexpected(err));
        }
    }
}

async fn run_download<C: DownloadCallbacks>(
    op: OperationId,
    engine: Arc<dyn MediaEngine>,
    request: DownloadRequest,
    ffmpeg_location: Option<PathBuf>,
    token: CancellationToken,
    callbacks: Arc<C>,
) {
    callbacks.on_status(MSG_STARTING.to_string(), Severity::Info);

    let transfer = build_transfer_request(&request, ffmpeg_location);
    let callbacks_ref = callbacks.as_ref();
    let token_ref = &token;

    let mut hook = move |event: ProgressEvent| -> Result<(), Cancelled> {
        if token_ref.is_cancelled() {
            return Err(Cancelled);
        }
        match event.status {
            ProgressStatus::Downloading => {
                let (percent, line) = progress_line(&event);
                callbacks_ref.on_progress(percent, line);
            }
            ProgressStatus::Finished => {
                callbacks_ref.on_status(MSG_MERGING.to_string(), Severity::Warning);
            }
            ProgressStatus::Other(_) => {}
        }
        Ok(())
    };

    match engine.transfer(&transfer, &mut hook).await {
        Ok(()) => {
            let removed = cleanup_part_files(&request.output_dir).await;
            if removed > 0 {
                tracing::debug!("[Manager] {} removed {} leftover .part files", op, removed);
            }
            tracing::info!("[Manager] {} download complete", op);
            callbacks.on_done();
        }
        Err(EngineError::Cancelled) => {
            tracing::info!("[Manager] {} download cancelled", op);
            callbacks.on_status(MSG_CANCELLED.to_string(), Severity::Warning);
        }
        Err(EngineError::Transfer(detail)) | Err(EngineError::Extraction(detail)) => {
            tracing::info!("[Manager] {} download failed: {}", op, detail);
            callbacks.on_error(format!("download failed: {}", detail));
        }
        Err(err) => {
            tracing::error!("[Manager] {} download failed unexpectedly: {}", op, err);
            callbacks.on_error(describe_unexpected(err));
        }
    }
}

/// Engine request for one download: selector chain, output template and
/// the merge-step settings.
pub fn build_transfer_request(request: &DownloadRequest, ffmpeg_location: Option<PathBuf>) -> TransferRequest {
    TransferRequest {
        url: request.url.clone(),
        format_selector: FormatSelector::selector_chain(&request.format_id, request.height),
        output_template: request
            .output_dir
            .join("%(title)s.%(ext)s")
            .to_string_lossy()
            .to_string(),
        merge_output_format: MERGE_CONTAINER.to_string(),
        keep_intermediates: false,
        merger_args: MERGE_FFMPEG_ARGS.iter().map(|a| a.to_string()).collect(),
        ffmpeg_location,
    }
}

/// Percentage and status line for a `Downloading` event
pub fn progress_line(event: &ProgressEvent) -> (u8, String) {
    let percent = event.percent();
    let mut line = format!("downloading {}%  {}", percent, format_rate(event.speed));
    if let Some(eta) = event.eta.filter(|e| *e > 0) {
        line.push_str(&format!("  ETA {}s", eta));
    }
    (percent, line)
}

fn describe_unexpected(err: EngineError) -> String {
    match err {
        EngineError::Unexpected { detail, diagnostic } => {
            format!("unexpected error: {}\n\n{}", detail, diagnostic)
        }
        other => describe_unexpected(EngineError::unexpected_msg(other.to_string())),
    }
}

fn join_error_detail(err: JoinError) -> String {
    if err.is_cancelled() {
        return "worker task was cancelled".to_string();
    }
    format!("worker panicked: {}", panic_message(err.into_panic()))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
