use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use media_grabber_lib::engine::ProgressHook;
use media_grabber_lib::models::{ProgressStatus, RawFormat};
use media_grabber_lib::{
    BinaryLocator, DownloadManager, DownloadRequest, EngineError, EventEmitter, ManagerEvent,
    MediaEngine, MediaInfo, ProgressEvent, Severity, TransferRequest,
};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Behaves like the real tool: merging needs an ffmpeg location.
struct MergingEngine {
    formats: Vec<RawFormat>,
}

#[async_trait]
impl MediaEngine for MergingEngine {
    fn name(&self) -> &'static str {
        "merging"
    }

    async fn extract_info(&self, _url: &str) -> Result<Option<MediaInfo>, EngineError> {
        Ok(Some(MediaInfo {
            title: "Sample".to_string(),
            formats: self.formats.clone(),
            ..Default::default()
        }))
    }

    async fn transfer(
        &self,
        request: &TransferRequest,
        hook: &mut ProgressHook<'_>,
    ) -> Result<(), EngineError> {
        hook(ProgressEvent {
            downloaded_bytes: Some(1_000),
            total_bytes: Some(1_000),
            ..ProgressEvent::new(ProgressStatus::Downloading)
        })?;
        hook(ProgressEvent::new(ProgressStatus::Finished))?;

        match &request.ffmpeg_location {
            Some(_) => Ok(()),
            None => Err(EngineError::Transfer(
                "ERROR: You have requested merging of multiple formats but ffmpeg is not installed"
                    .to_string(),
            )),
        }
    }
}

fn raw(id: &str, height: u32, fps: f64, vcodec: &str) -> RawFormat {
    RawFormat {
        format_id: Some(id.to_string()),
        ext: Some("mp4".to_string()),
        height: Some(height),
        fps: Some(fps),
        vcodec: Some(vcodec.to_string()),
        ..Default::default()
    }
}

fn engine() -> Arc<MergingEngine> {
    Arc::new(MergingEngine {
        formats: vec![
            raw("137", 1080, 30.0, "avc1"),
            raw("136", 720, 30.0, "avc1"),
            raw("140", 1080, 0.0, "none"),
        ],
    })
}

async fn drain(mut rx: UnboundedReceiver<ManagerEvent>) -> Vec<ManagerEvent> {
    let mut events = Vec::new();
    while let Some(event) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("worker did not finish")
    {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_fetch_returns_two_variants_highest_first() {
    let manager = DownloadManager::new(engine(), Handle::current());
    let (tx, rx) = mpsc::unbounded_channel();
    manager.fetch_formats("https://example.com/v", EventEmitter::new(tx));

    let events = drain(rx).await;
    let [ManagerEvent::FormatsReady { variants, .. }] = events.as_slice() else {
        panic!("unexpected events: {:?}", events);
    };
    assert_eq!(variants.len(), 2);
    assert_eq!(variants[0].height, 1080);
    assert_eq!(variants[0].format_id, "137");
    assert_eq!(variants[1].height, 720);
}

#[tokio::test]
async fn test_download_without_ffmpeg_fails_at_merge() {
    let dir = tempfile::tempdir().unwrap();

    let ffmpeg = BinaryLocator::new("ffmpeg")
        .with_search_path(Some(OsString::new()))
        .with_candidates(Vec::new())
        .locate();
    assert_eq!(ffmpeg, None);

    let manager = DownloadManager::new(engine(), Handle::current()).with_ffmpeg_location(ffmpeg);

    let (tx, rx) = mpsc::unbounded_channel();
    manager.fetch_formats("https://example.com/v", EventEmitter::new(tx));
    let events = drain(rx).await;
    let [ManagerEvent::FormatsReady { variants, .. }] = events.as_slice() else {
        panic!("unexpected events: {:?}", events);
    };

    let (tx, rx) = mpsc::unbounded_channel();
    manager.download(
        DownloadRequest::new("https://example.com/v", &variants[0], dir.path()),
        EventEmitter::new(tx),
    );

    let events = drain(rx).await;
    assert!(events.contains(&ManagerEvent::Status {
        message: "merging video and audio".to_string(),
        severity: Severity::Warning,
    }));
    match events.last() {
        Some(ManagerEvent::DownloadFailed(msg)) => {
            assert!(msg.starts_with("download failed: "));
            assert!(msg.contains("ffmpeg"));
        }
        other => panic!("unexpected final event: {:?}", other),
    }
    assert!(!events.contains(&ManagerEvent::Done));
}

#[tokio::test]
async fn test_download_with_ffmpeg_completes() {
    let dir = tempfile::tempdir().unwrap();
    let manager = DownloadManager::new(engine(), Handle::current())
        .with_ffmpeg_location(Some(dir.path().to_path_buf()));

    let (tx, rx) = mpsc::unbounded_channel();
    let request = DownloadRequest {
        url: "https://example.com/v".to_string(),
        format_id: "137".to_string(),
        height: 1080,
        output_dir: dir.path().to_path_buf(),
    };
    manager.download(request, EventEmitter::new(tx));

    let events = drain(rx).await;
    assert_eq!(
        events.first(),
        Some(&ManagerEvent::Status {
            message: "starting download".to_string(),
            severity: Severity::Info,
        })
    );
    assert!(events.contains(&ManagerEvent::Progress {
        percent: 100,
        status_line: "downloading 100%  ...".to_string(),
    }));
    assert_eq!(events.last(), Some(&ManagerEvent::Done));
}
