// Callback traits for manager operations

use tokio::sync::mpsc::UnboundedSender;

use super::models::{MediaInfo, Severity, StreamVariant};

/// Receives the single outcome of a `fetch_formats` call.
///
/// Invoked on the worker task, never on the caller's thread.
pub trait FetchCallbacks: Send + Sync + 'static {
    fn on_success(&self, variants: Vec<StreamVariant>, info: MediaInfo);
    fn on_error(&self, message: String);
}

/// Receives progress and the terminal outcome of a `download` call.
///
/// At most one of `on_done` / `on_error` fires; a cancelled download ends
/// with an `on_status` warning instead.
pub trait DownloadCallbacks: Send + Sync + 'static {
    fn on_progress(&self, percent: u8, status_line: String);
    fn on_status(&self, message: String, severity: Severity);
    fn on_done(&self);
    fn on_error(&self, message: String);
}

/// Everything a manager operation can report
#[derive(Debug, Clone, PartialEq)]
pub enum ManagerEvent {
    FormatsReady {
        variants: Vec<StreamVariant>,
        info: MediaInfo,
    },
    FetchFailed(String),
    Progress {
        percent: u8,
        status_line: String,
    },
    Status {
        message: String,
        severity: Severity,
    },
    Done,
    DownloadFailed(String),
}

/// Forwards callbacks onto a channel so a single-threaded consumer can
/// handle them in order.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: UnboundedSender<ManagerEvent>,
}

impl EventEmitter {
    pub fn new(tx: UnboundedSender<ManagerEvent>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, event: ManagerEvent) {
        // receiver gone means nobody is listening any more
        let _ = self.tx.send(event);
    }
}

impl FetchCallbacks for EventEmitter {
    fn on_success(&self, variants: Vec<StreamVariant>, info: MediaInfo) {
        self.emit(ManagerEvent::FormatsReady { variants, info });
    }

    fn on_error(&self, message: String) {
        self.emit(ManagerEvent::FetchFailed(message));
    }
}

impl DownloadCallbacks for EventEmitter {
    fn on_progress(&self, percent: u8, status_line: String) {
        self.emit(ManagerEvent::Progress { percent, status_line });
    }

    fn on_status(&self, message: String, severity: Severity) {
        self.emit(ManagerEvent::Status { message, severity });
    }

    fn on_done(&self) {
        self.emit(ManagerEvent::Done);
    }

    fn on_error(&self, message: String) {
        self.emit(ManagerEvent::DownloadFailed(message));
    }
}
