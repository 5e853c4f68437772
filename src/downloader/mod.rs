// Downloader module - format normalization, tool lookup and the download manager

pub mod engine;
pub mod errors;
pub mod format_selector;
pub mod manager;
pub mod models;
pub mod thumbnail;
pub mod tools;
pub mod traits;
pub mod utils;

pub use engine::{EngineConfig, MediaEngine, TransferRequest, YtDlpEngine};
pub use errors::{EngineError, ToolError};
pub use format_selector::FormatSelector;
pub use manager::{DownloadManager, OperationId};
pub use models::{DownloadRequest, MediaInfo, ProgressEvent, RawFormat, Severity, StreamVariant};
pub use thumbnail::{fetch_thumbnail, Thumbnail, ThumbnailConfig};
pub use tools::{BinaryLocator, ToolInfo, ToolManager, ToolType};
pub use traits::{DownloadCallbacks, EventEmitter, FetchCallbacks, ManagerEvent};
