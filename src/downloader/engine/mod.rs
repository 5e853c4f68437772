// Engine module - metadata extraction and stream transfer
//
// The `MediaEngine` trait is the seam between the manager and the external
// extraction tool. `YtDlpEngine` drives the yt-dlp binary; tests plug in
// scripted engines.

mod progress;
mod traits;
mod ytdlp;

pub use progress::{parse_progress_line, progress_template};
pub use traits::{EngineConfig, MediaEngine, ProgressHook, TransferRequest};
pub use ytdlp::{YtDlpEngine, YTDLP_PATH_ENV};
