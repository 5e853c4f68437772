// Machine-readable progress lines emitted by yt-dlp's --progress-template

use regex::Regex;

use crate::downloader::models::{ProgressEvent, ProgressStatus};

/// Prefix that marks our progress lines on stdout
pub const PROGRESS_MARKER: &str = "media-grabber:";

/// Value for `--progress-template`. Fields are `|`-separated; yt-dlp
/// prints `NA` for missing ones.
pub fn progress_template() -> String {
    format!(
        "download:{}%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|\
         %(progress.total_bytes_estimate)s|%(progress.speed)s|%(progress.eta)s",
        PROGRESS_MARKER
    )
}

/// Parse one stdout line; `None` for anything that is not a progress line.
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    lazy_static::lazy_static! {
        static ref PROGRESS_RE: Regex = Regex::new(
            r"media-grabber:([a-z_]+)\|([^|]*)\|([^|]*)\|([^|]*)\|([^|]*)\|([^|]*)\s*$"
        ).unwrap();
    }

    let caps = PROGRESS_RE.captures(line)?;
    let field = |i: usize| {
        caps.get(i)
            .map(|m| m.as_str().trim())
            .filter(|s| !s.is_empty() && *s != "NA" && *s != "None")
    };

    Some(ProgressEvent {
        status: ProgressStatus::parse(caps.get(1)?.as_str()),
        downloaded_bytes: field(2).and_then(parse_u64),
        total_bytes: field(3).and_then(parse_u64),
        total_bytes_estimate: field(4).and_then(|s| s.parse::<f64>().ok()),
        speed: field(5).and_then(|s| s.parse::<f64>().ok()),
        eta: field(6).and_then(parse_u64),
    })
}

// yt-dlp may print integral counters as floats ("1024.0")
fn parse_u64(s: &str) -> Option<u64> {
    s.parse::<u64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u64))
}
