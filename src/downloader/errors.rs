// Error types for the extraction/transfer engine and tool lookups

use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt::Write as _;

/// Failure reported by a [`MediaEngine`](super::engine::MediaEngine).
///
/// The variants mirror the outcome classes the manager routes to callbacks:
/// extraction failures and transfer failures carry the engine's own message,
/// cancellation is a normal outcome, and everything else is unexpected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// Recognized failure while extracting metadata
    #[error("{0}")]
    Extraction(String),

    /// Recognized failure while transferring or merging streams
    #[error("{0}")]
    Transfer(String),

    /// Transfer aborted by the progress hook
    #[error("cancelled by user")]
    Cancelled,

    /// Anything not matching a known class
    #[error("{detail}")]
    Unexpected { detail: String, diagnostic: String },
}

impl EngineError {
    /// Wrap an arbitrary error, capturing its source chain and a backtrace.
    pub fn unexpected<E>(err: E) -> Self
    where
        E: StdError,
    {
        let detail = err.to_string();
        let mut diagnostic = String::new();

        let mut source = err.source();
        while let Some(cause) = source {
            let _ = writeln!(diagnostic, "caused by: {}", cause);
            source = cause.source();
        }

        let _ = write!(diagnostic, "{}", Backtrace::force_capture());

        Self::Unexpected { detail, diagnostic }
    }

    /// Unexpected failure with a plain message (e.g. a worker panic).
    pub fn unexpected_msg(detail: impl Into<String>) -> Self {
        Self::Unexpected {
            detail: detail.into(),
            diagnostic: Backtrace::force_capture().to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Marker returned by a progress hook to abort the running transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cancelled by user")]
pub struct Cancelled;

impl From<Cancelled> for EngineError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// Failure while probing an external tool
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{tool} exited with {status}: {detail}")]
    Failed {
        tool: String,
        status: std::process::ExitStatus,
        detail: String,
    },

    #[error("failed to run {tool}: {source}")]
    Execution {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

/// Keep the lines yt-dlp flags as errors; fall back to the last non-empty line.
pub fn summarize_stderr(stderr: &str) -> String {
    let important: Vec<&str> = stderr
        .lines()
        .map(|l| l.trim())
        .filter(|l| l.starts_with("ERROR:"))
        .collect();

    if !important.is_empty() {
        return important.join("\n");
    }

    stderr
        .lines()
        .rev()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .unwrap_or("unknown error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_keeps_error_lines() {
        let stderr = "WARNING: something\nERROR: [youtube] abc: Private video\nmore noise\n";
        assert_eq!(summarize_stderr(stderr), "ERROR: [youtube] abc: Private video");
    }

    #[test]
    fn test_summarize_falls_back_to_last_line() {
        let stderr = "first\nsecond\n\n";
        assert_eq!(summarize_stderr(stderr), "second");
        assert_eq!(summarize_stderr(""), "unknown error");
    }

    #[test]
    fn test_unexpected_captures_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let tool = ToolError::Execution {
            tool: "yt-dlp".to_string(),
            source: io,
        };
        match EngineError::unexpected(tool) {
            EngineError::Unexpected { detail, diagnostic } => {
                assert!(detail.starts_with("failed to run yt-dlp"));
                assert!(diagnostic.contains("caused by: no such file"));
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_converts() {
        let err: EngineError = Cancelled.into();
        assert!(err.is_cancelled());
    }
}
