// Helper functions shared by the engine, the manager and the surfaces

use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration as TokioDuration};

/// Failure of [`run_output_with_timeout`]
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read output of {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {0}s")]
    TimedOut(u64),
}

/// Convert a byte count into a human-readable string.
///
/// `None` renders as `"~"`. Units step by 1024 up to TB.
pub fn format_size(bytes: Option<f64>) -> String {
    let mut size = match bytes {
        Some(b) => b,
        None => return "~".to_string(),
    };

    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} TB", size)
}

/// Transfer rate as `"<size>/s"`, or `"..."` when unknown or zero
pub fn format_rate(bytes_per_sec: Option<f64>) -> String {
    match bytes_per_sec {
        Some(speed) if speed > 0.0 => format!("{}/s", format_size(Some(speed))),
        _ => "...".to_string(),
    }
}

/// Duration as `h:mm:ss`, or `m:ss` under an hour
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (m, s) = (total / 60, total % 60);
    let (h, m) = (m / 60, m % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

/// Remove leftover `*.part` files in `dir`.
///
/// Best effort: unreadable directories and failed removals are ignored.
/// Returns how many files were removed.
pub async fn cleanup_part_files(dir: &Path) -> usize {
    let mut removed = 0;
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("[Cleanup] cannot read {}: {}", dir.display(), e);
            return 0;
        }
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "part") {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!("[Cleanup] removed {}", path.display());
                    removed += 1;
                }
                Err(e) => tracing::debug!("[Cleanup] could not remove {}: {}", path.display(), e),
            }
        }
    }

    removed
}

/// Run command with timeout, capturing stdout and stderr
pub async fn run_output_with_timeout(
    program: &Path,
    args: &[String],
    timeout_secs: u64,
) -> Result<std::process::Output, RunError> {
    let name = program.display().to_string();
    let mut child = TokioCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| RunError::Spawn {
            program: name.clone(),
            source,
        })?;

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok::<Vec<u8>, std::io::Error>(buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok::<Vec<u8>, std::io::Error>(buf)
    });

    let io_err = |source: std::io::Error| RunError::Io {
        program: name.clone(),
        source,
    };

    match timeout(TokioDuration::from_secs(timeout_secs), child.wait()).await {
        Ok(status) => {
            let status = status.map_err(io_err)?;
            let stdout = stdout_task
                .await
                .map_err(|e| io_err(std::io::Error::other(e)))?
                .map_err(io_err)?;
            let stderr = stderr_task
                .await
                .map_err(|e| io_err(std::io::Error::other(e)))?
                .map_err(io_err)?;
            Ok(std::process::Output { status, stdout, stderr })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(RunError::TimedOut(timeout_secs))
        }
    }
}
