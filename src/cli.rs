use std::path::PathBuf;

use clap::{Parser, Subcommand};
use media_grabber_lib::StreamVariant;

#[derive(Parser, Debug)]
#[command(name = "media-grabber")]
#[command(about = "Fetch stream variants and download merged audio+video files")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Proxy URL (http/https/socks5)
    #[arg(long, global = true, env = "MEDIA_GRABBER_PROXY")]
    pub proxy: Option<String>,

    /// Explicit yt-dlp binary
    #[arg(long, global = true, env = "YTDLP_PATH")]
    pub ytdlp: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the downloadable video variants of a URL
    Formats {
        url: String,

        /// Also fetch the preview thumbnail
        #[arg(long)]
        thumbnail: bool,
    },

    /// Download one variant merged with the best audio into an MP4
    Download {
        url: String,

        /// Format ID of the variant to download
        #[arg(short, long)]
        format: Option<String>,

        /// Pick the first variant with this height
        #[arg(long, conflicts_with = "format")]
        height: Option<u32>,

        /// Output directory (defaults to the user's download directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show yt-dlp and ffmpeg detection status
    Tools,
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Input(String),

    #[error("{0}")]
    Fetch(String),

    #[error("{0}")]
    Download(String),

    #[error("download cancelled")]
    Cancelled,

    #[error("worker stopped without reporting a result")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Reject input the manager should never see
pub fn validate_url(url: &str) -> Result<&str> {
    let url = url.trim();
    if url.is_empty() {
        return Err(CliError::Input("please enter a URL".to_string()));
    }
    Ok(url)
}

/// Variant by format ID, else the first with matching height, else the top one
pub fn select_variant<'a>(
    variants: &'a [StreamVariant],
    format: Option<&str>,
    height: Option<u32>,
) -> Option<&'a StreamVariant> {
    format
        .and_then(|id| variants.iter().find(|v| v.format_id == id))
        .or_else(|| height.and_then(|h| variants.iter().find(|v| v.height == h)))
        .or_else(|| variants.first())
}
