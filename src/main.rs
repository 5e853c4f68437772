mod cli;
mod output;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{error, Level};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::cli::{select_variant, validate_url, Args, CliError, Commands, Result};
use crate::output::{OutputManager, SurfaceOptions};
use media_grabber_lib::models::default_output_dir;
use media_grabber_lib::{
    fetch_thumbnail, tools, DownloadManager, DownloadRequest, EngineConfig, EventEmitter,
    ManagerEvent, MediaInfo, Severity, StreamVariant, ThumbnailConfig, ToolManager, YtDlpEngine,
};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let options = SurfaceOptions::detect(args.no_color);
    let mut out = OutputManager::new(options);

    if let Err(e) = run(args, &mut out).await {
        out.end_progress();
        match e {
            CliError::Cancelled => process::exit(130),
            e => {
                error!("{}", e);
                eprintln!("{} {}", out.paint("Error:", Severity::Error, true), e);
                process::exit(1);
            }
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .init();
}

async fn run(args: Args, out: &mut OutputManager) -> Result<()> {
    if tools::ffmpeg_path().is_none() {
        tracing::warn!("ffmpeg not found: downloads that need merging will fail");
    }

    let config = EngineConfig::default()
        .with_ytdlp_path(args.ytdlp)
        .with_proxy(args.proxy.clone());
    let manager = DownloadManager::new(Arc::new(YtDlpEngine::new(config)), Handle::current());

    match args.command {
        Commands::Formats { url, thumbnail } => {
            let url = validate_url(&url)?;
            let (variants, info) = fetch(&manager, url).await?;
            print!("{}", out.format_media_info(&info, &variants));

            if thumbnail {
                let thumb = match &info.thumbnail {
                    Some(thumb_url) => {
                        let config = ThumbnailConfig {
                            proxy: args.proxy,
                            ..Default::default()
                        };
                        fetch_thumbnail(thumb_url, &config).await
                    }
                    None => None,
                };
                println!("{}", out.format_thumbnail(thumb.as_ref()));
            }
        }

        Commands::Download {
            url,
            format,
            height,
            output,
        } => {
            let url = validate_url(&url)?;
            let output_dir = output.unwrap_or_else(default_output_dir);
            if !output_dir.is_dir() {
                return Err(CliError::Input(format!(
                    "output directory does not exist: {}",
                    output_dir.display()
                )));
            }

            let (variants, info) = fetch(&manager, url).await?;
            let variant = select_variant(&variants, format.as_deref(), height)
                .ok_or_else(|| CliError::Input("no video variants to download".to_string()))?;

            out.status(&format!("{}: {}", info.title, variant.label), Severity::Info);
            download(&manager, out, url, variant, output_dir).await?;
        }

        Commands::Tools => {
            for tool in ToolManager::new().get_all_tools().await {
                println!("{}", out.format_tool(&tool));
            }
        }
    }

    Ok(())
}

async fn fetch(manager: &DownloadManager, url: &str) -> Result<(Vec<StreamVariant>, MediaInfo)> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    manager.fetch_formats(url, EventEmitter::new(tx));

    match rx.recv().await {
        Some(ManagerEvent::FormatsReady { variants, info }) => Ok((variants, info)),
        Some(ManagerEvent::FetchFailed(msg)) => Err(CliError::Fetch(msg)),
        Some(other) => Err(CliError::Fetch(format!("unexpected event: {:?}", other))),
        None => Err(CliError::Disconnected),
    }
}

async fn download(
    manager: &DownloadManager,
    out: &mut OutputManager,
    url: &str,
    variant: &StreamVariant,
    output_dir: PathBuf,
) -> Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    manager.download(
        DownloadRequest::new(url, variant, output_dir),
        EventEmitter::new(tx),
    );
    drive_download(manager, out, rx).await
}

/// Event loop for one download; Ctrl-C requests cancellation.
async fn drive_download(
    manager: &DownloadManager,
    out: &mut OutputManager,
    mut rx: UnboundedReceiver<ManagerEvent>,
) -> Result<()> {
    let mut cancelled = false;
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(ManagerEvent::Progress { percent, status_line }) => {
                    out.progress(percent, &status_line);
                }
                Some(ManagerEvent::Status { message, severity }) => {
                    out.status(&message, severity);
                }
                Some(ManagerEvent::Done) => {
                    out.status("download complete", Severity::Success);
                    return Ok(());
                }
                Some(ManagerEvent::DownloadFailed(msg)) => return Err(CliError::Download(msg)),
                Some(other) => tracing::debug!("ignoring {:?}", other),
                // the worker is gone; a cancelled download ends without done/error
                None if cancelled => return Err(CliError::Cancelled),
                None => return Err(CliError::Disconnected),
            },
            _ = tokio::signal::ctrl_c(), if !cancelled => {
                cancelled = true;
                manager.cancel();
            }
        }
    }
}
