use std::io::Write;

use colored::Colorize;
use media_grabber_lib::utils::format_duration;
use media_grabber_lib::{MediaInfo, Severity, StreamVariant, Thumbnail, ToolInfo};

/// Appearance settings the terminal surface is built with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceOptions {
    pub color: bool,
}

impl SurfaceOptions {
    /// Color only when stdout is a terminal and it was not switched off
    pub fn detect(no_color: bool) -> Self {
        use std::io::IsTerminal;
        Self {
            color: !no_color && std::io::stdout().is_terminal(),
        }
    }
}

pub struct OutputManager {
    options: SurfaceOptions,
    progress_visible: bool,
}

impl OutputManager {
    pub fn new(options: SurfaceOptions) -> Self {
        Self {
            options,
            progress_visible: false,
        }
    }

    pub fn format_media_info(&self, info: &MediaInfo, variants: &[StreamVariant]) -> String {
        let mut out = String::new();
        out.push_str(&format!("{} {}\n", self.paint("Title:", Severity::Info, true), info.title));
        if let Some(uploader) = &info.uploader {
            out.push_str(&format!("{} {}\n", self.paint("Uploader:", Severity::Info, true), uploader));
        }
        if let Some(duration) = info.duration {
            out.push_str(&format!(
                "{} {}\n",
                self.paint("Duration:", Severity::Info, true),
                format_duration(duration)
            ));
        }

        if variants.is_empty() {
            out.push_str(&self.paint("no video variants found", Severity::Warning, false));
            out.push('\n');
            return out;
        }

        out.push('\n');
        for (i, variant) in variants.iter().enumerate() {
            out.push_str(&format!("{:>3}. [{:>6}] {}\n", i + 1, variant.format_id, variant.label));
        }
        out
    }

    pub fn format_thumbnail(&self, thumb: Option<&Thumbnail>) -> String {
        match thumb {
            Some(t) => format!("thumbnail: {}x{} ({} bytes RGBA)", t.width, t.height, t.rgba.len()),
            None => "thumbnail: unavailable".to_string(),
        }
    }

    pub fn format_tool(&self, tool: &ToolInfo) -> String {
        let state = if tool.is_available {
            self.paint("found", Severity::Success, true)
        } else {
            self.paint("missing", Severity::Error, true)
        };
        let path = tool
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{:<8} {:<8} {:<24} {}",
            tool.name,
            state,
            tool.version.as_deref().unwrap_or("-"),
            path
        )
    }

    /// Rewrite the single live progress line
    pub fn progress(&mut self, percent: u8, line: &str) {
        let bar_width = 30;
        let filled = (percent as usize * bar_width) / 100;
        let bar = format!("[{}{}]", "#".repeat(filled), "-".repeat(bar_width - filled));
        print!("\r{} {}\x1b[K", bar, line);
        let _ = std::io::stdout().flush();
        self.progress_visible = true;
    }

    pub fn status(&mut self, message: &str, severity: Severity) {
        self.end_progress();
        println!("{}", self.paint(message, severity, severity == Severity::Error));
    }

    pub fn end_progress(&mut self) {
        if self.progress_visible {
            println!();
            self.progress_visible = false;
        }
    }

    pub fn paint(&self, text: &str, severity: Severity, bold: bool) -> String {
        if !self.options.color {
            return text.to_string();
        }
        let painted = match severity {
            Severity::Info => text.cyan(),
            Severity::Success => text.green(),
            Severity::Warning => text.yellow(),
            Severity::Error => text.red(),
        };
        if bold {
            painted.bold().to_string()
        } else {
            painted.to_string()
        }
    }
}
