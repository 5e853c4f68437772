use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use super::errors::ToolError;

lazy_static::lazy_static! {
    static ref FFMPEG_PATH: Option<PathBuf> = BinaryLocator::ffmpeg().locate();
    static ref YTDLP_PATH: Option<PathBuf> = BinaryLocator::ytdlp().locate();
}

/// Process-wide ffmpeg path, resolved on first use
pub fn ffmpeg_path() -> Option<&'static Path> {
    FFMPEG_PATH.as_deref()
}

/// Directory holding the cached ffmpeg binary (what `--ffmpeg-location` expects)
pub fn ffmpeg_dir() -> Option<PathBuf> {
    ffmpeg_path().and_then(|p| p.parent()).map(Path::to_path_buf)
}

/// Process-wide yt-dlp path, resolved on first use
pub fn ytdlp_path() -> Option<&'static Path> {
    YTDLP_PATH.as_deref()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    YtDlp,
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "yt-dlp",
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    /// Executable file name on this platform
    pub fn binary_name(&self) -> String {
        if cfg!(windows) {
            format!("{}.exe", self.as_str())
        } else {
            self.as_str().to_string()
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::YtDlp => "--version",
            ToolType::Ffmpeg => "-version", // ffmpeg uses a single dash
        }
    }
}

/// Resolves an external binary: search path first, then well-known locations.
#[derive(Debug, Clone)]
pub struct BinaryLocator {
    binary_name: String,
    search_path: Option<OsString>,
    candidates: Vec<PathBuf>,
}

impl BinaryLocator {
    pub fn new(binary_name: impl Into<String>) -> Self {
        Self {
            binary_name: binary_name.into(),
            search_path: None,
            candidates: Vec::new(),
        }
    }

    /// Locator for ffmpeg using `PATH` and the default install locations
    pub fn ffmpeg() -> Self {
        Self::for_tool(ToolType::Ffmpeg)
    }

    /// Locator for yt-dlp using `PATH` and the default install locations
    pub fn ytdlp() -> Self {
        Self::for_tool(ToolType::YtDlp)
    }

    fn for_tool(tool: ToolType) -> Self {
        let name = tool.binary_name();
        let candidates = default_candidates(tool.as_str(), &name);
        Self::new(name)
            .with_search_path(std::env::var_os("PATH"))
            .with_candidates(candidates)
    }

    pub fn with_search_path(mut self, search_path: Option<OsString>) -> Self {
        self.search_path = search_path;
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<PathBuf>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn binary_name(&self) -> &str {
        &self.binary_name
    }

    /// Absolute path of the binary, or `None` when it is nowhere to be found.
    pub fn locate(&self) -> Option<PathBuf> {
        if let Some(search_path) = self.search_path.as_ref().filter(|p| !p.is_empty()) {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            if let Ok(found) = which::which_in(&self.binary_name, Some(search_path), cwd) {
                tracing::debug!("[Locator] {} found on search path: {}", self.binary_name, found.display());
                return Some(found);
            }
        }

        let found = self.candidates.iter().find(|c| c.is_file()).cloned();
        match &found {
            Some(path) => tracing::debug!("[Locator] {} found at {}", self.binary_name, path.display()),
            None => tracing::debug!("[Locator] {} not found", self.binary_name),
        }
        found
    }
}

/// Well-known install locations, searched in order
fn default_candidates(tool: &str, binary_name: &str) -> Vec<PathBuf> {
    let mut search_dirs: Vec<PathBuf> = Vec::new();

    // next to the running executable, then the app's own install dir
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        search_dirs.push(exe_dir.join(tool).join("bin"));
        if let Some(install_dir) = exe_dir.parent() {
            search_dirs.push(install_dir.join(tool).join("bin"));
        }
        search_dirs.insert(0, exe_dir);
    }

    if cfg!(windows) {
        search_dirs.push(PathBuf::from(format!(r"C:\{}\bin", tool)));
        search_dirs.push(PathBuf::from(format!(r"C:\Program Files\{}\bin", tool)));
        search_dirs.push(PathBuf::from(format!(r"C:\Program Files (x86)\{}\bin", tool)));
    } else {
        search_dirs.push(PathBuf::from("/opt/homebrew/bin")); // Homebrew on Apple Silicon
        search_dirs.push(PathBuf::from("/usr/local/bin"));
        search_dirs.push(PathBuf::from("/usr/bin"));
    }

    if let Some(home) = dirs::home_dir() {
        search_dirs.push(home.join(tool).join("bin"));
        search_dirs.push(home.join("Downloads").join(tool).join("bin"));
    }

    search_dirs
        .into_iter()
        .map(|dir| dir.join(binary_name))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<PathBuf>,
    pub is_available: bool,
}

pub struct ToolManager;

impl ToolManager {
    pub fn new() -> Self {
        Self
    }

    pub async fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let path = match tool_type {
            ToolType::YtDlp => ytdlp_path(),
            ToolType::Ffmpeg => ffmpeg_path(),
        }
        .map(Path::to_path_buf);

        let version = match &path {
            Some(p) => match self.get_version(p, tool_type).await {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::debug!("[Tools] {}", e);
                    None
                }
            },
            None => None,
        };

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            version,
            is_available: path.is_some(),
            path,
        }
    }

    pub async fn get_all_tools(&self) -> Vec<ToolInfo> {
        vec![
            self.get_tool_info(ToolType::YtDlp).await,
            self.get_tool_info(ToolType::Ffmpeg).await,
        ]
    }

    /// First line of `<tool> --version` (or `-version` for ffmpeg)
    pub async fn get_version(&self, path: &Path, tool_type: ToolType) -> Result<String, ToolError> {
        let output = Command::new(path)
            .arg(tool_type.version_arg())
            .output()
            .await
            .map_err(|source| ToolError::Execution {
                tool: tool_type.as_str().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ToolError::Failed {
                tool: path.display().to_string(),
                status: output.status,
                detail: stderr.lines().next().unwrap_or("").trim().to_string(),
            });
        }

        let out = String::from_utf8_lossy(&output.stdout);
        Ok(out.lines().next().unwrap_or("").trim().to_string())
    }
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    #[test]
    fn test_nothing_found() {
        let dir = tempfile::tempdir().unwrap();
        let locator = BinaryLocator::new("ffmpeg")
            .with_search_path(Some(OsString::new()))
            .with_candidates(vec![dir.path().join("missing").join("ffmpeg")]);
        assert_eq!(locator.locate(), None);
    }

    #[test]
    fn test_search_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let on_path = dir.path().join("bin").join("ffmpeg");
        let candidate = dir.path().join("opt").join("ffmpeg");
        touch(&on_path);
        touch(&candidate);

        let locator = BinaryLocator::new("ffmpeg")
            .with_search_path(Some(dir.path().join("bin").into_os_string()))
            .with_candidates(vec![candidate]);
        assert_eq!(locator.locate(), Some(on_path));
    }

    #[test]
    fn test_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a").join("ffmpeg");
        let second = dir.path().join("b").join("ffmpeg");
        let third = dir.path().join("c").join("ffmpeg");
        touch(&second);
        touch(&third);

        let locator = BinaryLocator::new("ffmpeg")
            .with_search_path(None)
            .with_candidates(vec![first, second.clone(), third]);
        assert_eq!(locator.locate(), Some(second));
    }

    #[test]
    fn test_directory_is_not_a_binary() {
        let dir = tempfile::tempdir().unwrap();
        let as_dir = dir.path().join("ffmpeg");
        std::fs::create_dir_all(&as_dir).unwrap();

        let locator = BinaryLocator::new("ffmpeg").with_candidates(vec![as_dir]);
        assert_eq!(locator.locate(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_version_check_nonzero_exit_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("ffmpeg");
        touch(&script);
        std::fs::write(&script, "#!/bin/sh\necho 'broken install' >&2\nexit 3\n").unwrap();

        let err = ToolManager::new()
            .get_version(&script, ToolType::Ffmpeg)
            .await
            .unwrap_err();
        match err {
            ToolError::Failed { status, detail, .. } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(detail, "broken install");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_version_check_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("yt-dlp");
        touch(&script);
        std::fs::write(&script, "#!/bin/sh\necho '2024.08.06'\necho extra\n").unwrap();

        let version = ToolManager::new()
            .get_version(&script, ToolType::YtDlp)
            .await
            .unwrap();
        assert_eq!(version, "2024.08.06");
    }

    #[test]
    fn test_default_candidates_end_with_binary_name() {
        let candidates = default_candidates("ffmpeg", "ffmpeg");
        assert!(!candidates.is_empty());
        assert!(candidates.iter().all(|c| c.file_name().unwrap() == "ffmpeg"));
    }
}
