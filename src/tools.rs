use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::QualityPolicy;
use crate::download::Quality;
use crate::error::FetchError;

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Usable ffmpeg install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ffmpeg {
    /// Directory for `--ffmpeg-location`. `None` when ffmpeg is on PATH.
    pub location: Option<PathBuf>,
}

/// Run `<program> --version` and return what it prints.
pub async fn probe_downloader(program: &str) -> Result<String, FetchError> {
    info!("Checking {} --version", program);

    let run = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = match timeout(PROBE_TIMEOUT, run).await {
        Ok(Ok(output)) => output,
        Ok(Err(e))
            if matches!(
                e.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
            ) =>
        {
            return Err(FetchError::ToolMissing {
                program: program.to_string(),
                source: e,
            });
        }
        Ok(Err(e)) => {
            return Err(FetchError::ToolUnusable {
                program: program.to_string(),
                detail: e.to_string(),
            });
        }
        Err(_) => {
            return Err(FetchError::ToolUnusable {
                program: program.to_string(),
                detail: format!("no answer to --version within {}s", PROBE_TIMEOUT.as_secs()),
            });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FetchError::ToolUnusable {
            program: program.to_string(),
            detail: format!("--version exited with {}: {}", output.status, stderr.trim()),
        });
    }

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    debug!("{} version {}", program, version);
    Ok(version)
}

/// Locate ffmpeg, preferring an explicitly configured executable.
pub async fn find_ffmpeg(explicit: Option<&Path>) -> Option<Ffmpeg> {
    if let Some(path) = explicit {
        if path.exists() {
            let location = if path.is_dir() {
                path.to_path_buf()
            } else {
                ffmpeg_dir(path)
            };
            info!("Using configured ffmpeg at {}", path.display());
            return Some(Ffmpeg {
                location: Some(location),
            });
        }
        warn!("Configured ffmpeg {} does not exist", path.display());
    }

    let run = Command::new("ffmpeg")
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    match timeout(PROBE_TIMEOUT, run).await {
        Ok(Ok(status)) if status.success() => {
            info!("ffmpeg found on PATH");
            Some(Ffmpeg { location: None })
        }
        Ok(Ok(status)) => {
            warn!("ffmpeg -version exited with {}", status);
            None
        }
        Ok(Err(e)) => {
            debug!("ffmpeg not available: {}", e);
            None
        }
        Err(_) => {
            warn!("ffmpeg -version did not answer in time");
            None
        }
    }
}

/// Directory holding an ffmpeg executable; a bare file name means `.`.
fn ffmpeg_dir(exe: &Path) -> PathBuf {
    match exe.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

pub fn resolve_quality(policy: QualityPolicy, ffmpeg: Option<&Ffmpeg>) -> Quality {
    match policy {
        QualityPolicy::High => Quality::High,
        QualityPolicy::Standard => Quality::Standard,
        QualityPolicy::Auto if ffmpeg.is_some() => Quality::High,
        QualityPolicy::Auto => Quality::Standard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_quality_follows_ffmpeg() {
        let on_path = Ffmpeg { location: None };
        assert_eq!(resolve_quality(QualityPolicy::Auto, Some(&on_path)), Quality::High);
        assert_eq!(resolve_quality(QualityPolicy::Auto, None), Quality::Standard);
        assert_eq!(resolve_quality(QualityPolicy::High, None), Quality::High);
        assert_eq!(
            resolve_quality(QualityPolicy::Standard, Some(&on_path)),
            Quality::Standard
        );
    }

    #[test]
    fn bare_ffmpeg_name_lives_in_current_dir() {
        assert_eq!(ffmpeg_dir(Path::new("ffmpeg")), PathBuf::from("."));
        assert_eq!(
            ffmpeg_dir(Path::new("/opt/ffmpeg/bin/ffmpeg")),
            PathBuf::from("/opt/ffmpeg/bin")
        );
    }

    #[tokio::test]
    async fn explicit_ffmpeg_binary_yields_its_directory() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("ffmpeg");
        std::fs::write(&exe, b"").unwrap();

        let found = find_ffmpeg(Some(&exe)).await;
        assert_eq!(
            found,
            Some(Ffmpeg {
                location: Some(dir.path().to_path_buf())
            })
        );
    }

    #[tokio::test]
    async fn probing_a_missing_downloader_reports_tool_missing() {
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("absent-yt-dlp");
        let result = probe_downloader(&program.to_string_lossy()).await;
        assert!(matches!(result, Err(FetchError::ToolMissing { .. })));
    }
}
