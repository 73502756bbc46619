use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop a whole run. Everything else is caught per item.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("work list not found at {}", path.display())]
    WorkListMissing { path: PathBuf },

    #[error("could not read work list at {}: {source}", path.display())]
    WorkListRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("work list at {} is not a valid JSON array of videos: {source}", path.display())]
    WorkListInvalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not create download folder {}: {source}", path.display())]
    DestDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to save progress to {}: {source:#}", path.display())]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Tool(#[from] FetchError),
}

/// Errors raised by the external downloader that no later item could survive.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("`{program}` could not be started: {source}")]
    ToolMissing {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` is installed but not usable: {detail}")]
    ToolUnusable { program: String, detail: String },
}

impl DriverError {
    /// Operator-facing instructions printed before exiting.
    pub fn remediation(&self) -> Vec<String> {
        match self {
            DriverError::WorkListMissing { path } => vec![
                "Make sure the video list file is next to this program,".to_string(),
                format!("or pass its location with --list. Expected: {}", path.display()),
            ],
            DriverError::WorkListRead { path, .. } | DriverError::WorkListInvalid { path, .. } => {
                vec![format!(
                    "Check that {} is a JSON array of video entries.",
                    path.display()
                )]
            }
            DriverError::DestDir { .. } => {
                vec!["Pick a writable download folder with --dest.".to_string()]
            }
            DriverError::Checkpoint { .. } => vec![
                "Progress up to the previous video is saved.".to_string(),
                "Free some disk space or fix permissions, then run again.".to_string(),
            ],
            DriverError::Tool(FetchError::ToolMissing { program, .. })
            | DriverError::Tool(FetchError::ToolUnusable { program, .. }) => vec![
                format!("Install {program} and make sure it is on PATH:"),
                "   pip install yt-dlp".to_string(),
                "or point to the executable with --yt-dlp / YTDLP_BIN.".to_string(),
            ],
        }
    }
}
