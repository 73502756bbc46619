//! Resumable batch video downloader.
//!
//! A JSON work list is both the input and the progress record: each pending
//! entry is handed to `yt-dlp` in turn and the list is saved after every
//! entry, so a later run picks up where the last one stopped.

pub mod config;
pub mod console;
pub mod download;
pub mod driver;
pub mod error;
pub mod tools;
pub mod worklist;

pub use download::{DownloadOptions, Fetch, FetchOutcome, Quality, YtDlp};
pub use driver::{BatchDriver, RunReport};
pub use error::{DriverError, FetchError};
pub use worklist::{WorkItem, WorkList};
