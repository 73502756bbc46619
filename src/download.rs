use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::FetchError;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const OUTPUT_TEMPLATE: &str = "%(title)s [%(id)s].%(ext)s";
const HIGH_FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";
const STANDARD_FORMAT: &str = "best[ext=mp4]/best";
const CONCURRENT_FRAGMENTS: u32 = 4;

/// Bytes of child output kept per stream for classification.
const TAIL_BYTES: usize = 8 * 1024;
const DIAGNOSTIC_CHARS: usize = 300;
/// How long to wait for the output pumps once the child has exited.
const DRAIN_GRACE: Duration = Duration::from_secs(5);

pub fn source_url(fetch_id: &str) -> String {
    format!("{}{}", WATCH_URL, fetch_id)
}

/// Format selection mode, decided by ffmpeg availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    /// Best video and audio streams, merged into one mp4.
    High,
    /// A pre-muxed single stream, no ffmpeg needed.
    Standard,
}

impl Quality {
    pub fn format_selector(self) -> &'static str {
        match self {
            Quality::High => HIGH_FORMAT,
            Quality::Standard => STANDARD_FORMAT,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Quality::High => "HIGH (best video + audio, merged)",
            Quality::Standard => "STANDARD (720p, single file)",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub program: String,
    pub quality: Quality,
    /// Directory passed to `--ffmpeg-location`, when ffmpeg is not on PATH.
    pub ffmpeg_location: Option<PathBuf>,
    pub retries: u32,
    pub timeout: Duration,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            program: "yt-dlp".to_string(),
            quality: Quality::Standard,
            ffmpeg_location: None,
            retries: 3,
            timeout: Duration::from_secs(600),
        }
    }
}

/// Result of one invocation that did not abort the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded,
    /// Non-zero exit, but the tool said the file was already there.
    AlreadyPresent,
    Failed {
        code: Option<i32>,
        message: String,
    },
    TimedOut {
        after: Duration,
    },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Downloaded | FetchOutcome::AlreadyPresent)
    }
}

/// One download attempt for one source URL.
#[async_trait]
pub trait Fetch {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<FetchOutcome, FetchError>;
}

/// Drives the yt-dlp executable.
#[derive(Debug, Clone)]
pub struct YtDlp {
    options: DownloadOptions,
}

impl YtDlp {
    pub fn new(options: DownloadOptions) -> Self {
        Self { options }
    }

    pub fn build_args(&self, url: &str, dest: &Path) -> Vec<String> {
        let output_template = dest.join(OUTPUT_TEMPLATE);
        let retries = self.options.retries.to_string();

        let mut args: Vec<String> = vec![
            "--quiet".into(),
            "--progress".into(),
            "--no-warnings".into(),
            "-f".into(),
            self.options.quality.format_selector().into(),
        ];

        if self.options.quality == Quality::High {
            args.push("--merge-output-format".into());
            args.push("mp4".into());
        }

        args.extend([
            "-o".to_string(),
            output_template.to_string_lossy().into_owned(),
            "--no-overwrites".to_string(),
            "--retries".to_string(),
            retries.clone(),
            "--fragment-retries".to_string(),
            retries,
        ]);

        if self.options.quality == Quality::High {
            if let Some(location) = &self.options.ffmpeg_location {
                args.push("--ffmpeg-location".into());
                args.push(location.to_string_lossy().into_owned());
            }
            args.push("--concurrent-fragments".into());
            args.push(CONCURRENT_FRAGMENTS.to_string());
        }

        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl Fetch for YtDlp {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<FetchOutcome, FetchError> {
        let program = &self.options.program;
        let args = self.build_args(url, dest);
        debug!("Running {} {:?}", program, args);

        let spawned = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) if is_launch_failure(&e) => {
                return Err(FetchError::ToolMissing {
                    program: program.clone(),
                    source: e,
                });
            }
            Err(e) => {
                warn!("Failed to start {}: {}", program, e);
                return Ok(FetchOutcome::Failed {
                    code: None,
                    message: e.to_string(),
                });
            }
        };

        let out_pump = child
            .stdout
            .take()
            .map(|out| tokio::spawn(pump(out, tokio::io::stdout())));
        let err_pump = child
            .stderr
            .take()
            .map(|err| tokio::spawn(pump(err, tokio::io::stderr())));

        let status = match timeout(self.options.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                warn!("Failed waiting for {}: {}", program, e);
                abort_pumps([out_pump, err_pump]);
                return Ok(FetchOutcome::Failed {
                    code: None,
                    message: e.to_string(),
                });
            }
            Err(_) => {
                warn!(
                    "{} timed out after {}s on {}, killing it",
                    program,
                    self.options.timeout.as_secs(),
                    url
                );
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill {}: {}", program, e);
                }
                abort_pumps([out_pump, err_pump]);
                return Ok(FetchOutcome::TimedOut {
                    after: self.options.timeout,
                });
            }
        };

        let mut captured = String::new();
        for mut handle in [out_pump, err_pump].into_iter().flatten() {
            match timeout(DRAIN_GRACE, &mut handle).await {
                Ok(Ok(tail)) => {
                    captured.push_str(&tail.text());
                    captured.push('\n');
                }
                Ok(Err(e)) => warn!("Output reader for {} failed: {}", program, e),
                // A grandchild may still hold the pipe open.
                Err(_) => {
                    debug!("Gave up draining output of {}", program);
                    handle.abort();
                }
            }
        }

        let outcome = classify(status.success(), status.code(), &captured);
        info!("{} finished for {}: {:?}", program, url, outcome);
        Ok(outcome)
    }
}

fn is_launch_failure(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
    )
}

fn abort_pumps(pumps: [Option<JoinHandle<OutputTail>>; 2]) {
    for handle in pumps.into_iter().flatten() {
        handle.abort();
    }
}

/// Copies child output to the console as it arrives, keeping the last bytes.
async fn pump<R, W>(mut reader: R, mut sink: W) -> OutputTail
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut tail = OutputTail::new(TAIL_BYTES);
    let mut buf = [0u8; 4096];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = &buf[..n];
                tail.push(chunk);
                // The console going away must not stop the download.
                if sink.write_all(chunk).await.is_ok() {
                    let _ = sink.flush().await;
                }
            }
            Err(e) => {
                debug!("Child output read error: {}", e);
                break;
            }
        }
    }

    tail
}

/// Bounded buffer of the most recent bytes written by a child.
#[derive(Debug, Clone)]
pub struct OutputTail {
    buf: VecDeque<u8>,
    cap: usize,
}

impl OutputTail {
    pub fn new(cap: usize) -> Self {
        Self {
            buf: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        let bytes = if bytes.len() > self.cap {
            &bytes[bytes.len() - self.cap..]
        } else {
            bytes
        };
        let overflow = (self.buf.len() + bytes.len()).saturating_sub(self.cap);
        self.buf.drain(..overflow);
        self.buf.extend(bytes);
    }

    pub fn text(&self) -> String {
        let (front, back) = self.buf.as_slices();
        let mut bytes = Vec::with_capacity(front.len() + back.len());
        bytes.extend_from_slice(front);
        bytes.extend_from_slice(back);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

pub fn classify(success: bool, code: Option<i32>, output: &str) -> FetchOutcome {
    if success {
        return FetchOutcome::Downloaded;
    }
    if reports_already_downloaded(output) {
        return FetchOutcome::AlreadyPresent;
    }
    FetchOutcome::Failed {
        code,
        message: diagnostic(output),
    }
}

fn reports_already_downloaded(output: &str) -> bool {
    let lower = output.to_lowercase();
    lower.contains("already been downloaded") || lower.contains("already downloaded")
}

/// Last few meaningful lines of output, capped to a printable length.
pub fn diagnostic(output: &str) -> String {
    let lines: Vec<&str> = output
        .split(['\n', '\r'])
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let start = lines.len().saturating_sub(3);
    let joined = lines[start..].join(" | ");

    let count = joined.chars().count();
    if count <= DIAGNOSTIC_CHARS {
        return joined;
    }
    let kept: String = joined.chars().skip(count - DIAGNOSTIC_CHARS).collect();
    format!("...{}", kept)
}
