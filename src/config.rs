use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::download::{DownloadOptions, Quality};
use crate::tools::Ffmpeg;

#[derive(Debug, Parser)]
#[command(name = "vidbatch")]
#[command(about = "Resumable batch video downloader driven by a JSON work list")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub run: RunArgs,

    /// Work list (JSON array of videos), also used as the progress file
    #[arg(long, global = true, env = "VIDEO_LIST", default_value = "video_list.json")]
    pub list: PathBuf,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Wait for Enter before exiting
    #[arg(long, global = true)]
    pub pause: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download every pending video (default)
    Run(RunArgs),
    /// Mark every video as not downloaded
    Reset,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Folder the videos are saved into
    #[arg(long, env = "DOWNLOAD_DIR", default_value = "downloads")]
    pub dest: PathBuf,

    /// yt-dlp executable
    #[arg(long = "yt-dlp", env = "YTDLP_BIN", default_value = "yt-dlp")]
    pub ytdlp: String,

    /// ffmpeg executable or its directory
    #[arg(long, env = "FFMPEG_BIN")]
    pub ffmpeg: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = QualityPolicy::Auto)]
    pub quality: QualityPolicy,

    /// Seconds before a single download is treated as hung
    #[arg(long, default_value_t = 600)]
    pub timeout_secs: u64,

    /// Retry count passed to yt-dlp for requests and fragments
    #[arg(long, default_value_t = 3)]
    pub retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QualityPolicy {
    /// High when ffmpeg is available, standard otherwise
    Auto,
    High,
    Standard,
}

impl RunArgs {
    pub fn download_options(&self, quality: Quality, ffmpeg: Option<&Ffmpeg>) -> DownloadOptions {
        DownloadOptions {
            program: self.ytdlp.clone(),
            quality,
            ffmpeg_location: ffmpeg.and_then(|f| f.location.clone()),
            retries: self.retries,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_invocation_runs_with_defaults() {
        let cli = Cli::try_parse_from(["vidbatch"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.timeout_secs, 600);
        assert_eq!(cli.run.retries, 3);
        assert_eq!(cli.run.quality, QualityPolicy::Auto);
    }

    #[test]
    fn run_subcommand_accepts_overrides() {
        let cli = Cli::try_parse_from([
            "vidbatch",
            "--list",
            "my.json",
            "run",
            "--dest",
            "out",
            "--quality",
            "standard",
            "--timeout-secs",
            "60",
        ])
        .unwrap();

        assert_eq!(cli.list, PathBuf::from("my.json"));
        match cli.command {
            Some(Commands::Run(args)) => {
                assert_eq!(args.dest, PathBuf::from("out"));
                assert_eq!(args.quality, QualityPolicy::Standard);
                let options = args.download_options(Quality::Standard, None);
                assert_eq!(options.timeout, Duration::from_secs(60));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn global_flags_work_before_the_subcommand() {
        let cli = Cli::try_parse_from(["vidbatch", "-v", "--pause", "run"]).unwrap();
        assert_eq!(cli.verbose, 1);
        assert!(cli.pause);
        assert!(matches!(cli.command, Some(Commands::Run(_))));

        let cli = Cli::try_parse_from(["vidbatch", "--pause", "--list", "l.json", "reset"]).unwrap();
        assert!(cli.pause);
        assert_eq!(cli.list, PathBuf::from("l.json"));
        assert!(matches!(cli.command, Some(Commands::Reset)));
    }

    #[test]
    fn global_flags_work_after_the_subcommand() {
        let cli = Cli::try_parse_from(["vidbatch", "run", "-vv", "--pause"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.pause);
    }

    #[test]
    fn run_options_work_without_the_subcommand() {
        let cli = Cli::try_parse_from(["vidbatch", "--dest", "out", "--retries", "5"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.dest, PathBuf::from("out"));
        assert_eq!(cli.run.retries, 5);
    }

    #[test]
    fn reset_subcommand_parses() {
        let cli = Cli::try_parse_from(["vidbatch", "reset", "--list", "x.json"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Reset)));
        assert_eq!(cli.list, PathBuf::from("x.json"));
    }
}
