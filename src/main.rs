use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use vidbatch::config::{Cli, Commands, RunArgs};
use vidbatch::console::Console;
use vidbatch::error::DriverError;
use vidbatch::tools;
use vidbatch::{BatchDriver, WorkList, YtDlp};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Some(Commands::Run(ref args)) => run(&cli.list, args).await,
        Some(Commands::Reset) => reset(&cli.list),
        None => run(&cli.list, &cli.run).await,
    };

    let code = match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            debug!("Exiting on fatal error: {:?}", e);
            Console::stdout().fatal(&e, &e.remediation());
            ExitCode::FAILURE
        }
    };

    if cli.pause {
        wait_for_enter();
    }
    code
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(list: &Path, args: &RunArgs) -> Result<(), DriverError> {
    let version = tools::probe_downloader(&args.ytdlp).await?;
    info!("{} version {}", args.ytdlp, version);

    let ffmpeg = tools::find_ffmpeg(args.ffmpeg.as_deref()).await;
    let quality = tools::resolve_quality(args.quality, ffmpeg.as_ref());
    info!("Quality mode {:?}", quality);

    let fetcher = YtDlp::new(args.download_options(quality, ffmpeg.as_ref()));
    let mut driver = BatchDriver::new(list, &args.dest, quality, fetcher, Console::stdout());
    driver.run().await?;
    Ok(())
}

fn reset(list: &Path) -> Result<(), DriverError> {
    let count = WorkList::reset_file(list)?;
    Console::stdout().reset_done(count);
    Ok(())
}

fn wait_for_enter() {
    use std::io::{BufRead, Write};

    print!("\nPress Enter to exit...");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);
}
