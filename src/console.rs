//! Operator-facing status text. Not meant to be parsed.

use std::io::{self, Write};
use std::path::Path;

use crate::download::{FetchOutcome, Quality};
use crate::driver::RunReport;
use crate::worklist::Partition;

const RULE_WIDTH: usize = 60;
const TITLE_CHARS: usize = 70;

/// Writes run status to any sink. Write errors are ignored: losing the
/// console must not lose a download.
pub struct Console<W: Write> {
    out: W,
}

impl Console<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Console<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: impl AsRef<str>) {
        let _ = writeln!(self.out, "{}", text.as_ref());
    }

    fn heavy_rule(&mut self) {
        self.line("=".repeat(RULE_WIDTH));
    }

    pub fn status(&mut self, partition: &Partition, dest: &Path, quality: Quality) {
        self.line("");
        self.heavy_rule();
        self.line("VIDEO DOWNLOAD STATUS");
        self.heavy_rule();
        self.line(format!("   Total videos:           {}", partition.total));
        self.line(format!("   Already downloaded:     {}", partition.already_done));
        self.line(format!("   Remaining to download: {}", partition.pending.len()));
        if partition.skipped > 0 {
            self.line(format!(
                "   Missing video ID:       {} (will be skipped)",
                partition.skipped
            ));
        }
        self.line(format!("   Download folder:        {}", dest.display()));
        self.line(format!("   Quality:                {}", quality.describe()));
        self.heavy_rule();
    }

    pub fn nothing_to_do(&mut self) {
        self.line("");
        self.line("All videos are already downloaded! Nothing to do.");
    }

    pub fn starting(&mut self, pending: usize) {
        self.line("");
        self.line(format!("Starting download of {} videos...", pending));
        self.line("   (You can stop anytime, progress is saved after every video.)");
        self.line("   (Run again to resume from where you stopped.)");
    }

    pub fn item_header(&mut self, position: usize, count: usize, label: &str, url: &str) {
        let pct = if count == 0 {
            100
        } else {
            (position * 100 + count / 2) / count
        };
        let title: String = label.chars().take(TITLE_CHARS).collect();

        self.line("");
        self.line("-".repeat(RULE_WIDTH));
        self.line(format!("[{}/{}] ({}% done)", position, count, pct));
        self.line(format!("   Title: {}", title));
        self.line(format!("   URL:   {}", url));
        let _ = self.out.flush();
    }

    pub fn item_result(&mut self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Downloaded => self.line("   Downloaded successfully!"),
            FetchOutcome::AlreadyPresent => self.line("   Already downloaded, marking as done."),
            FetchOutcome::Failed { code, message } => {
                let code = code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "none".to_string());
                if message.is_empty() {
                    self.line(format!("   Failed (exit code {})", code));
                } else {
                    self.line(format!("   Failed (exit code {}): {}", code, message));
                }
            }
            FetchOutcome::TimedOut { after } => {
                let secs = after.as_secs();
                if secs >= 60 && secs % 60 == 0 {
                    self.line(format!("   Timed out after {} minutes, skipping...", secs / 60));
                } else {
                    self.line(format!("   Timed out after {} seconds, skipping...", secs));
                }
            }
        }
    }

    pub fn final_summary(&mut self, report: &RunReport, dest: &Path) {
        self.line("");
        self.heavy_rule();
        self.line("DOWNLOAD COMPLETE");
        self.heavy_rule();
        self.line(format!("   Successfully downloaded: {}", report.succeeded));
        if report.failed > 0 {
            self.line(format!("   Failed:                  {}", report.failed));
            self.line("   Tip: run again to retry the failed downloads.");
        }
        self.line(format!("   Videos saved to: {}", dest.display()));
        self.heavy_rule();
        let _ = self.out.flush();
    }

    pub fn fatal(&mut self, error: &dyn std::fmt::Display, guidance: &[String]) {
        self.line("");
        self.line(format!("ERROR: {}", error));
        for hint in guidance {
            self.line(format!("   {}", hint));
        }
        let _ = self.out.flush();
    }

    pub fn reset_done(&mut self, count: usize) {
        self.line(format!(
            "Reset complete! All {} videos marked as NOT downloaded.",
            count
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn render(f: impl FnOnce(&mut Console<Vec<u8>>)) -> String {
        let mut console = Console::new(Vec::new());
        f(&mut console);
        String::from_utf8(console.into_inner()).unwrap()
    }

    #[test]
    fn status_hides_skipped_line_when_zero() {
        let partition = Partition {
            total: 2,
            already_done: 1,
            skipped: 0,
            pending: vec![1],
        };
        let text = render(|c| c.status(&partition, Path::new("downloads"), Quality::High));
        assert!(text.contains("Total videos:           2"));
        assert!(text.contains("Remaining to download: 1"));
        assert!(!text.contains("Missing video ID"));
        assert!(text.contains("HIGH"));
    }

    #[test]
    fn header_truncates_long_titles() {
        let long = "x".repeat(200);
        let text = render(|c| c.item_header(1, 3, &long, "https://example/v"));
        assert!(text.contains("[1/3] (33% done)"));
        assert!(text.contains(&format!("Title: {}\n", "x".repeat(70))));
    }

    #[test]
    fn timeout_is_reported_in_minutes() {
        let text = render(|c| {
            c.item_result(&FetchOutcome::TimedOut {
                after: Duration::from_secs(600),
            })
        });
        assert!(text.contains("Timed out after 10 minutes"));
    }

    #[test]
    fn summary_suggests_rerun_only_on_failure() {
        let clean = RunReport {
            succeeded: 2,
            ..RunReport::default()
        };
        let text = render(|c| c.final_summary(&clean, Path::new("d")));
        assert!(!text.contains("run again"));

        let failed = RunReport {
            succeeded: 1,
            failed: 1,
            ..RunReport::default()
        };
        let text = render(|c| c.final_summary(&failed, Path::new("d")));
        assert!(text.contains("Failed:                  1"));
        assert!(text.contains("run again to retry"));
    }
}
