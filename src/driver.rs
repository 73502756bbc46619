use std::io::Write;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::console::Console;
use crate::download::{source_url, Fetch, Quality};
use crate::error::DriverError;
use crate::worklist::WorkList;

/// Counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub total: usize,
    pub already_done: usize,
    pub pending: usize,
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Sequential download loop over a checkpointed work list.
pub struct BatchDriver<F, W: Write> {
    list_path: PathBuf,
    dest: PathBuf,
    quality: Quality,
    fetcher: F,
    console: Console<W>,
}

impl<F: Fetch, W: Write> BatchDriver<F, W> {
    pub fn new(
        list_path: impl Into<PathBuf>,
        dest: impl Into<PathBuf>,
        quality: Quality,
        fetcher: F,
        console: Console<W>,
    ) -> Self {
        Self {
            list_path: list_path.into(),
            dest: dest.into(),
            quality,
            fetcher,
            console,
        }
    }

    pub fn into_parts(self) -> (F, Console<W>) {
        (self.fetcher, self.console)
    }

    pub async fn run(&mut self) -> Result<RunReport, DriverError> {
        let mut list = WorkList::load(&self.list_path)?;

        std::fs::create_dir_all(&self.dest).map_err(|source| DriverError::DestDir {
            path: self.dest.clone(),
            source,
        })?;

        let partition = list.partition();
        let mut report = RunReport {
            total: partition.total,
            already_done: partition.already_done,
            pending: partition.pending.len(),
            skipped: partition.skipped,
            ..RunReport::default()
        };
        info!(
            "Work list {}: {} total, {} done, {} pending, {} without id",
            list.path().display(),
            report.total,
            report.already_done,
            report.pending,
            report.skipped
        );

        self.console.status(&partition, &self.dest, self.quality);

        if partition.pending.is_empty() {
            self.console.nothing_to_do();
            return Ok(report);
        }

        self.console.starting(partition.pending.len());

        for (position, &index) in partition.pending.iter().enumerate() {
            let item = &list.items()[index];
            let Some(fetch_id) = item.fetch_id() else {
                continue;
            };
            let url = source_url(fetch_id);
            let label = item.label();

            self.console
                .item_header(position + 1, partition.pending.len(), &label, &url);

            let outcome = match self.fetcher.fetch(&url, &self.dest).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Aborting run: {}", e);
                    self.console.final_summary(&report, &self.dest);
                    return Err(e.into());
                }
            };

            self.console.item_result(&outcome);
            if outcome.is_success() {
                list.mark_downloaded(index);
                report.succeeded += 1;
            } else {
                warn!("Download failed for {} ({}): {:?}", label, url, outcome);
                report.failed += 1;
            }

            if let Err(source) = list.save() {
                error!("Could not write checkpoint: {:#}", source);
                self.console.final_summary(&report, &self.dest);
                return Err(DriverError::Checkpoint {
                    path: list.path().to_path_buf(),
                    source,
                });
            }
        }

        info!(
            "Run finished: {} succeeded, {} failed",
            report.succeeded, report.failed
        );
        self.console.final_summary(&report, &self.dest);
        Ok(report)
    }
}
