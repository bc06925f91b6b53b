//! File-to-file batch mode.
//!
//! Reads a JSON array of input records from a file, enriches them and writes
//! the results to a timestamped file. There is no acknowledgment here: a
//! record that fails enrichment is logged and left out of the output.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use futures::stream::{FuturesOrdered, StreamExt};
use tracing::{error, info, instrument};

use enricher_shared::{EnrichedRecord, InputRecord};

use crate::errors::PipelineError;
use crate::processor::Enricher;

/// Name of the output file written at `now`.
pub fn output_file_name(now: DateTime<Local>) -> String {
    format!("{}-output-data.json", now.format("%Y-%m-%d-%H:%M"))
}

/// Records between two progress lines of a batch run.
pub const PROGRESS_EVERY: usize = 100;

/// Counts finished records and says when a progress line is due.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Progress {
    total: usize,
    done: usize,
    dropped: usize,
    every: usize,
}

impl Progress {
    fn new(total: usize, every: usize) -> Self {
        Self {
            total,
            done: 0,
            dropped: 0,
            every: every.max(1),
        }
    }

    /// Count one finished record; true when a progress line should be logged.
    fn record(&mut self, enriched: bool) -> bool {
        self.done += 1;
        if !enriched {
            self.dropped += 1;
        }
        self.done % self.every == 0 || self.done == self.total
    }
}

/// Runs the enrichment stage over a file of records.
pub struct BatchRunner {
    enricher: Enricher,
}

impl BatchRunner {
    pub fn new(enricher: Enricher) -> Self {
        Self { enricher }
    }

    /// Enrich every record of `input` and write them under `output_dir`.
    ///
    /// # Returns
    ///
    /// * `Ok(PathBuf)` - The path of the written file
    /// * `Err(PipelineError)` - If the input could not be read or parsed, or
    ///   the output could not be written
    #[instrument(skip(self), fields(input = %input.display(), output_dir = %output_dir.display()))]
    pub async fn run(&self, input: &Path, output_dir: &Path) -> Result<PathBuf, PipelineError> {
        let raw = tokio::fs::read_to_string(input).await?;
        let records: Vec<InputRecord> = serde_json::from_str(&raw)?;
        info!(count = records.len(), "Loaded input records");

        let enriched = self.enrich_all(&records).await;

        tokio::fs::create_dir_all(output_dir).await?;
        let path = output_dir.join(output_file_name(Local::now()));
        let json = serde_json::to_string_pretty(&enriched)?;
        tokio::fs::write(&path, json).await?;

        info!(
            written = enriched.len(),
            dropped = records.len() - enriched.len(),
            path = %path.display(),
            "Wrote enriched records"
        );

        Ok(path)
    }

    async fn enrich_all(&self, records: &[InputRecord]) -> Vec<EnrichedRecord> {
        let mut pending: FuturesOrdered<_> = records
            .iter()
            .map(|record| self.enricher.enrich(record))
            .collect();
        let mut progress = Progress::new(records.len(), PROGRESS_EVERY);
        let mut enriched = Vec::with_capacity(records.len());

        while let Some(result) = pending.next().await {
            let ok = match result {
                Ok(record) => {
                    enriched.push(record);
                    true
                }
                Err(e) => {
                    error!(error = %e, "Dropping record");
                    false
                }
            };
            if progress.record(ok) {
                info!(
                    done = progress.done,
                    total = progress.total,
                    dropped = progress.dropped,
                    "Batch progress"
                );
            }
        }

        enriched
    }
}
