//! One batch run: resume index, input, filter, queue, pool.
//!
//! The orchestrator only sequences the other modules and reports counts.
//! Input is parsed in full before the store is opened or any request is made,
//! so a bad borough code aborts the run with nothing written.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::input;
use crate::logger::RunProgress;
use crate::page::PageInterpreter;
use crate::pool::{PoolStats, WorkerPool};
use crate::protocol::LookupProtocol;
use crate::queue::WorkQueue;
use crate::resume::ResumeIndex;
use crate::store::RecordStore;
use crate::transport::FormTransport;

/// Counts and timings for one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Rows read from the input file
    pub total_input: usize,
    /// Rows whose address was already in the resume index
    pub skipped: usize,
    pub enqueued: usize,
    #[serde(flatten)]
    pub stats: PoolStats,
    /// True when the run was stopped before the queue drained
    pub interrupted: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_secs: f64,
}

/// Run one batch to completion
///
/// `queue` is created by the caller so it can be aborted from outside (Ctrl-C).
pub async fn run(
    config: &RunConfig,
    transport: Arc<dyn FormTransport>,
    interpreter: Arc<dyn PageInterpreter>,
    queue: Arc<WorkQueue>,
    progress: RunProgress,
) -> Result<RunSummary> {
    let started_at = Utc::now();
    let start = Instant::now();

    let resume_paths = config.resume_paths();
    let index = ResumeIndex::build(resume_paths.as_slice()).context("Failed to build resume index")?;

    let items = input::parse_input_file(&config.input_path)
        .with_context(|| format!("Invalid input file {}", config.input_path.display()))?;
    let total_input = items.len();

    let (pending, skipped): (Vec<_>, Vec<_>) =
        items.into_iter().partition(|item| !index.contains(&item.key));
    info!(
        "{} addresses in input, {} already recorded, {} to look up",
        total_input,
        skipped.len(),
        pending.len()
    );

    let store = Arc::new(
        RecordStore::open(&config.output_path, config.failure_path.as_deref())
            .context("Failed to open output logs")?,
    );

    let to_look_up = pending.len();
    let mut enqueued = 0;
    for item in pending {
        if queue.push(item) {
            enqueued += 1;
        }
    }
    queue.close();
    if enqueued < to_look_up {
        warn!("Queue closed early, {} addresses were not enqueued", to_look_up - enqueued);
    }

    progress.set_total(enqueued as u64);

    let protocol = Arc::new(LookupProtocol::new(transport, interpreter, config.event_target.clone()));
    let pool = WorkerPool::new(config.workers, config.max_attempts);
    let result = pool.run(queue.clone(), protocol, store, progress.clone()).await;
    progress.finish();
    let stats = result?;

    let interrupted = queue.is_aborted();
    if interrupted {
        warn!("Run interrupted, {} of {} addresses recorded", stats.completed(), enqueued);
    }

    Ok(RunSummary {
        total_input,
        skipped: skipped.len(),
        enqueued,
        stats,
        interrupted,
        started_at,
        completed_at: Utc::now(),
        duration_secs: start.elapsed().as_secs_f64(),
    })
}

/// Write the summary as pretty JSON
pub fn export_summary(summary: &RunSummary, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("Failed to serialize run summary")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write summary to {}", path.display()))?;
    info!("Run summary written to {}", path.display());
    Ok(())
}
