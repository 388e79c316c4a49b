//! Fixed-size pool of lookup workers
//!
//! Each worker loops: pop an item, run the lookup in its own task, route the
//! outcome to the record store, then complete or re-queue the item. A failed
//! lookup is retried until it has used `max_attempts`, then dead-lettered.
//! Only a record store write error stops the pool early.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::address::{AddressKey, WorkItem};
use crate::logger::RunProgress;
use crate::protocol::{LookupDiagnostics, LookupOutcome, LookupProtocol, LookupReport};
use crate::queue::WorkQueue;
use crate::store::RecordStore;

/// Item that ran out of attempts with nowhere to dead-letter it
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AbandonedItem {
    pub key: AddressKey,
    pub attempts: u32,
    pub error: String,
}

/// Counts gathered over one pool run
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct PoolStats {
    pub found: usize,
    pub not_found: usize,
    /// Items written to the failure log
    pub failed: usize,
    /// Failed attempts that were put back on the queue
    pub retried: usize,
    pub abandoned: Vec<AbandonedItem>,
    /// Addresses whose lookup page carried more than one form, counted once per address
    pub multiple_form_pages: usize,
}

impl PoolStats {
    /// Items with a final outcome in this run
    pub fn completed(&self) -> usize {
        self.found + self.not_found + self.failed + self.abandoned.len()
    }
}

#[derive(Default)]
struct Counters {
    found: AtomicUsize,
    not_found: AtomicUsize,
    failed: AtomicUsize,
    retried: AtomicUsize,
    multiple_form_pages: AtomicUsize,
    abandoned: Mutex<Vec<AbandonedItem>>,
}

impl Counters {
    fn advance(&self, progress: &RunProgress) {
        let abandoned = self.abandoned.lock().map(|a| a.len()).unwrap_or(0);
        progress.advance(
            self.found.load(Ordering::Relaxed),
            self.not_found.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed) + abandoned,
        );
    }

    fn snapshot(&self) -> PoolStats {
        PoolStats {
            found: self.found.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            abandoned: self
                .abandoned
                .lock()
                .map(|a| a.clone())
                .unwrap_or_default(),
            multiple_form_pages: self.multiple_form_pages.load(Ordering::Relaxed),
        }
    }
}

/// What to do with an item once its outcome is routed
enum Disposition {
    Done,
    Retry,
}

/// Shared state handed to every worker
struct WorkerContext {
    queue: Arc<WorkQueue>,
    protocol: Arc<LookupProtocol>,
    store: Arc<RecordStore>,
    progress: RunProgress,
    counters: Counters,
    max_attempts: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
    max_attempts: u32,
}

impl WorkerPool {
    /// `workers` and `max_attempts` are clamped to at least 1
    pub fn new(workers: usize, max_attempts: u32) -> Self {
        Self {
            workers: workers.max(1),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run workers until the queue is closed and drained (or aborted).
    ///
    /// The caller is responsible for closing the queue once all items are pushed.
    pub async fn run(
        &self,
        queue: Arc<WorkQueue>,
        protocol: Arc<LookupProtocol>,
        store: Arc<RecordStore>,
        progress: RunProgress,
    ) -> Result<PoolStats> {
        let context = Arc::new(WorkerContext {
            queue: queue.clone(),
            protocol,
            store,
            progress,
            counters: Counters::default(),
            max_attempts: self.max_attempts,
        });

        info!("Starting {} workers (max {} attempts per address)", self.workers, self.max_attempts);

        let mut workers = JoinSet::new();
        for worker_id in 0..self.workers {
            workers.spawn(worker_loop(worker_id, context.clone()));
        }

        let mut first_error: Option<anyhow::Error> = None;
        while let Some(joined) = workers.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) => Err(anyhow!("worker task failed: {}", e)),
            };
            if let Err(e) = result {
                queue.abort();
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        Ok(context.counters.snapshot())
    }
}

async fn worker_loop(worker_id: usize, ctx: Arc<WorkerContext>) -> Result<()> {
    debug!("Worker {} started", worker_id);

    while let Some(mut item) = ctx.queue.pop().await {
        let report = run_isolated(&ctx.protocol, &item).await;
        item.attempts += 1;

        item.saw_multiple_forms |= report.diagnostics.extra_forms.is_some();

        match route(&ctx, &item, report.outcome).await {
            Ok(Disposition::Done) => {
                if item.saw_multiple_forms {
                    ctx.counters.multiple_form_pages.fetch_add(1, Ordering::Relaxed);
                }
                ctx.queue.complete();
                ctx.counters.advance(&ctx.progress);
            }
            Ok(Disposition::Retry) => ctx.queue.requeue(item),
            Err(e) => {
                error!("Worker {} stopping, could not record outcome for {}: {:#}", worker_id, item.key, e);
                ctx.queue.complete();
                ctx.queue.abort();
                return Err(e);
            }
        }
    }

    debug!("Worker {} finished", worker_id);
    Ok(())
}

/// Run the lookup on its own task so a panic is contained to this item
async fn run_isolated(protocol: &Arc<LookupProtocol>, item: &WorkItem) -> LookupReport {
    let protocol = protocol.clone();
    let task_item = item.clone();
    match tokio::spawn(async move { protocol.execute(&task_item).await }).await {
        Ok(report) => report,
        Err(e) => LookupReport {
            outcome: LookupOutcome::Failed {
                error: format!("lookup task aborted: {}", e),
            },
            diagnostics: LookupDiagnostics::default(),
        },
    }
}

async fn route(ctx: &WorkerContext, item: &WorkItem, outcome: LookupOutcome) -> Result<Disposition> {
    match outcome {
        LookupOutcome::Found { values } => {
            ctx.store.append_success(item, Some(values.as_slice())).await?;
            ctx.counters.found.fetch_add(1, Ordering::Relaxed);
            debug!("{}: {} I-cards", item.key, values.len());
            Ok(Disposition::Done)
        }
        LookupOutcome::NotFound => {
            ctx.store.append_success(item, None).await?;
            ctx.counters.not_found.fetch_add(1, Ordering::Relaxed);
            debug!("{}: no I-cards", item.key);
            Ok(Disposition::Done)
        }
        LookupOutcome::Failed { error } => {
            if item.attempts < ctx.max_attempts {
                warn!(
                    "Lookup failed for {} (attempt {}/{}), re-queueing: {}",
                    item.key, item.attempts, ctx.max_attempts, error
                );
                ctx.counters.retried.fetch_add(1, Ordering::Relaxed);
                return Ok(Disposition::Retry);
            }

            if ctx.store.append_failure(item, &error).await? {
                warn!("Lookup failed for {} after {} attempts: {}", item.key, item.attempts, error);
                ctx.counters.failed.fetch_add(1, Ordering::Relaxed);
            } else {
                error!(
                    "Giving up on {} after {} attempts (no failure log configured): {}",
                    item.key, item.attempts, error
                );
                if let Ok(mut abandoned) = ctx.counters.abandoned.lock() {
                    abandoned.push(AbandonedItem {
                        key: item.key.clone(),
                        attempts: item.attempts,
                        error,
                    });
                }
            }
            Ok(Disposition::Done)
        }
    }
}
