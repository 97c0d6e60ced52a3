//! Parallel item executor.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use harvest_models::WorkItem;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::{attach_progress, detach_progress};
use crate::pipeline::{Harvester, ItemOutcome};

/// Counts for one run. Results arrive unordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub dispatched: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Fixed-size pool of tasks, each driving one item end to end.
pub struct HarvestExecutor {
    harvester: Arc<Harvester>,
    workers: usize,
    show_progress: bool,
}

impl HarvestExecutor {
    pub fn new(harvester: Arc<Harvester>, workers: usize) -> Self {
        Self {
            harvester,
            workers: workers.max(1),
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Run every item. Stops dispatching and aborts in-flight items on a
    /// fatal error, which is returned. Partial folders of aborted items are
    /// purged before returning.
    pub async fn run(&self, items: Vec<WorkItem>) -> WorkerResult<RunSummary> {
        info!(
            items = items.len(),
            workers = self.workers,
            run_id = %self.harvester.run_id(),
            "Starting harvest run"
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let progress = self.progress_bar(items.len() as u64);
        let mut tasks: JoinSet<TaskOutput> = JoinSet::new();
        let mut in_flight: HashMap<String, WorkItem> = HashMap::new();
        let mut summary = RunSummary::default();

        for item in items {
            let permit = loop {
                tokio::select! {
                    biased;
                    Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                        if let Err(e) = absorb(joined, &mut in_flight, &mut summary, &progress) {
                            return Err(self.abort(tasks, in_flight, &progress, e).await);
                        }
                    }
                    permit = semaphore.clone().acquire_owned() => {
                        break permit.map_err(|_| WorkerError::config_error("worker pool closed"))?;
                    }
                }
            };

            let harvester = self.harvester.clone();
            in_flight.insert(item.clip_id.clone(), item.clone());
            tasks.spawn(async move {
                let _permit = permit;
                let outcome = harvester.process(&item).await;
                (item.clip_id, outcome)
            });
            summary.dispatched += 1;
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = absorb(joined, &mut in_flight, &mut summary, &progress) {
                return Err(self.abort(tasks, in_flight, &progress, e).await);
            }
        }

        progress.finish_with_message("done");
        detach_progress();
        info!(
            dispatched = summary.dispatched,
            completed = summary.completed,
            failed = summary.failed,
            "Harvest run finished"
        );
        Ok(summary)
    }

    /// Cancel the remaining tasks, wait for them to unwind, then clean up
    /// after every item that did not finish.
    async fn abort(
        &self,
        mut tasks: JoinSet<TaskOutput>,
        mut in_flight: HashMap<String, WorkItem>,
        progress: &ProgressBar,
        e: WorkerError,
    ) -> WorkerError {
        error!(error = %e, in_flight = tasks.len(), "Fatal error, stopping run");
        tasks.abort_all();
        while let Some(joined) = tasks.join_next().await {
            if let Ok((clip_id, _)) = joined {
                in_flight.remove(&clip_id);
            }
        }

        for item in in_flight.values() {
            self.harvester.purge_partial(item).await;
        }
        if !in_flight.is_empty() {
            warn!(items = in_flight.len(), "Purged partial folders of interrupted items");
        }

        progress.abandon_with_message("aborted");
        detach_progress();
        e
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{elapsed_precise}] {bar:40} {pos}/{len} items ({eta}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(4));
        pb.enable_steady_tick(Duration::from_millis(250));
        attach_progress(&pb);
        pb
    }
}

type TaskOutput = (String, WorkerResult<ItemOutcome>);

/// Fold one finished task into the summary. Progress advances regardless of
/// outcome. A fatal error is handed back with the item still in flight.
fn absorb(
    joined: Result<TaskOutput, JoinError>,
    in_flight: &mut HashMap<String, WorkItem>,
    summary: &mut RunSummary,
    progress: &ProgressBar,
) -> WorkerResult<()> {
    match joined {
        Ok((_, Err(e))) if e.is_fatal() => return Err(e),
        Ok((clip_id, result)) => {
            in_flight.remove(&clip_id);
            match result {
                Ok(outcome) if outcome.is_completed() => summary.completed += 1,
                Ok(_) => summary.failed += 1,
                Err(e) => {
                    error!(clip_id = %clip_id, error = %e, "Item ended with an error");
                    summary.failed += 1;
                }
            }
        }
        Err(e) => {
            error!(error = %e, "Item task panicked");
            summary.failed += 1;
        }
    }
    progress.inc(1);
    Ok(())
}
