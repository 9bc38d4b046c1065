//! The coordinator: owns the worker pool and the run lifecycle.
//!
//! A run moves STARTING → RUNNING → DRAINING → STOPPED. Draining starts on
//! the first of: an external stop signal, the message budget running out, or
//! a worker reporting a fatal broker error. Workers observe it at their next
//! fetch boundary, so no new fetch begins once draining has started, and the
//! final acknowledgment flush happens exactly once, after every worker has
//! finished its in-flight message.

use crate::acker::BatchAcker;
use crate::broker::QueueBroker;
use crate::config::FilterConfig;
use crate::counters::{RunCounters, RunSummary};
use crate::error::FilterError;
use crate::matcher::Matcher;
use crate::worker::{Worker, WorkerExit};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// Why the run stopped.
#[derive(Debug)]
pub enum StopReason {
    /// The queue drained: every worker saw end-of-stream.
    Drained,
    /// An external stop signal arrived.
    Signal,
    /// The configured message budget was reached.
    MessageLimit,
    /// A fatal broker error ended the run.
    Fatal(FilterError),
}

impl StopReason {
    /// Whether the run stopped cleanly (maps to a zero exit code).
    pub fn is_clean(&self) -> bool {
        !matches!(self, StopReason::Fatal(_))
    }
}

/// The first terminal cause wins, except that a fatal error always upgrades
/// a clean reason: the exit code must reflect it.
fn note_reason(slot: &mut Option<StopReason>, reason: StopReason) {
    if matches!(slot, Some(StopReason::Fatal(_))) {
        return;
    }
    if slot.is_none() || matches!(reason, StopReason::Fatal(_)) {
        *slot = Some(reason);
    }
}

/// What a finished run reports.
#[derive(Debug)]
pub struct RunReport {
    pub summary: RunSummary,
    pub reason: StopReason,
}

/// Spawns workers, watches for stop conditions, and guarantees the drain.
pub struct Coordinator {
    config: FilterConfig,
}

impl Coordinator {
    /// Validate the configuration and build a coordinator. Fails fast,
    /// before any broker interaction.
    pub fn new(config: FilterConfig) -> Result<Self, FilterError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run to completion. The summary is produced whether the stop was clean
    /// or fatal; the distinction lives in [`RunReport::reason`].
    pub async fn run(
        &self,
        broker: Arc<dyn QueueBroker>,
        mut external: watch::Receiver<bool>,
    ) -> RunReport {
        let config = &self.config;
        info!(
            queue = %config.queue,
            workers = config.workers,
            batch_size = config.batch_size,
            max_messages = ?config.max_messages,
            mode = %config.mode,
            rules = config.patterns.len(),
            republish = config.republish,
            "Starting filter run"
        );

        let matcher = Arc::new(Matcher::new(
            config.patterns.clone(),
            config.mode,
            config.ignore_case,
        ));
        let counters = Arc::new(RunCounters::new(config.max_messages));
        let acker = Arc::new(BatchAcker::new(Arc::clone(&broker), config.batch_size));

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut workers = JoinSet::new();
        for id in 0..config.workers {
            let worker = Worker::new(
                id,
                Arc::clone(&broker),
                Arc::clone(&matcher),
                Arc::clone(&acker),
                Arc::clone(&counters),
                config,
            );
            let cancel = cancel_rx.clone();
            workers.spawn(async move { worker.run(cancel).await });
        }
        drop(cancel_rx);

        let mut reason: Option<StopReason> = None;
        let mut external_alive = true;
        loop {
            tokio::select! {
                changed = external.changed(), if external_alive && reason.is_none() => {
                    match changed {
                        Ok(()) if *external.borrow_and_update() => {
                            info!("Stop signal received, draining");
                            note_reason(&mut reason, StopReason::Signal);
                            let _ = cancel_tx.send(true);
                        }
                        Ok(()) => {}
                        Err(_) => external_alive = false,
                    }
                }
                joined = workers.join_next() => {
                    match joined {
                        None => break,
                        Some(Ok(Ok(WorkerExit::Drained | WorkerExit::Cancelled))) => {}
                        Some(Ok(Ok(WorkerExit::LimitReached))) => {
                            info!("Message limit reached, draining");
                            note_reason(&mut reason, StopReason::MessageLimit);
                            let _ = cancel_tx.send(true);
                        }
                        Some(Ok(Err(e))) => {
                            error!(error = %e, "Worker reported fatal error, draining");
                            note_reason(&mut reason, StopReason::Fatal(e));
                            let _ = cancel_tx.send(true);
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Worker task failed");
                            note_reason(
                                &mut reason,
                                StopReason::Fatal(FilterError::Internal(e.to_string())),
                            );
                            let _ = cancel_tx.send(true);
                        }
                    }
                }
            }
        }

        debug!("All workers stopped, flushing pending acknowledgments");
        if let Err(e) = acker.drain_and_flush().await {
            error!(error = %e, "Final acknowledgment flush failed");
            note_reason(&mut reason, StopReason::Fatal(e));
        }

        let reason = reason.unwrap_or(StopReason::Drained);
        let summary = counters.snapshot();
        info!(
            processed = summary.processed,
            matched = summary.matched,
            republished = summary.republished,
            dropped = summary.dropped,
            requeued = summary.requeued,
            reason = ?reason,
            "Filter run stopped"
        );
        RunReport { summary, reason }
    }
}
