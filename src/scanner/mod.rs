//! Concurrent ID probing with strictly ordered aggregation
//!
//! The scanner wires five pieces together:
//!
//! - [`IdSource`] hands out unique, strictly increasing IDs
//! - a pool of prober workers draws IDs and probes them concurrently
//! - [`Aggregator`] reorders the out-of-order outcomes and finalizes them
//!   gap-free in ID order
//! - [`WorkerGate`] pauses the pool whenever a found vocabulary is waiting on
//!   the operator
//! - [`ModerationGate`] fetches, pre-filters, and prompts for each found ID,
//!   one at a time
//!
//! The scan is open-ended: it runs until the operator quits or Ctrl-C fires,
//! both of which flush the registry before stopping.

pub mod aggregator;
pub mod gate;
pub mod id_source;
pub mod moderation;
pub mod prober;

pub use aggregator::{Aggregator, ModerationJob};
pub use gate::{GateWatcher, Shutdown, WorkerGate};
pub use id_source::IdSource;
pub use moderation::{DecisionInput, ModerationGate, ScriptedInput, StdinInput};
pub use prober::Prober;

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{ScanEvent, ScanStats, VocabId};
use crate::storage::RegistryStore;

/// Final accounting for one scan run
#[derive(Debug, Clone, Copy)]
pub struct ScanReport {
    /// First ID probed
    pub start_id: VocabId,

    /// Next ID that would have been finalized
    pub next_id: VocabId,

    /// Probe requests issued
    pub requests: u64,

    /// IDs that resolved as found
    pub found: u64,

    /// IDs that resolved as absent
    pub absent: u64,

    /// IDs that resolved as probe errors
    pub errors: u64,

    /// Vocabularies approved this run
    pub approved: u64,

    /// Vocabularies skipped this run (manually or pre-filtered)
    pub skipped: u64,

    /// Total IDs in the registry file after the final flush
    pub registry_total: usize,
}

/// First fatal pipeline error observed by any worker.
///
/// Protocol violations cannot be recovered mid-scan; the worker that detects
/// one triggers shutdown, and the recorded error is returned from
/// [`Scanner::run`] after the final flush and counter report.
#[derive(Debug, Default)]
struct FaultSlot {
    slot: std::sync::Mutex<Option<Error>>,
}

impl FaultSlot {
    fn record(&self, error: Error) {
        let mut slot = self.slot.lock().expect("fault slot mutex poisoned");
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    fn take(&self) -> Option<Error> {
        self.slot.lock().expect("fault slot mutex poisoned").take()
    }
}

/// Top-level scan orchestrator
pub struct Scanner {
    config: Config,
    stats: Arc<ScanStats>,
}

impl Scanner {
    /// Create a scanner from a validated configuration
    ///
    /// # Errors
    ///
    /// Returns a config error if validation fails
    pub fn new(config: Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::config(e.to_string()))?;

        Ok(Self {
            config,
            stats: ScanStats::new(),
        })
    }

    /// Shared statistics counters, for live progress reporting
    pub fn stats(&self) -> Arc<ScanStats> {
        Arc::clone(&self.stats)
    }

    /// Run the scan until the operator quits or Ctrl-C fires.
    ///
    /// When no explicit start ID is configured, scanning resumes one past the
    /// highest ID already persisted in the registry file, or at 1 for a fresh
    /// registry.
    ///
    /// # Errors
    ///
    /// Returns registry I/O errors, HTTP client construction errors, and
    /// protocol violations from the pipeline.
    pub async fn run(self, input: Arc<dyn DecisionInput>) -> Result<ScanReport> {
        let store = RegistryStore::new(&self.config.registry.path);
        let persisted = store.load()?;

        let start_id = match self.config.scanner.start_id {
            Some(id) => id,
            None => persisted.max_id().map_or(1, |max| max + 1),
        };

        tracing::info!(
            start_id,
            workers = self.config.scanner.workers,
            registry = %store.path().display(),
            "starting scan"
        );

        let gate = Arc::new(WorkerGate::new());
        let shutdown = Shutdown::new();
        let ids = Arc::new(IdSource::new(start_id));
        let (moderation_tx, moderation_rx) = mpsc::channel(1);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let aggregator = Arc::new(Aggregator::new(
            start_id,
            self.config.scanner.base_url.clone(),
            Arc::clone(&gate),
            moderation_tx,
            events_tx,
            shutdown.clone(),
        ));
        let prober = Arc::new(Prober::new(&self.config)?);

        // Ctrl-C takes the same path as an operator quit
        let ctrl_c = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupt received, stopping scan");
                    shutdown.trigger();
                }
            })
        };

        // Stop the ID source and release gate-blocked workers on shutdown
        let stopper = {
            let shutdown = shutdown.clone();
            let ids = Arc::clone(&ids);
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                shutdown.triggered().await;
                ids.stop();
                gate.resume();
            })
        };

        let printer = tokio::spawn(consume_events(events_rx));

        let moderation = ModerationGate::new(
            Arc::clone(&prober),
            Arc::clone(&aggregator),
            store.clone(),
            persisted,
            Arc::clone(&self.stats),
            shutdown.clone(),
            input,
        );
        let moderation_handle = tokio::spawn(moderation.run(moderation_rx));

        let faults = Arc::new(FaultSlot::default());
        let mut workers = Vec::with_capacity(self.config.scanner.workers);
        for worker_id in 0..self.config.scanner.workers {
            workers.push(tokio::spawn(prober_worker(
                worker_id,
                Arc::clone(&ids),
                gate.watcher(),
                Arc::clone(&prober),
                Arc::clone(&aggregator),
                Arc::clone(&self.stats),
                shutdown.clone(),
                Arc::clone(&faults),
            )));
        }

        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "prober worker panicked");
            }
        }

        // All probing is done; whatever moderation holds is the last job
        shutdown.trigger();

        let registry = moderation_handle
            .await
            .map_err(|e| Error::protocol(format!("moderation task failed: {e}")))??;

        // Quit already flushed; this catches the Ctrl-C path and is a no-op
        // union otherwise
        let registry_total = match store.flush(&registry) {
            Ok(total) => total,
            Err(e) => {
                tracing::error!(error = %e, "final registry flush failed");
                registry.len()
            }
        };

        let next_id = aggregator.next_expected();
        drop(aggregator);

        let _ = printer.await;
        ctrl_c.abort();
        stopper.abort();

        let snapshot = self.stats.snapshot();
        let report = ScanReport {
            start_id,
            next_id,
            requests: snapshot.requests,
            found: snapshot.found,
            absent: snapshot.absent,
            errors: snapshot.errors,
            approved: snapshot.approved,
            skipped: snapshot.skipped,
            registry_total,
        };

        tracing::info!(
            probed = report.requests,
            found = report.found,
            approved = report.approved,
            registry_total,
            "scan finished"
        );

        if let Some(e) = faults.take() {
            return Err(e);
        }
        Ok(report)
    }
}

/// One prober worker: draw an ID, probe it, report the outcome, repeat.
///
/// The gate is checked before every draw, never mid-probe, so pausing lets
/// in-flight probes complete.
#[allow(clippy::too_many_arguments)]
async fn prober_worker(
    worker_id: usize,
    ids: Arc<IdSource>,
    mut gate: GateWatcher,
    prober: Arc<Prober>,
    aggregator: Arc<Aggregator>,
    stats: Arc<ScanStats>,
    shutdown: Shutdown,
    faults: Arc<FaultSlot>,
) {
    loop {
        gate.wait_open().await;
        if shutdown.is_triggered() {
            break;
        }

        let Some(id) = ids.next() else {
            break;
        };

        stats.record_request();
        let outcome = prober.probe(id).await;
        stats.record_outcome(outcome.status);

        if let Err(e) = aggregator.report(outcome) {
            tracing::error!(worker_id, error = %e, "pipeline violation, stopping scan");
            faults.record(e);
            shutdown.trigger();
            break;
        }
    }

    tracing::debug!(worker_id, "prober worker done");
}

/// Consume the ordered event stream, logging moderation results and periodic
/// progress
async fn consume_events(mut events_rx: mpsc::UnboundedReceiver<ScanEvent>) {
    let mut finalized: u64 = 0;

    while let Some(event) = events_rx.recv().await {
        finalized += 1;

        if let ScanEvent::Moderated { id, verdict } = &event {
            tracing::info!(id = *id, verdict = %verdict, "finalized");
        } else if finalized % 1000 == 0 {
            tracing::info!(last_id = event.id(), finalized, "progress");
        }
    }
}
