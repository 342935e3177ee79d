//! Ordered aggregation of out-of-order probe results
//!
//! Probes complete in arbitrary order; the aggregator buffers outcomes and
//! finalizes them in strictly increasing, gap-free ID order. Absent and error
//! outcomes drain freely. The first in-order Found outcome closes the worker
//! gate, hands the ID to the moderation channel (capacity 1), and holds the
//! cursor until moderation resolves that single ID.
//!
//! Invariants:
//! - `next_expected` never advances past an unresolved Found ID
//! - at most one ID is in moderation at any time
//! - the worker gate is closed for the whole Found-detected to Resolved window
//!
//! All state transitions happen under one mutex, making `report`/`resolve` a
//! single critical section as far as ordering is concerned.

use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::models::{ProbeOutcome, ProbeStatus, ScanEvent, Verdict, VocabId};
use crate::scanner::gate::{Shutdown, WorkerGate};

/// A Found ID handed to the moderation gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationJob {
    /// Vocabulary ID awaiting a verdict
    pub id: VocabId,

    /// Full page URL
    pub url: String,
}

/// Aggregator state guarded by the mutex
#[derive(Debug)]
struct Inner {
    /// Outcomes that arrived but are not yet finalized.
    /// Every key is >= `next_expected`.
    pending: BTreeMap<VocabId, ProbeStatus>,

    /// The next ID that must be resolved before any higher ID may be emitted
    next_expected: VocabId,

    /// ID currently held by the moderation gate, if any
    moderating: Option<VocabId>,
}

/// Buffers out-of-order probe outcomes and emits them strictly in ID order
#[derive(Debug)]
pub struct Aggregator {
    inner: Mutex<Inner>,
    gate: std::sync::Arc<WorkerGate>,
    moderation_tx: mpsc::Sender<ModerationJob>,
    events_tx: mpsc::UnboundedSender<ScanEvent>,
    shutdown: Shutdown,
    base_url: String,
}

impl Aggregator {
    pub fn new(
        start: VocabId,
        base_url: impl Into<String>,
        gate: std::sync::Arc<WorkerGate>,
        moderation_tx: mpsc::Sender<ModerationJob>,
        events_tx: mpsc::UnboundedSender<ScanEvent>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                pending: BTreeMap::new(),
                next_expected: start,
                moderating: None,
            }),
            gate,
            moderation_tx,
            events_tx,
            shutdown,
            base_url: base_url.into(),
        }
    }

    /// Record one probe outcome and drain as far as possible.
    ///
    /// A duplicate report for an unresolved ID silently overwrites; the status
    /// of a given ID is deterministic within a run, so the overwrite is
    /// harmless and cheaper than tracking it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if a Found ID surfaces while another
    /// moderation is still unresolved. That cannot happen while the invariants
    /// hold and there is no safe recovery, so the scan must stop.
    pub fn report(&self, outcome: ProbeOutcome) -> Result<()> {
        let mut inner = self.inner.lock().expect("aggregator mutex poisoned");

        if self.shutdown.is_triggered() {
            return Ok(());
        }

        inner.pending.insert(outcome.id, outcome.status);
        self.drain_locked(&mut inner)
    }

    /// Finalize the ID currently in moderation and continue draining.
    ///
    /// Reopens the worker gate unless draining immediately surfaced the next
    /// Found ID, in which case the gate stays closed for that moderation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if `id` is not the ID currently in
    /// moderation.
    pub fn resolve(&self, id: VocabId, verdict: Verdict) -> Result<()> {
        let mut inner = self.inner.lock().expect("aggregator mutex poisoned");

        match inner.moderating {
            Some(current) if current == id => {}
            Some(current) => {
                return Err(Error::protocol(format!(
                    "resolve for id {id} while id {current} is in moderation"
                )));
            }
            None => {
                return Err(Error::protocol(format!(
                    "resolve for id {id} with no moderation in flight"
                )));
            }
        }

        inner.pending.remove(&id);
        inner.next_expected = id + 1;
        inner.moderating = None;
        self.emit(ScanEvent::Moderated { id, verdict });

        self.drain_locked(&mut inner)?;

        if inner.moderating.is_none() && !self.shutdown.is_triggered() {
            self.gate.resume();
        }
        Ok(())
    }

    /// The next ID that has not been finalized yet
    pub fn next_expected(&self) -> VocabId {
        self.inner
            .lock()
            .expect("aggregator mutex poisoned")
            .next_expected
    }

    /// Number of buffered, not yet finalized outcomes
    pub fn pending_len(&self) -> usize {
        self.inner
            .lock()
            .expect("aggregator mutex poisoned")
            .pending
            .len()
    }

    /// Walk forward from `next_expected`, finalizing everything in order until
    /// a gap, a Found ID, or a stop request.
    fn drain_locked(&self, inner: &mut Inner) -> Result<()> {
        while inner.moderating.is_none() && !self.shutdown.is_triggered() {
            let id = inner.next_expected;
            let Some(status) = inner.pending.get(&id).copied() else {
                break;
            };

            match status {
                ProbeStatus::Found => {
                    // Entry stays pending until moderation resolves it
                    inner.moderating = Some(id);
                    self.gate.pause();

                    let job = ModerationJob {
                        id,
                        url: format!("{}{}", self.base_url, id),
                    };
                    if self.moderation_tx.try_send(job).is_err() {
                        return Err(Error::protocol(format!(
                            "moderation channel refused id {id}: a moderation is already in flight"
                        )));
                    }

                    tracing::info!(id, "found - moderation needed, workers paused");
                    break;
                }
                ProbeStatus::Absent => {
                    inner.pending.remove(&id);
                    inner.next_expected = id + 1;
                    tracing::debug!(id, "absent");
                    self.emit(ScanEvent::Absent { id });
                }
                ProbeStatus::Error => {
                    inner.pending.remove(&id);
                    inner.next_expected = id + 1;
                    tracing::debug!(id, "probe error, treated as absent");
                    self.emit(ScanEvent::Error { id });
                }
            }
        }
        Ok(())
    }

    fn emit(&self, event: ScanEvent) {
        // The consumer may already be gone during shutdown
        let _ = self.events_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProbeStatus::{Absent, Error as ProbeErr, Found};
    use std::sync::Arc;

    struct Harness {
        aggregator: Aggregator,
        gate: Arc<WorkerGate>,
        moderation_rx: mpsc::Receiver<ModerationJob>,
        events_rx: mpsc::UnboundedReceiver<ScanEvent>,
        shutdown: Shutdown,
    }

    fn harness(start: VocabId) -> Harness {
        let gate = Arc::new(WorkerGate::new());
        let shutdown = Shutdown::new();
        let (moderation_tx, moderation_rx) = mpsc::channel(1);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let aggregator = Aggregator::new(
            start,
            "https://klavogonki.ru/vocs/",
            Arc::clone(&gate),
            moderation_tx,
            events_tx,
            shutdown.clone(),
        );
        Harness {
            aggregator,
            gate,
            moderation_rx,
            events_rx,
            shutdown,
        }
    }

    fn report(h: &Harness, id: VocabId, status: ProbeStatus) {
        h.aggregator.report(ProbeOutcome::new(id, status)).unwrap();
    }

    fn drain_events(h: &mut Harness) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        while let Ok(event) = h.events_rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_in_order_absent_drain() {
        let mut h = harness(1);
        report(&h, 1, Absent);
        report(&h, 2, Absent);
        report(&h, 3, ProbeErr);

        let ids: Vec<_> = drain_events(&mut h).iter().map(ScanEvent::id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(h.aggregator.next_expected(), 4);
        assert!(h.gate.is_open());
    }

    #[test]
    fn test_out_of_order_buffering() {
        let mut h = harness(1);
        report(&h, 3, Absent);
        report(&h, 2, Absent);
        assert!(drain_events(&mut h).is_empty(), "held until 1 arrives");

        report(&h, 1, Absent);
        let ids: Vec<_> = drain_events(&mut h).iter().map(ScanEvent::id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(h.aggregator.pending_len(), 0);
    }

    /// Canonical interleaving: 404,200,404,200,403 for IDs 1-5, arriving as
    /// 3,1,5,2,4. Finalization must be strictly 1,2,3,4,5 with moderation
    /// pauses at 2 and 4.
    #[test]
    fn test_moderation_scenario() {
        let mut h = harness(1);

        report(&h, 3, Absent); // 404
        report(&h, 1, Absent); // 404
        report(&h, 5, Absent); // 403
        report(&h, 2, Found); //  200
        report(&h, 4, Found); //  200

        // 1 finalized; 2 is in moderation; 3..5 held
        assert_eq!(
            drain_events(&mut h),
            vec![ScanEvent::Absent { id: 1 }]
        );
        assert!(!h.gate.is_open(), "gate closed while 2 is moderated");
        let job = h.moderation_rx.try_recv().unwrap();
        assert_eq!(job.id, 2);
        assert_eq!(job.url, "https://klavogonki.ru/vocs/2");

        h.aggregator
            .resolve(
                2,
                Verdict::Approved {
                    category: "words".into(),
                },
            )
            .unwrap();

        // 2 and 3 finalized, then 4 held in moderation again
        let events = drain_events(&mut h);
        assert_eq!(events.iter().map(ScanEvent::id).collect::<Vec<_>>(), vec![2, 3]);
        assert!(!h.gate.is_open(), "gate stays closed: 4 surfaced immediately");
        assert_eq!(h.moderation_rx.try_recv().unwrap().id, 4);

        h.aggregator.resolve(4, Verdict::Skipped).unwrap();

        let events = drain_events(&mut h);
        assert_eq!(events.iter().map(ScanEvent::id).collect::<Vec<_>>(), vec![4, 5]);
        assert!(h.gate.is_open(), "gate reopened after last moderation");
        assert_eq!(h.aggregator.next_expected(), 6);
        assert_eq!(h.aggregator.pending_len(), 0);
    }

    #[test]
    fn test_error_outcome_never_blocks() {
        let mut h = harness(7);
        report(&h, 7, ProbeErr); // e.g. timeout
        report(&h, 8, Absent);

        let ids: Vec<_> = drain_events(&mut h).iter().map(ScanEvent::id).collect();
        assert_eq!(ids, vec![7, 8]);
        assert!(h.gate.is_open());
    }

    #[test]
    fn test_resolve_wrong_id_is_protocol_violation() {
        let mut h = harness(1);
        report(&h, 1, Found);
        let _ = h.moderation_rx.try_recv().unwrap();

        let err = h.aggregator.resolve(9, Verdict::Skipped).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_resolve_without_moderation_is_protocol_violation() {
        let h = harness(1);
        let err = h.aggregator.resolve(1, Verdict::Skipped).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_duplicate_report_overwrites_silently() {
        let mut h = harness(1);
        report(&h, 2, Absent);
        report(&h, 2, Absent); // later report overwrites the buffered entry
        report(&h, 1, Absent);

        let ids: Vec<_> = drain_events(&mut h).iter().map(ScanEvent::id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_shutdown_stops_draining() {
        let mut h = harness(1);
        h.shutdown.trigger();
        report(&h, 1, Absent);
        assert!(drain_events(&mut h).is_empty());
        assert_eq!(h.aggregator.next_expected(), 1);
    }

    #[test]
    fn test_gate_closed_between_found_and_resolve() {
        let mut h = harness(1);
        report(&h, 1, Found);
        assert!(!h.gate.is_open());

        // More reports arrive while moderation is pending; gate stays closed
        report(&h, 2, Absent);
        report(&h, 3, Found);
        assert!(!h.gate.is_open());
        assert!(drain_events(&mut h).is_empty());

        h.moderation_rx.try_recv().unwrap();
        h.aggregator.resolve(1, Verdict::Skipped).unwrap();

        // 1 and 2 finalized, 3 enters moderation, gate still closed
        let events = drain_events(&mut h);
        assert_eq!(events.iter().map(ScanEvent::id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(!h.gate.is_open());

        h.moderation_rx.try_recv().unwrap();
        h.aggregator.resolve(3, Verdict::Skipped).unwrap();
        assert!(h.gate.is_open());
    }

    mod ordering_property {
        use super::*;
        use proptest::prelude::*;

        /// Drive a full scan of `statuses` (ID 1..=len) delivered in
        /// `order`, auto-resolving every moderation, and return the
        /// finalized ID sequence.
        fn run_interleaving(statuses: &[ProbeStatus], order: &[usize]) -> Vec<VocabId> {
            let mut h = harness(1);
            let mut finalized = Vec::new();

            for &idx in order {
                let id = (idx + 1) as VocabId;
                h.aggregator
                    .report(ProbeOutcome::new(id, statuses[idx]))
                    .unwrap();

                // Resolve any moderation the report surfaced, plus the chain
                // of moderations each resolution may surface next.
                while let Ok(job) = h.moderation_rx.try_recv() {
                    assert!(!h.gate.is_open());
                    h.aggregator.resolve(job.id, Verdict::Skipped).unwrap();
                }

                while let Ok(event) = h.events_rx.try_recv() {
                    finalized.push(event.id());
                }
            }

            assert!(h.gate.is_open());
            finalized
        }

        proptest! {
            #[test]
            fn finalization_is_gap_free_and_ordered(
                statuses in prop::collection::vec(
                    prop_oneof![Just(Absent), Just(Found), Just(ProbeErr)],
                    1..40,
                ),
                seed in any::<u64>(),
            ) {
                use rand::seq::SliceRandom;
                use rand::SeedableRng;

                let mut order: Vec<usize> = (0..statuses.len()).collect();
                let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
                order.shuffle(&mut rng);

                let finalized = run_interleaving(&statuses, &order);
                let expected: Vec<VocabId> = (1..=statuses.len() as VocabId).collect();
                prop_assert_eq!(finalized, expected);
            }
        }
    }
}
