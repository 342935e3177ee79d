//! Interactive moderation of found vocabularies
//!
//! Consumes [`ModerationJob`]s one at a time (the channel has capacity 1, so a
//! second job cannot even be queued while one is open). For each job the gate
//! fetches the full page, extracts the vocabulary fields, applies the
//! automatic pre-filter, and - when the pre-filter passes - asks the operator
//! for a verdict. Every verdict is reported back through
//! [`Aggregator::resolve`], which is what reopens the worker gate.
//!
//! `q` flushes the approved registry to disk immediately and triggers the
//! global shutdown; the held ID stays unresolved.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::{mpsc, Mutex};

use crate::error::Result;
use crate::models::{Decision, ScanStats, Verdict};
use crate::parser::{VocabularyExtractor, VocabularyRecord};
use crate::scanner::aggregator::{Aggregator, ModerationJob};
use crate::scanner::gate::Shutdown;
use crate::scanner::prober::Prober;
use crate::storage::{ApprovedRegistry, RegistryStore};

/// Source of operator decisions
#[async_trait]
pub trait DecisionInput: Send + Sync {
    /// Obtain a verdict for one vocabulary record
    async fn decide(&self, record: &VocabularyRecord) -> Decision;
}

/// Line-based operator input on stdin.
///
/// `a` or `y` approves, `q` quits, anything else (including a bare Enter)
/// skips. A closed stdin reads as quit so a detached terminal cannot leave the
/// scan hanging on a prompt.
pub struct StdinInput {
    reader: Mutex<BufReader<Stdin>>,
}

impl StdinInput {
    pub fn new() -> Self {
        Self {
            reader: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }
}

impl Default for StdinInput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionInput for StdinInput {
    async fn decide(&self, record: &VocabularyRecord) -> Decision {
        println!();
        println!("{}", record.summary());
        if let Some(description) = &record.description {
            println!("  {description}");
        }
        for entry in record.entries.iter().take(3) {
            println!("  > {entry}");
        }
        println!("  {}", record.url);
        print!("[a]pprove / [s]kip / [q]uit > ");
        use std::io::Write;
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        let mut reader = self.reader.lock().await;
        match reader.read_line(&mut line).await {
            Ok(0) => Decision::Quit, // EOF
            Ok(_) => parse_decision(&line),
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed, skipping");
                Decision::Skip
            }
        }
    }
}

/// Pre-recorded decision sequence; draws Skip once the script runs out
pub struct ScriptedInput {
    script: std::sync::Mutex<VecDeque<Decision>>,
}

impl ScriptedInput {
    pub fn new(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            script: std::sync::Mutex::new(decisions.into_iter().collect()),
        }
    }
}

#[async_trait]
impl DecisionInput for ScriptedInput {
    async fn decide(&self, _record: &VocabularyRecord) -> Decision {
        self.script
            .lock()
            .expect("script mutex poisoned")
            .pop_front()
            .unwrap_or(Decision::Skip)
    }
}

fn parse_decision(line: &str) -> Decision {
    match line.trim().to_lowercase().as_str() {
        "a" | "y" => Decision::Approve,
        "q" => Decision::Quit,
        _ => Decision::Skip,
    }
}

/// The single moderation consumer
pub struct ModerationGate {
    prober: Arc<Prober>,
    extractor: VocabularyExtractor,
    aggregator: Arc<Aggregator>,
    store: RegistryStore,
    registry: ApprovedRegistry,
    stats: Arc<ScanStats>,
    shutdown: Shutdown,
    input: Arc<dyn DecisionInput>,
}

impl ModerationGate {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        prober: Arc<Prober>,
        aggregator: Arc<Aggregator>,
        store: RegistryStore,
        registry: ApprovedRegistry,
        stats: Arc<ScanStats>,
        shutdown: Shutdown,
        input: Arc<dyn DecisionInput>,
    ) -> Self {
        Self {
            prober,
            extractor: VocabularyExtractor::new(),
            aggregator,
            store,
            registry,
            stats,
            shutdown,
            input,
        }
    }

    /// Consume moderation jobs until the channel closes or a stop is
    /// requested. Returns the accumulated approved registry for the final
    /// flush.
    ///
    /// # Errors
    ///
    /// Propagates protocol violations from [`Aggregator::resolve`] and
    /// registry I/O failures from the quit-path flush.
    pub async fn run(mut self, mut rx: mpsc::Receiver<ModerationJob>) -> Result<ApprovedRegistry> {
        loop {
            let job = tokio::select! {
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
                () = self.shutdown.triggered() => break,
            };

            if !self.handle(job).await? {
                break;
            }
        }

        Ok(self.registry)
    }

    /// Moderate one job. Returns false when the operator quit.
    async fn handle(&mut self, job: ModerationJob) -> Result<bool> {
        let record = self.load_record(&job).await;

        if let Some(verdict) = prefilter(&record) {
            tracing::info!(id = job.id, verdict = %verdict, "pre-filtered");
            self.stats.record_verdict(&verdict);
            self.aggregator.resolve(job.id, verdict)?;
            return Ok(true);
        }

        let decision = tokio::select! {
            decision = self.input.decide(&record) => decision,
            () = self.shutdown.triggered() => {
                // Ctrl-C while the prompt is open: flush and leave the job
                // unresolved, same as an explicit quit
                self.flush_best_effort();
                return Ok(false);
            }
        };

        match decision {
            Decision::Approve => {
                let category = record.category().to_string();
                self.registry.approve(&category, job.id);
                let verdict = Verdict::Approved { category };
                tracing::info!(id = job.id, verdict = %verdict, "operator verdict");
                self.stats.record_verdict(&verdict);
                self.aggregator.resolve(job.id, verdict)?;
                Ok(true)
            }
            Decision::Skip => {
                tracing::info!(id = job.id, "operator verdict: skipped");
                self.stats.record_verdict(&Verdict::Skipped);
                self.aggregator.resolve(job.id, Verdict::Skipped)?;
                Ok(true)
            }
            Decision::Quit => {
                self.flush_best_effort();
                self.shutdown.trigger();
                Ok(false)
            }
        }
    }

    /// Flush the registry, keeping the scan alive on failure.
    ///
    /// A persistence error must never abort the in-memory approvals or leave
    /// the pipeline stuck; the approvals stay in memory for the scanner's
    /// final flush attempt.
    fn flush_best_effort(&self) {
        match self.store.flush(&self.registry) {
            Ok(total) => tracing::info!(total, "registry flushed, stopping scan"),
            Err(e) => {
                tracing::error!(error = %e, "registry flush failed, approvals kept in memory");
            }
        }
    }

    /// Fetch and extract the vocabulary record, degrading to the fallback
    /// record on any failure so the operator still gets to decide
    async fn load_record(&self, job: &ModerationJob) -> VocabularyRecord {
        let html = match self.prober.fetch_page(job.id).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(id = job.id, error = %e, "page fetch failed, using fallback record");
                return VocabularyRecord::fallback(job.id, &job.url);
            }
        };

        match self.extractor.extract(&html, job.id, &job.url) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(id = job.id, error = %e, "extraction failed, using fallback record");
                VocabularyRecord::fallback(job.id, &job.url)
            }
        }
    }
}

/// Automatic verdicts that never reach the operator
fn prefilter(record: &VocabularyRecord) -> Option<Verdict> {
    if !record.is_public {
        return Some(Verdict::AutoSkipped {
            reason: "not public".to_string(),
        });
    }

    if record.kind == Some(crate::models::VocabularyKind::Url) {
        return Some(Verdict::AutoSkipped {
            reason: "url vocabulary".to_string(),
        });
    }

    None
}
