//! Core data structures for the vocabulary scanner

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Numeric vocabulary identifier as used in `https://klavogonki.ru/vocs/{id}`
pub type VocabId = u64;

/// Classified outcome of probing a single vocabulary ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeStatus {
    /// HTTP 200 - the vocabulary exists and needs moderation
    Found,
    /// HTTP 404 or 403 - the vocabulary does not exist or is hidden
    Absent,
    /// Network failure, timeout, or unexpected status.
    /// Aggregated like `Absent` so it never blocks the pipeline.
    Error,
}

impl ProbeStatus {
    /// Map an HTTP status code to a probe outcome
    pub fn from_http_status(status: u16) -> Self {
        match status {
            200 => Self::Found,
            403 | 404 => Self::Absent,
            _ => Self::Error,
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found => write!(f, "found"),
            Self::Absent => write!(f, "absent"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Result of one probe, reported to the aggregator exactly once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Probed vocabulary ID
    pub id: VocabId,

    /// Classified probe result
    pub status: ProbeStatus,
}

impl ProbeOutcome {
    pub fn new(id: VocabId, status: ProbeStatus) -> Self {
        Self { id, status }
    }
}

/// Operator command during moderation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Record the vocabulary in the approved registry
    Approve,
    /// Drop the vocabulary and move on
    Skip,
    /// Flush the registry and stop the whole scan
    Quit,
}

/// Terminal verdict recorded for a moderated vocabulary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Approved under a category label
    Approved { category: String },
    /// Skipped by the operator
    Skipped,
    /// Skipped by the automatic pre-filter (non-public or excluded kind)
    AutoSkipped { reason: String },
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved { category } => write!(f, "approved [{category}]"),
            Self::Skipped => write!(f, "skipped"),
            Self::AutoSkipped { reason } => write!(f, "auto-skipped ({reason})"),
        }
    }
}

/// A finalized, in-order pipeline event
///
/// Events are emitted by the aggregator in strictly increasing ID order;
/// consumers never observe a gap or a repeat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// The ID resolved as absent (404/403)
    Absent { id: VocabId },
    /// The ID resolved as a probe error (timeout, network, odd status)
    Error { id: VocabId },
    /// A found ID finished moderation
    Moderated { id: VocabId, verdict: Verdict },
}

impl ScanEvent {
    /// The vocabulary ID this event finalizes
    pub fn id(&self) -> VocabId {
        match self {
            Self::Absent { id } | Self::Error { id } | Self::Moderated { id, .. } => *id,
        }
    }
}

// ============================================================================
// Scan Statistics
// ============================================================================

/// Scan statistics (thread-safe)
#[derive(Debug, Default)]
pub struct ScanStats {
    /// Total probe requests issued
    pub requests: AtomicU64,

    /// IDs that resolved as found
    pub found: AtomicU64,

    /// IDs that resolved as absent
    pub absent: AtomicU64,

    /// IDs that resolved as probe errors
    pub errors: AtomicU64,

    /// Vocabularies approved by the operator
    pub approved: AtomicU64,

    /// Vocabularies skipped (manually or by pre-filter)
    pub skipped: AtomicU64,
}

impl ScanStats {
    /// Create a new shared stats counter
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Record an issued probe request
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a probe outcome
    pub fn record_outcome(&self, status: ProbeStatus) {
        match status {
            ProbeStatus::Found => self.found.fetch_add(1, Ordering::Relaxed),
            ProbeStatus::Absent => self.absent.fetch_add(1, Ordering::Relaxed),
            ProbeStatus::Error => self.errors.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Record a moderation verdict
    pub fn record_verdict(&self, verdict: &Verdict) {
        match verdict {
            Verdict::Approved { .. } => self.approved.fetch_add(1, Ordering::Relaxed),
            Verdict::Skipped | Verdict::AutoSkipped { .. } => {
                self.skipped.fetch_add(1, Ordering::Relaxed)
            }
        };
    }

    /// Get snapshot of current stats
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            found: self.found.load(Ordering::Relaxed),
            absent: self.absent.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            approved: self.approved.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of scan statistics
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub requests: u64,
    pub found: u64,
    pub absent: u64,
    pub errors: u64,
    pub approved: u64,
    pub skipped: u64,
}

// ============================================================================
// Vocabulary Kind
// ============================================================================

/// Vocabulary kind as declared on the page ("Тип словаря")
///
/// The Russian page labels map to the category labels used in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VocabularyKind {
    Words,
    Phrases,
    Texts,
    Books,
    Generator,
    /// External URL vocabularies; excluded by the moderation pre-filter
    Url,
    /// Unrecognized page label, kept verbatim
    Other(String),
}

impl VocabularyKind {
    /// Parse the kind from the page's Russian label
    pub fn from_page_label(label: &str) -> Self {
        match label.trim() {
            "Слова" => Self::Words,
            "Фразы" => Self::Phrases,
            "Тексты" => Self::Texts,
            "Книга" => Self::Books,
            "Генератор" => Self::Generator,
            "URL" => Self::Url,
            other => Self::Other(other.to_string()),
        }
    }

    /// Registry category label for this kind
    pub fn category(&self) -> &str {
        match self {
            Self::Words => "words",
            Self::Phrases => "phrases",
            Self::Texts => "texts",
            Self::Books => "books",
            Self::Generator => "generator",
            Self::Url => "url",
            Self::Other(label) => label,
        }
    }
}

impl fmt::Display for VocabularyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.category())
    }
}
