//! Approved-vocabulary registry persistence
//!
//! The registry is a JSON file mapping category labels to sorted sets of
//! approved vocabulary IDs:
//!
//! ```json
//! {
//!   "generatedAt": "2026-08-27T12:00:00Z",
//!   "validVocabularies": {
//!     "words": [152, 893, 4017],
//!     "phrases": [77]
//!   }
//! }
//! ```
//!
//! Every flush merges the in-memory registry into the persisted state with a
//! deduplicating set union - never an overwrite - so repeated flushes and
//! flushes from separate runs are idempotent. Files are written to a temp path
//! and renamed into place so a crash mid-flush cannot corrupt prior state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::error::RegistryError;
use crate::models::VocabId;

/// In-memory set of approved vocabulary IDs, grouped by category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApprovedRegistry {
    categories: BTreeMap<String, BTreeSet<VocabId>>,
}

impl ApprovedRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an approved ID under a category.
    /// Returns false if the ID was already present (set semantics).
    pub fn approve(&mut self, category: &str, id: VocabId) -> bool {
        self.categories
            .entry(category.to_string())
            .or_default()
            .insert(id)
    }

    /// Union another registry into this one
    pub fn merge(&mut self, other: &ApprovedRegistry) {
        for (category, ids) in &other.categories {
            self.categories
                .entry(category.clone())
                .or_default()
                .extend(ids.iter().copied());
        }
    }

    /// Total number of approved IDs across all categories
    pub fn len(&self) -> usize {
        self.categories.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Highest approved ID across all categories
    pub fn max_id(&self) -> Option<VocabId> {
        self.categories
            .values()
            .filter_map(|ids| ids.last().copied())
            .max()
    }

    /// Iterate categories with their sorted ID sets
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<VocabId>)> {
        self.categories.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// IDs approved under one category
    pub fn ids(&self, category: &str) -> Option<&BTreeSet<VocabId>> {
        self.categories.get(category)
    }
}

/// On-disk registry representation
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryFile {
    /// Last flush time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    generated_at: Option<DateTime<Utc>>,

    /// Category label to sorted approved IDs
    #[serde(default)]
    valid_vocabularies: BTreeMap<String, BTreeSet<VocabId>>,
}

/// Loads and flushes the registry file
#[derive(Debug, Clone)]
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the registry file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted registry; a missing file is an empty registry
    pub fn load(&self) -> Result<ApprovedRegistry, RegistryError> {
        if !self.path.exists() {
            return Ok(ApprovedRegistry::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let parsed: RegistryFile = serde_json::from_reader(reader)?;

        Ok(ApprovedRegistry {
            categories: parsed.valid_vocabularies,
        })
    }

    /// Highest vocabulary ID in the persisted registry, if any.
    /// Used to pick the default starting ID for a new scan.
    pub fn max_id(&self) -> Result<Option<VocabId>, RegistryError> {
        Ok(self.load()?.max_id())
    }

    /// Merge `registry` into the persisted state and write it back.
    ///
    /// The merge is a set union with the file's current contents, so flushing
    /// the same in-memory state twice yields identical persisted data.
    /// Returns the total number of persisted IDs after the merge.
    pub fn flush(&self, registry: &ApprovedRegistry) -> Result<usize, RegistryError> {
        let mut merged = self.load()?;
        merged.merge(registry);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write to temp file first, then rename (atomic)
        let temp_path = self.path.with_extension("json.tmp");
        let file = File::create(&temp_path)?;
        let writer = BufWriter::new(file);

        let contents = RegistryFile {
            generated_at: Some(Utc::now()),
            valid_vocabularies: merged.categories.clone(),
        };
        serde_json::to_writer_pretty(writer, &contents)?;

        fs::rename(&temp_path, &self.path)?;

        tracing::debug!(path = %self.path.display(), total = merged.len(), "Registry flushed");
        Ok(merged.len())
    }
}
