//! vocscan - Klavogonki vocabulary scanner
//!
//! Enumerates numeric vocabulary IDs on klavogonki.ru, probes them concurrently
//! over HTTP, and funnels existing entries through an interactive moderation
//! stage while keeping all output in strictly increasing ID order.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`scanner`] - Concurrent ID probing, ordered aggregation, and moderation
//! - [`parser`] - Vocabulary page field extraction
//! - [`classify`] - Script classification of vocabulary content
//! - [`models`] - Core data structures and types
//! - [`storage`] - Approved-ID registry persistence
//!
//! # Example
//!
//! ```no_run
//! use vocscan::config::Config;
//! use vocscan::scanner::{Scanner, StdinInput};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let scanner = Scanner::new(config)?;
//!     let report = scanner.run(Arc::new(StdinInput::new())).await?;
//!     println!("approved {} vocabularies", report.approved);
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod config;
pub mod error;
pub mod models;
pub mod parser;
pub mod scanner;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::classify::Label;
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::models::{ProbeOutcome, ProbeStatus, ScanStats, Verdict, VocabId};
    pub use crate::parser::VocabularyRecord;
    pub use crate::scanner::Scanner;
    pub use crate::storage::RegistryStore;
}

// Direct re-exports for convenience
pub use models::{ProbeOutcome, ProbeStatus, VocabId};
