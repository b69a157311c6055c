//! SwapX: literal find-and-replace and word deletion for text files
//!
//! The engine (`rule_set`, `transformer`, `file_job`, `batch`) has no UI
//! state. Profiles, presets, config, and the CLI build on top of it.
//! The main binary is at src/main.rs.

pub mod backup_manager;
pub mod batch;
pub mod cli;
pub mod config;
pub mod discover;
pub mod error_helpers;
pub mod file_job;
pub mod logger;
pub mod profile;
pub mod report;
pub mod request;
pub mod rule_set;
pub mod transformer;

// Re-export commonly used types for convenience
pub use backup_manager::{BackupManager, BackupMetadata, FileBackup};
pub use batch::{BatchResult, BatchRunner};
pub use file_job::{FileJob, FileResult, OutputOptions};
pub use profile::{JsonProfileStore, MemoryProfileStore, ProfileBook, ProfileStore};
pub use rule_set::{Mode, Operation, RawRule, Rule, RuleSet, RuleSetBuilder, RuleSetDiagnostics};
pub use transformer::{apply, MatchEntry, MatchReport, TextTransformer, Transformed};
