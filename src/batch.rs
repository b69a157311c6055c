//! Running a rule set over many files
//!
//! Files are processed on a bounded rayon pool. Each file is independent, and
//! results are collected from an indexed parallel iterator so they always
//! come back in input order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::backup_manager::{BackupManager, FileBackup};
use crate::file_job::{FileJob, FileResult, OutputOptions};
use crate::rule_set::RuleSet;

/// Outcome of a whole batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// False only when the batch could not start
    pub success: bool,
    pub results: Vec<FileResult>,
    pub error: Option<String>,
    /// Backup taken before overwriting, if any
    #[serde(default, rename = "backupId", skip_serializing_if = "Option::is_none")]
    pub backup_id: Option<String>,
}

impl BatchResult {
    pub fn completed(results: Vec<FileResult>) -> Self {
        Self {
            success: true,
            results,
            error: None,
            backup_id: None,
        }
    }

    /// A batch that never ran
    pub fn fatal(error: impl Into<String>) -> Self {
        Self {
            success: false,
            results: Vec::new(),
            error: Some(error.into()),
            backup_id: None,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// Total occurrences replaced or deleted across all files
    pub fn total_matches(&self) -> usize {
        self.results.iter().map(FileResult::match_count).sum()
    }
}

/// Runs `FileJob` over a list of paths
#[derive(Debug, Clone, Default)]
pub struct BatchRunner {
    options: OutputOptions,
    jobs: usize,
    backups: Option<BackupManager>,
    label: String,
}

impl BatchRunner {
    pub fn new(options: OutputOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Worker threads; 0 means one per CPU, 1 runs on a single worker
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Back up originals here before overwriting them
    pub fn backups(mut self, manager: BackupManager) -> Self {
        self.backups = Some(manager);
        self
    }

    /// Description stored with backups
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.options.overwrite = overwrite;
        self
    }

    pub fn options(&self) -> &OutputOptions {
        &self.options
    }

    pub fn run(&self, paths: &[PathBuf], rules: &RuleSet) -> BatchResult {
        let needs_backup = self.options.overwrite && !self.options.dry_run && !paths.is_empty();

        let session = match (&self.backups, needs_backup) {
            (Some(manager), true) => match manager.begin(&self.label, rules.len()) {
                Ok(session) => Some(session),
                Err(e) => {
                    return BatchResult::fatal(format!(
                        "Cannot start: backup could not be created: {:#}",
                        e
                    ));
                }
            },
            _ => None,
        };

        let mut job = FileJob::new(rules, &self.options);
        if let Some(session) = &session {
            job = job.with_backup(session);
        }

        let results = self.execute(&job, paths);
        let mut batch = BatchResult::completed(results);

        if let (Some(manager), Some(session)) = (&self.backups, session) {
            let stored: Vec<FileBackup> = batch
                .results
                .iter()
                .filter_map(|r| {
                    r.backup_path.as_ref().map(|backup_path| FileBackup {
                        original_path: r.file.clone(),
                        backup_path: backup_path.clone(),
                    })
                })
                .collect();

            // The files are already written; a metadata failure only loses rollback
            match manager.finish(session, stored) {
                Ok(id) => batch.backup_id = id,
                Err(e) => tracing::warn!(error = %format!("{:#}", e), "backup metadata not saved"),
            }
        }

        tracing::info!(
            files = batch.results.len(),
            failed = batch.failed(),
            matches = batch.total_matches(),
            "batch finished"
        );
        batch
    }

    fn execute(&self, job: &FileJob<'_>, paths: &[PathBuf]) -> Vec<FileResult> {
        let earlier = duplicate_of(paths);
        let run_one = |index: usize, path: &PathBuf| match earlier[index] {
            Some(first) => {
                tracing::warn!(file = %path.display(), first, "duplicate input skipped");
                FileResult::failed(
                    path,
                    format!("Duplicate input: same file as input #{}", first + 1),
                )
            }
            None => job.run_indexed(index, path),
        };

        let run_all = || {
            paths
                .par_iter()
                .enumerate()
                .map(|(index, path)| run_one(index, path))
                .collect::<Vec<_>>()
        };

        match rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build() {
            Ok(pool) => pool.install(run_all),
            Err(e) => {
                tracing::warn!(error = %e, "thread pool unavailable, running sequentially");
                paths
                    .iter()
                    .enumerate()
                    .map(|(index, path)| run_one(index, path))
                    .collect()
            }
        }
    }
}

/// For each input, the index of an earlier input naming the same file.
///
/// Paths are compared after resolving symlinks and `..`; paths that cannot
/// be resolved (missing files) are compared as written.
fn duplicate_of(paths: &[PathBuf]) -> Vec<Option<usize>> {
    let mut first_index: HashMap<PathBuf, usize> = HashMap::new();
    paths
        .iter()
        .enumerate()
        .map(|(index, path)| {
            let key = fs::canonicalize(path).unwrap_or_else(|_| path.clone());
            match first_index.get(&key) {
                Some(&first) => Some(first),
                None => {
                    first_index.insert(key, index);
                    None
                }
            }
        })
        .collect()
}

/// Run a batch with default output settings
pub fn run(paths: &[PathBuf], rules: &RuleSet, overwrite: bool) -> BatchResult {
    BatchRunner::new(OutputOptions::default())
        .overwrite(overwrite)
        .run(paths, rules)
}

/// Paths of successfully written outputs, in input order
pub fn written_outputs(batch: &BatchResult) -> Vec<&Path> {
    batch
        .results
        .iter()
        .filter(|r| r.written)
        .filter_map(|r| r.output_path.as_deref())
        .collect()
}
