//! Applying a rule set to one file on disk
//!
//! A job never fails outward: every problem with the file ends up in the
//! returned `FileResult` so a batch can carry on with the next file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::backup_manager::BackupSession;
use crate::config::OutputConfig;
use crate::error_helpers;
use crate::rule_set::RuleSet;
use crate::transformer::{MatchReport, TextTransformer, Transformed};

/// Where and whether transformed text is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputOptions {
    /// Write back to the source path instead of a new file
    pub overwrite: bool,
    /// Inserted before the extension of new files; never empty
    pub suffix: String,
    /// Compute results without writing anything
    pub dry_run: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self::from_config(&OutputConfig::default())
    }
}

impl OutputOptions {
    pub fn from_config(config: &OutputConfig) -> Self {
        Self {
            overwrite: config.overwrite,
            suffix: config.suffix.clone(),
            dry_run: false,
        }
    }
}

/// Outcome for one input file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    pub file: PathBuf,
    pub success: bool,
    pub replacements: MatchReport,
    pub output_path: Option<PathBuf>,
    pub overwritten: bool,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
    /// False for dry runs and failures
    #[serde(default)]
    pub written: bool,
}

impl FileResult {
    pub fn failed(file: &Path, error: impl Into<String>) -> Self {
        Self {
            file: file.to_path_buf(),
            success: false,
            replacements: MatchReport::default(),
            output_path: None,
            overwritten: false,
            error: Some(error.into()),
            backup_path: None,
            written: false,
        }
    }

    /// Total occurrences replaced or deleted in this file
    pub fn match_count(&self) -> usize {
        self.replacements.total()
    }
}

/// Original and transformed text of one file, for previews
#[derive(Debug, Clone)]
pub struct FilePreview {
    pub file: PathBuf,
    pub output_path: PathBuf,
    pub original: String,
    pub transformed: Transformed,
}

/// Runs the transformer over single files
#[derive(Debug, Clone, Copy)]
pub struct FileJob<'a> {
    transformer: TextTransformer<'a>,
    options: &'a OutputOptions,
    backup: Option<&'a BackupSession>,
}

impl<'a> FileJob<'a> {
    pub fn new(rules: &'a RuleSet, options: &'a OutputOptions) -> Self {
        Self {
            transformer: TextTransformer::new(rules),
            options,
            backup: None,
        }
    }

    /// Back up originals into `session` before overwriting them
    pub fn with_backup(mut self, session: &'a BackupSession) -> Self {
        self.backup = Some(session);
        self
    }

    pub fn run(&self, path: &Path) -> FileResult {
        self.run_indexed(0, path)
    }

    /// Run for the `index`-th input of a batch (used to name backups)
    pub fn run_indexed(&self, index: usize, path: &Path) -> FileResult {
        tracing::debug!(file = %path.display(), "processing");

        match self.process(index, path) {
            Ok(result) => {
                tracing::debug!(
                    file = %path.display(),
                    matches = result.match_count(),
                    written = result.written,
                    "processed"
                );
                result
            }
            Err(e) => {
                let message = format!("{:#}", e);
                tracing::warn!(file = %path.display(), error = %message, "file failed");
                FileResult::failed(path, message)
            }
        }
    }

    /// Read and transform without writing
    pub fn preview(&self, path: &Path) -> Result<FilePreview> {
        let original = read_source(path)?;
        let transformed = self.transformer.apply(&original);
        Ok(FilePreview {
            file: path.to_path_buf(),
            output_path: self.destination(path),
            original,
            transformed,
        })
    }

    fn destination(&self, path: &Path) -> PathBuf {
        if self.options.overwrite {
            path.to_path_buf()
        } else {
            derive_output_path(path, &self.options.suffix)
        }
    }

    fn process(&self, index: usize, path: &Path) -> Result<FileResult> {
        let source = read_source(path)?;
        let transformed = self.transformer.apply(&source);
        let output_path = self.destination(path);
        let overwrite = self.options.overwrite;

        let mut result = FileResult {
            file: path.to_path_buf(),
            success: true,
            replacements: transformed.report,
            output_path: Some(output_path.clone()),
            overwritten: overwrite,
            error: None,
            backup_path: None,
            written: false,
        };

        if self.options.dry_run {
            return Ok(result);
        }

        if overwrite {
            // Follow symlinks so the link itself survives
            let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
            ensure_writable(path, &target)?;

            if let Some(session) = self.backup {
                let backup_path = session
                    .store(index, path)
                    .context("Original left untouched because the backup failed")?;
                result.backup_path = Some(backup_path);
            }
            let permissions = fs::metadata(&target).ok().map(|m| m.permissions());
            write_atomically(&target, &transformed.output, permissions)?;
        } else {
            write_atomically(&output_path, &transformed.output, None)?;
        }

        // Files with zero matches are still written
        result.written = true;
        Ok(result)
    }
}

/// Run one file with default output settings
pub fn run(path: &Path, rules: &RuleSet, overwrite: bool) -> FileResult {
    let options = OutputOptions {
        overwrite,
        ..OutputOptions::default()
    };
    FileJob::new(rules, &options).run(path)
}

/// Read a whole file as UTF-8
pub fn read_source(path: &Path) -> Result<String> {
    let metadata = fs::metadata(path)
        .map_err(|e| anyhow::anyhow!(error_helpers::io_error(path, "reading", &e)))?;
    if !metadata.is_file() {
        anyhow::bail!(error_helpers::not_a_file_error(path));
    }

    let bytes = fs::read(path)
        .map_err(|e| anyhow::anyhow!(error_helpers::io_error(path, "reading", &e)))?;

    String::from_utf8(bytes).map_err(|e| {
        anyhow::anyhow!(error_helpers::invalid_utf8_error(
            path,
            e.utf8_error().valid_up_to()
        ))
    })
}

/// `<dir>/<stem><suffix>[.<ext>]`, or the first free `<stem><suffix>_<n>[.<ext>]`.
///
/// `suffix` must be non-empty, which keeps the result distinct from `source`.
pub fn derive_output_path(source: &Path, suffix: &str) -> PathBuf {
    let parent = source.parent().unwrap_or_else(|| Path::new(""));
    let stem = source.file_stem().unwrap_or_default();

    let build = |counter: Option<usize>| {
        let mut name = OsString::from(stem);
        name.push(suffix);
        if let Some(n) = counter {
            name.push(format!("_{}", n));
        }
        if let Some(ext) = source.extension() {
            name.push(".");
            name.push(ext);
        }
        parent.join(name)
    };

    let mut candidate = build(None);
    let mut counter = 1;
    while candidate.exists() {
        candidate = build(Some(counter));
        counter += 1;
    }
    candidate
}

/// Replacing a file by rename only needs access to its directory, so a
/// write-protected original has to be refused explicitly.
fn ensure_writable(path: &Path, target: &Path) -> Result<()> {
    let metadata = fs::metadata(target)
        .map_err(|e| anyhow::anyhow!(error_helpers::io_error(path, "writing", &e)))?;
    if metadata.permissions().readonly() {
        anyhow::bail!(error_helpers::permission_error(path, "writing"));
    }

    fs::OpenOptions::new()
        .write(true)
        .open(target)
        .map_err(|e| anyhow::anyhow!(error_helpers::io_error(path, "writing", &e)))?;
    Ok(())
}

/// Write through a temp file in the destination directory, then rename it
/// over the destination.
fn write_atomically(
    destination: &Path,
    content: &str,
    permissions: Option<fs::Permissions>,
) -> Result<()> {
    let dir = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp_file = NamedTempFile::new_in(dir)
        .map_err(|e| anyhow::anyhow!(error_helpers::io_error(dir, "writing to", &e)))?;

    temp_file
        .write_all(content.as_bytes())
        .and_then(|_| temp_file.flush())
        .map_err(|e| anyhow::anyhow!(error_helpers::io_error(destination, "writing", &e)))?;

    if let Some(permissions) = permissions {
        fs::set_permissions(temp_file.path(), permissions).with_context(|| {
            format!("Failed to copy permissions to {}", destination.display())
        })?;
    }

    temp_file
        .persist(destination)
        .map_err(|e| anyhow::anyhow!(error_helpers::io_error(destination, "writing", &e.error)))?;

    Ok(())
}
