use colored::*;
use similar::{ChangeTag, TextDiff};
use std::io::IsTerminal;

use crate::backup_manager::BackupMetadata;
use crate::batch::BatchResult;
use crate::file_job::FilePreview;
use crate::profile::ProfileBook;
use crate::rule_set::{Candidate, Operation, RawRule, RuleSetDiagnostics};
use crate::transformer::MatchReport;

/// Human-readable rendering of results for the terminal
#[derive(Debug, Clone, Copy)]
pub struct ReportFormatter {
    color: bool,
}

impl ReportFormatter {
    /// Colors on unless `NO_COLOR` is set or stdout is not a terminal
    pub fn detect() -> Self {
        Self {
            color: Self::should_use_color(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    fn should_use_color() -> bool {
        // https://no-color.org/
        if std::env::var_os("NO_COLOR").is_some() {
            return false;
        }
        std::io::stdout().is_terminal()
    }

    fn paint(&self, text: &str, style: impl Fn(&str) -> ColoredString) -> String {
        if self.color {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }

    /// Per-rule counts, one line each
    pub fn format_match_report(&self, report: &MatchReport) -> String {
        if report.is_empty() {
            return format!("{}\n", self.paint("No matches", |s| s.dimmed()));
        }

        let mut output = String::new();
        for entry in report {
            let line = match entry.operation {
                Operation::Replace => format!(
                    "  {} -> {}",
                    self.paint(&format!("{:?}", entry.matched), |s| s.red()),
                    self.paint(&format!("{:?}", entry.replacement), |s| s.green()),
                ),
                Operation::Delete => format!(
                    "  {} {}",
                    self.paint(&format!("{:?}", entry.matched), |s| s.red()),
                    self.paint("deleted", |s| s.dimmed()),
                ),
            };
            output.push_str(&format!("{} x{}\n", line, entry.count));
        }
        output.push_str(&format!(
            "Total: {} match{}\n",
            self.paint(&report.total().to_string(), |s| s.bold()),
            if report.total() == 1 { "" } else { "es" }
        ));
        output
    }

    pub fn format_batch(&self, batch: &BatchResult) -> String {
        let mut output = String::new();

        if !batch.success {
            output.push_str(&format!(
                "{} {}\n",
                self.paint("Error:", |s| s.red().bold()),
                batch.error.as_deref().unwrap_or("batch could not start")
            ));
            return output;
        }

        if batch.results.is_empty() {
            output.push_str("No files to process.\n");
            return output;
        }

        for result in &batch.results {
            let file = result.file.display().to_string();
            if !result.success {
                output.push_str(&format!(
                    "{} {}: {}\n",
                    self.paint("✗", |s| s.red().bold()),
                    self.paint(&file, |s| s.cyan()),
                    result.error.as_deref().unwrap_or("unknown error")
                ));
                continue;
            }

            let matches = match result.match_count() {
                0 => self.paint("no matches", |s| s.dimmed()),
                1 => "1 match".to_string(),
                n => format!("{} matches", n),
            };
            let target = match (&result.output_path, result.overwritten) {
                (_, true) => "overwritten".to_string(),
                (Some(path), false) if result.written => format!("-> {}", path.display()),
                (Some(path), false) => format!("would write {}", path.display()),
                (None, false) => String::new(),
            };
            output.push_str(&format!(
                "{} {} ({}) {}\n",
                self.paint("✓", |s| s.green().bold()),
                self.paint(&file, |s| s.cyan()),
                matches,
                target
            ));
        }

        output.push_str(&format!(
            "\nProcessed {} file{}: {} ok, {} failed, {} total matches\n",
            batch.results.len(),
            if batch.results.len() == 1 { "" } else { "s" },
            self.paint(&batch.succeeded().to_string(), |s| s.green()),
            self.paint(&batch.failed().to_string(), |s| {
                if batch.failed() > 0 { s.red() } else { s.normal() }
            }),
            batch.total_matches()
        ));

        if let Some(id) = &batch.backup_id {
            output.push_str(&format!("Backup ID: {}\n", self.paint(id, |s| s.yellow().bold())));
            output.push_str(&format!(
                "Rollback with: {}\n",
                self.paint(&format!("swapx rollback {}", id), |s| s.bold().yellow())
            ));
        }

        output
    }

    /// Line diff of what a file would become
    pub fn format_preview(&self, preview: &FilePreview) -> String {
        let mut output = format!(
            "{} -> {}\n",
            self.paint(&preview.file.display().to_string(), |s| s.bold().cyan()),
            preview.output_path.display()
        );

        if !preview.transformed.changed() {
            output.push_str(&format!("{}\n", self.paint("No changes", |s| s.dimmed())));
            return output;
        }

        let diff = TextDiff::from_lines(&preview.original, &preview.transformed.output);
        for (idx, group) in diff.grouped_ops(2).iter().enumerate() {
            if idx > 0 {
                output.push_str(&format!("{}\n", self.paint("...", |s| s.dimmed())));
            }
            for op in group {
                for change in diff.iter_changes(op) {
                    let mut line = change.value().to_string();
                    if change.missing_newline() || !line.ends_with('\n') {
                        line.push('\n');
                    }
                    let rendered = match change.tag() {
                        ChangeTag::Delete => self.paint(&format!("-{}", line), |s| s.red()),
                        ChangeTag::Insert => self.paint(&format!("+{}", line), |s| s.green()),
                        ChangeTag::Equal => self.paint(&format!(" {}", line), |s| s.dimmed()),
                    };
                    output.push_str(&rendered);
                }
            }
        }

        output.push_str(&self.format_match_report(&preview.transformed.report));
        output
    }

    /// Warning for candidates that were left out of a rule set, if any
    pub fn format_dropped(
        &self,
        diagnostics: &RuleSetDiagnostics,
        list_invalid: bool,
    ) -> Option<String> {
        if diagnostics.total_dropped() == 0 {
            return None;
        }

        let mut output = format!(
            "{} {} rule{} skipped ({} blank, {} unchanged, {} with invalid characters)\n",
            self.paint("Warning:", |s| s.yellow().bold()),
            diagnostics.total_dropped(),
            if diagnostics.total_dropped() == 1 { "" } else { "s" },
            diagnostics.dropped_blank,
            diagnostics.dropped_identical,
            diagnostics.dropped_invalid.len()
        );
        if list_invalid {
            for candidate in &diagnostics.dropped_invalid {
                output.push_str(&format!("  {:?}\n", candidate));
            }
        }
        Some(output)
    }

    pub fn format_history(&self, backups: &[BackupMetadata]) -> String {
        if backups.is_empty() {
            return "No backup history found.\n".to_string();
        }

        let mut output = format!("{}\n\n", self.paint("Operation History:", |s| s.bold()));
        for backup in backups.iter().rev() {
            output.push_str(&format!("ID: {}\n", self.paint(&backup.id, |s| s.yellow())));
            output.push_str(&format!(
                "  Time: {}\n",
                backup.timestamp.format("%Y-%m-%d %H:%M:%S")
            ));
            if !backup.label.is_empty() {
                output.push_str(&format!("  Label: {}\n", self.paint(&backup.label, |s| s.cyan())));
            }
            output.push_str(&format!("  Rules: {}\n", backup.rule_count));
            output.push_str(&format!("  Files: {}\n\n", backup.files.len()));
        }
        output
    }

    pub fn format_profiles(&self, book: &ProfileBook) -> String {
        let mut output = String::new();
        for name in crate::profile::ProfileStore::list(book) {
            let count = book.rules(&name).map_or(0, <[RawRule]>::len);
            let marker = if name == book.current() { "*" } else { " " };
            output.push_str(&format!(
                "{} {} ({} rule{})\n",
                self.paint(marker, |s| s.green().bold()),
                self.paint(&name, |s| s.bold()),
                count,
                if count == 1 { "" } else { "s" }
            ));
        }
        output
    }

    /// Numbered rule list, 1-based to match `profile remove`
    pub fn format_rules(&self, name: &str, rules: &[RawRule]) -> String {
        let mut output = format!("{}\n", self.paint(name, |s| s.bold().cyan()));
        if rules.is_empty() {
            output.push_str("  (no rules)\n");
            return output;
        }
        for (i, rule) in rules.iter().enumerate() {
            let text = match rule.candidate() {
                Some(Candidate::Replace(old, new)) => format!("replace {:?} -> {:?}", old, new),
                Some(Candidate::Delete(word)) => format!("delete {:?}", word),
                None => self.paint("(unrecognized)", |s| s.dimmed()),
            };
            output.push_str(&format!("  {:>3}. {}\n", i + 1, text));
        }
        output
    }
}
