//! JSON request and response documents
//!
//! Two requests are understood: transforming a piece of text with a rule list,
//! and processing a list of files with a `matched -> replacement` mapping.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::batch::{BatchResult, BatchRunner};
use crate::rule_set::{deserialize_lenient_rules, Mode, RawRule, RuleSet, RuleSetDiagnostics};
use crate::transformer::{MatchReport, TextTransformer};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TransformTextRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default, deserialize_with = "deserialize_lenient_rules")]
    pub rules: Vec<RawRule>,
    #[serde(default)]
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformTextResponse {
    pub output_text: String,
    pub replacements: MatchReport,
}

impl TransformTextRequest {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid transform request")
    }

    pub fn handle(&self) -> (TransformTextResponse, RuleSetDiagnostics) {
        let (rules, diagnostics) = RuleSet::from_raw_rules(&self.rules, self.mode);
        let transformed = TextTransformer::new(&rules).apply(&self.text);
        let response = TransformTextResponse {
            output_text: transformed.output,
            replacements: transformed.report,
        };
        (response, diagnostics)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProcessFilesRequest {
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub replacements: Map<String, Value>,
    #[serde(default)]
    pub overwrite_original: bool,
}

impl ProcessFilesRequest {
    /// Rules from the mapping, in document order. Entries whose value is not
    /// a string (or null, meaning delete) are skipped.
    pub fn rule_set(&self) -> (RuleSet, RuleSetDiagnostics) {
        let mut skipped = 0;
        let entries: Vec<(&str, &str)> = self
            .replacements
            .iter()
            .filter_map(|(matched, value)| match value {
                Value::String(s) => Some((matched.as_str(), s.as_str())),
                Value::Null => Some((matched.as_str(), "")),
                _ => {
                    skipped += 1;
                    None
                }
            })
            .collect();

        let (rules, mut diagnostics) = RuleSet::from_mapping(entries);
        if skipped > 0 {
            tracing::warn!(skipped, "ignoring non-string replacement values");
        }
        diagnostics.dropped_blank += skipped;
        (rules, diagnostics)
    }

    pub fn handle(&self, runner: &BatchRunner) -> (BatchResult, RuleSetDiagnostics) {
        let (rules, diagnostics) = self.rule_set();
        let batch = runner
            .clone()
            .overwrite(self.overwrite_original)
            .run(&self.files, &rules);
        (batch, diagnostics)
    }
}

/// Parse and run a process-files request; a payload that does not parse
/// yields a fatal `BatchResult` instead of an error
pub fn handle_process_files_json(
    payload: &str,
    runner: &BatchRunner,
) -> (BatchResult, RuleSetDiagnostics) {
    match serde_json::from_str::<ProcessFilesRequest>(payload) {
        Ok(request) => request.handle(runner),
        Err(e) => {
            tracing::warn!(error = %e, "rejecting process-files request");
            (
                BatchResult::fatal(format!("Invalid request: {}", e)),
                RuleSetDiagnostics::default(),
            )
        }
    }
}
