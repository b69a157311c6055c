//! Rule construction for SwapX
//!
//! Raw rows coming from profiles, request payloads or the command line are
//! trimmed, filtered and merged into an ordered `RuleSet` keyed by the matched
//! string. Bad rows are never an error: they are dropped and counted.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Marker left behind by a lossy decode somewhere upstream.
pub const REPLACEMENT_CHAR: char = '\u{FFFD}';

/// Which rule kinds a run applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    All,
    Replace,
    Delete,
}

impl Mode {
    pub fn includes_replace(self) -> bool {
        matches!(self, Mode::All | Mode::Replace)
    }

    pub fn includes_delete(self) -> bool {
        matches!(self, Mode::All | Mode::Delete)
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Mode::All),
            "replace" => Ok(Mode::Replace),
            "delete" => Ok(Mode::Delete),
            other => Err(format!(
                "Invalid mode: {} (must be 'all', 'replace', or 'delete')",
                other
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::All => write!(f, "all"),
            Mode::Replace => write!(f, "replace"),
            Mode::Delete => write!(f, "delete"),
        }
    }
}

/// Operation kind as reported to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Replace,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Replace => write!(f, "replace"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// A single literal replace-or-delete instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Rule {
    Replace { old: String, new: String },
    Delete { word: String },
}

impl Rule {
    /// The literal text this rule looks for
    pub fn matched(&self) -> &str {
        match self {
            Rule::Replace { old, .. } => old,
            Rule::Delete { word } => word,
        }
    }

    /// The text each occurrence is replaced with (empty for deletes)
    pub fn replacement(&self) -> &str {
        match self {
            Rule::Replace { new, .. } => new,
            Rule::Delete { .. } => "",
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Rule::Replace { .. } => Operation::Replace,
            Rule::Delete { .. } => Operation::Delete,
        }
    }
}

/// Ordered, deduplicated collection of rules for one run.
///
/// Iteration order is the first-insertion order of distinct matched strings.
/// Inserting a rule whose matched string is already present replaces that
/// entry in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<Rule>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule, overriding any earlier rule with the same matched string.
    ///
    /// Callers are expected to have validated the rule; `RuleSetBuilder` does.
    pub fn insert(&mut self, rule: Rule) {
        match self.index.get(rule.matched()) {
            Some(&slot) => self.rules[slot] = rule,
            None => {
                self.index.insert(rule.matched().to_string(), self.rules.len());
                self.rules.push(rule);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn get(&self, matched: &str) -> Option<&Rule> {
        self.index.get(matched).map(|&slot| &self.rules[slot])
    }

    /// Build from candidate replace pairs and delete words.
    ///
    /// Replace candidates are evaluated before delete candidates, so with
    /// `Mode::All` a delete wins over a replace for the same matched string.
    pub fn from_candidates<S: AsRef<str>>(
        replace: &[(S, S)],
        delete: &[S],
        mode: Mode,
    ) -> (RuleSet, RuleSetDiagnostics) {
        let mut builder = RuleSetBuilder::new();
        if mode.includes_replace() {
            for (old, new) in replace {
                builder.replace(old.as_ref(), new.as_ref());
            }
        }
        if mode.includes_delete() {
            for word in delete {
                builder.delete(word.as_ref());
            }
        }
        builder.build()
    }

    /// Build from profile rule records, replace records first.
    pub fn from_raw_rules(raw: &[RawRule], mode: Mode) -> (RuleSet, RuleSetDiagnostics) {
        let mut replace = Vec::new();
        let mut delete = Vec::new();
        let mut unrecognized = 0;

        for rule in raw {
            match rule.candidate() {
                Some(Candidate::Replace(old, new)) => replace.push((old, new)),
                Some(Candidate::Delete(word)) => delete.push(word),
                None => unrecognized += 1,
            }
        }

        let mut builder = RuleSetBuilder::new();
        builder.diagnostics.dropped_blank += unrecognized;
        if mode.includes_replace() {
            for (old, new) in replace {
                builder.replace(old, new);
            }
        }
        if mode.includes_delete() {
            for word in delete {
                builder.delete(word);
            }
        }
        builder.build()
    }

    /// Build from a `matched -> replacement` mapping; an empty replacement
    /// means delete. Entries are applied in iteration order.
    pub fn from_mapping<I, K, V>(entries: I) -> (RuleSet, RuleSetDiagnostics)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut builder = RuleSetBuilder::new();
        for (matched, replacement) in entries {
            if replacement.as_ref().trim().is_empty() {
                builder.delete(matched.as_ref());
            } else {
                builder.replace(matched.as_ref(), replacement.as_ref());
            }
        }
        builder.build()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

/// Counts of candidates that did not make it into a `RuleSet`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSetDiagnostics {
    /// Blank, incomplete or unrecognized rows
    pub dropped_blank: usize,
    /// Replace rows whose old and new text are identical
    pub dropped_identical: usize,
    /// Candidates containing U+FFFD, kept verbatim for reporting
    pub dropped_invalid: Vec<String>,
}

impl RuleSetDiagnostics {
    pub fn total_dropped(&self) -> usize {
        self.dropped_blank + self.dropped_identical + self.dropped_invalid.len()
    }
}

/// Incremental builder applying the trimming and filtering rules
#[derive(Debug, Default)]
pub struct RuleSetBuilder {
    rules: RuleSet,
    diagnostics: RuleSetDiagnostics,
}

impl RuleSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, old: &str, new: &str) -> &mut Self {
        let (old, new) = (old.trim(), new.trim());

        if old.contains(REPLACEMENT_CHAR) || new.contains(REPLACEMENT_CHAR) {
            self.drop_invalid(format!("{} -> {}", old, new));
            return self;
        }
        if old.is_empty() || new.is_empty() {
            self.diagnostics.dropped_blank += 1;
            return self;
        }
        if old == new {
            self.diagnostics.dropped_identical += 1;
            return self;
        }

        self.rules.insert(Rule::Replace {
            old: old.to_string(),
            new: new.to_string(),
        });
        self
    }

    pub fn delete(&mut self, word: &str) -> &mut Self {
        let word = word.trim();

        if word.contains(REPLACEMENT_CHAR) {
            self.drop_invalid(word.to_string());
            return self;
        }
        if word.is_empty() {
            self.diagnostics.dropped_blank += 1;
            return self;
        }

        self.rules.insert(Rule::Delete {
            word: word.to_string(),
        });
        self
    }

    fn drop_invalid(&mut self, candidate: String) {
        tracing::warn!(candidate = %candidate, "dropping rule containing U+FFFD");
        self.diagnostics.dropped_invalid.push(candidate);
    }

    pub fn build(self) -> (RuleSet, RuleSetDiagnostics) {
        if self.diagnostics.total_dropped() > 0 {
            tracing::debug!(
                kept = self.rules.len(),
                dropped = self.diagnostics.total_dropped(),
                "rule set built"
            );
        }
        (self.rules, self.diagnostics)
    }
}

/// A rule record as stored in profiles and preset files.
///
/// Current records carry `type` (`replace` with `old`/`new`, `delete` with
/// `word`). Older records have no `type`: `{old, new}` is a replace and
/// `{old, ruleType: "delete"}` is a delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRule {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<String>,
}

/// Borrowed view of what a `RawRule` asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Candidate<'a> {
    Replace(&'a str, &'a str),
    Delete(&'a str),
}

impl RawRule {
    pub fn replace(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            kind: Some("replace".to_string()),
            old: Some(old.into()),
            new: Some(new.into()),
            ..Self::default()
        }
    }

    pub fn delete(word: impl Into<String>) -> Self {
        Self {
            kind: Some("delete".to_string()),
            word: Some(word.into()),
            ..Self::default()
        }
    }

    /// Interpret the record, or `None` if it has no recognizable shape
    pub fn candidate(&self) -> Option<Candidate<'_>> {
        match self.kind.as_deref() {
            Some("replace") => Some(Candidate::Replace(
                self.old.as_deref()?,
                self.new.as_deref()?,
            )),
            Some("delete") => Some(Candidate::Delete(self.word.as_deref()?)),
            Some(_) => None,
            None if self.rule_type.as_deref() == Some("delete") => {
                Some(Candidate::Delete(self.old.as_deref()?))
            }
            None => Some(Candidate::Replace(
                self.old.as_deref()?,
                self.new.as_deref()?,
            )),
        }
    }
}

/// Parse a JSON array of rule records, skipping entries that are not objects
/// of the expected shape instead of failing the whole list.
pub fn rules_from_value(value: &serde_json::Value) -> Vec<RawRule> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// `deserialize_with` adapter for lenient rule lists
pub fn deserialize_lenient_rules<'de, D>(deserializer: D) -> Result<Vec<RawRule>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(rules_from_value(&value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched(rules: &RuleSet) -> Vec<&str> {
        rules.iter().map(Rule::matched).collect()
    }

    #[test]
    fn test_candidates_are_trimmed() {
        let (rules, diag) = RuleSet::from_candidates(&[("  foo ", " bar  ")], &[], Mode::All);
        assert_eq!(rules.len(), 1);
        assert_eq!(
            rules.get("foo"),
            Some(&Rule::Replace {
                old: "foo".to_string(),
                new: "bar".to_string()
            })
        );
        assert_eq!(diag.total_dropped(), 0);
    }

    #[test]
    fn test_blank_and_identical_rows_are_dropped() {
        let (rules, diag) = RuleSet::from_candidates(
            &[("", "x"), ("x", "   "), ("same", "same"), ("a", "b")],
            &["   ", ""],
            Mode::All,
        );
        assert_eq!(matched(&rules), vec!["a"]);
        assert_eq!(diag.dropped_blank, 4);
        assert_eq!(diag.dropped_identical, 1);
    }

    #[test]
    fn test_replacement_char_is_dropped_and_recorded() {
        let (rules, diag) = RuleSet::from_candidates(
            &[("bad\u{FFFD}", "x"), ("ok", "fine\u{FFFD}"), ("good", "better")],
            &["\u{FFFD}oops", "word"],
            Mode::All,
        );
        assert_eq!(matched(&rules), vec!["good", "word"]);
        assert_eq!(diag.dropped_invalid.len(), 3);
        assert!(diag.dropped_invalid[0].starts_with("bad"));
    }

    #[test]
    fn test_delete_overrides_replace_in_all_mode() {
        let (rules, _) = RuleSet::from_candidates(&[("foo", "bar")], &["foo"], Mode::All);
        assert_eq!(rules.len(), 1);
        assert_eq!(
            rules.get("foo"),
            Some(&Rule::Delete {
                word: "foo".to_string()
            })
        );
    }

    #[test]
    fn test_mode_filters_rule_kinds() {
        let replace = [("a", "b")];
        let delete = ["c"];

        let (only_replace, _) = RuleSet::from_candidates(&replace, &delete, Mode::Replace);
        assert_eq!(matched(&only_replace), vec!["a"]);

        let (only_delete, _) = RuleSet::from_candidates(&replace, &delete, Mode::Delete);
        assert_eq!(matched(&only_delete), vec!["c"]);
    }

    #[test]
    fn test_override_keeps_first_insertion_position() {
        let (rules, _) = RuleSet::from_candidates(
            &[("one", "1"), ("two", "2"), ("one", "uno")],
            &[],
            Mode::All,
        );
        assert_eq!(matched(&rules), vec!["one", "two"]);
        assert_eq!(rules.get("one").map(Rule::replacement), Some("uno"));
    }

    #[test]
    fn test_empty_input_gives_empty_rule_set() {
        let empty: [(&str, &str); 0] = [];
        let (rules, diag) = RuleSet::from_candidates(&empty, &[], Mode::All);
        assert!(rules.is_empty());
        assert_eq!(diag, RuleSetDiagnostics::default());
    }

    #[test]
    fn test_from_mapping_treats_empty_value_as_delete() {
        let (rules, _) = RuleSet::from_mapping(vec![("cat", "dog"), ("um", ""), ("  ", "x")]);
        assert_eq!(matched(&rules), vec!["cat", "um"]);
        assert_eq!(rules.get("um").map(Rule::operation), Some(Operation::Delete));
    }

    #[test]
    fn test_raw_rules_current_and_legacy_shapes() {
        let raw: Vec<RawRule> = serde_json::from_str(
            r#"[
                {"type": "delete", "word": "uh"},
                {"type": "replace", "old": "colour", "new": "color"},
                {"old": "teh", "new": "the"},
                {"old": "erm", "ruleType": "delete"},
                {"type": "mystery", "old": "x", "new": "y"},
                {"type": "replace", "old": "half"}
            ]"#,
        )
        .unwrap();

        let (rules, diag) = RuleSet::from_raw_rules(&raw, Mode::All);
        // Replace records come first regardless of their position in the profile
        assert_eq!(matched(&rules), vec!["colour", "teh", "uh", "erm"]);
        assert_eq!(diag.dropped_blank, 2);
    }

    #[test]
    fn test_lenient_rule_list_skips_malformed_entries() {
        let value = serde_json::json!([
            {"type": "replace", "old": "a", "new": "b"},
            42,
            "nope",
            {"type": "delete", "word": 7},
            {"type": "delete", "word": "z"}
        ]);
        let rules = rules_from_value(&value);
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1], RawRule::delete("z"));
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("ALL".parse::<Mode>(), Ok(Mode::All));
        assert_eq!("delete".parse::<Mode>(), Ok(Mode::Delete));
        assert!("both".parse::<Mode>().is_err());
    }
}
