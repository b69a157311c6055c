//! Sequential literal substitution
//!
//! Rules run one after another against the current text, so an earlier rule
//! can create or remove occurrences for a later one. Within a single rule,
//! matches are found left to right without overlap and the inserted text is
//! never rescanned.

use crate::rule_set::{Operation, Rule, RuleSet};
use serde::{Deserialize, Serialize};

/// Match count for one rule in one transform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEntry {
    pub matched: String,
    pub replacement: String,
    pub operation: Operation,
    pub count: usize,
}

/// Per-rule counts in rule order. Rules that matched nothing are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchReport {
    entries: Vec<MatchEntry>,
}

impl MatchReport {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatchEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[MatchEntry] {
        &self.entries
    }

    /// Sum of all counts
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }

    fn record(&mut self, rule: &Rule, count: usize) {
        if count == 0 {
            return;
        }
        self.entries.push(MatchEntry {
            matched: rule.matched().to_string(),
            replacement: rule.replacement().to_string(),
            operation: rule.operation(),
            count,
        });
    }
}

impl<'a> IntoIterator for &'a MatchReport {
    type Item = &'a MatchEntry;
    type IntoIter = std::slice::Iter<'a, MatchEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Output of a transform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub output: String,
    pub report: MatchReport,
}

impl Transformed {
    pub fn changed(&self) -> bool {
        !self.report.is_empty()
    }
}

/// Applies a `RuleSet` to in-memory text
#[derive(Debug, Clone, Copy)]
pub struct TextTransformer<'a> {
    rules: &'a RuleSet,
}

impl<'a> TextTransformer<'a> {
    pub fn new(rules: &'a RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &'a RuleSet {
        self.rules
    }

    pub fn apply(&self, text: &str) -> Transformed {
        let mut current = text.to_string();
        let mut report = MatchReport::default();

        for rule in self.rules {
            if let Some((next, count)) =
                replace_counting(&current, rule.matched(), rule.replacement())
            {
                current = next;
                report.record(rule, count);
            }
        }

        Transformed {
            output: current,
            report,
        }
    }
}

/// Apply `rules` to `text`
pub fn apply(text: &str, rules: &RuleSet) -> Transformed {
    TextTransformer::new(rules).apply(text)
}

/// Replace every non-overlapping occurrence of `from`, scanning left to right.
///
/// Returns `None` when there is nothing to replace so the caller can keep its
/// buffer. `from` must be non-empty.
fn replace_counting(text: &str, from: &str, to: &str) -> Option<(String, usize)> {
    debug_assert!(!from.is_empty());

    let mut matches = text.match_indices(from).peekable();
    matches.peek()?;

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut count = 0;
    for (start, part) in matches {
        out.push_str(&text[last..start]);
        out.push_str(to);
        last = start + part.len();
        count += 1;
    }
    out.push_str(&text[last..]);

    Some((out, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule_set::{Mode, RuleSetBuilder};

    fn rules(pairs: &[(&str, &str)]) -> RuleSet {
        let (rules, _) = RuleSet::from_mapping(pairs.iter().copied());
        rules
    }

    #[test]
    fn test_empty_text() {
        let result = apply("", &rules(&[("a", "b")]));
        assert_eq!(result.output, "");
        assert!(result.report.is_empty());
    }

    #[test]
    fn test_empty_rule_set_is_identity() {
        let result = apply("leave me alone", &RuleSet::new());
        assert_eq!(result.output, "leave me alone");
        assert!(result.report.is_empty());
        assert!(!result.changed());
    }

    #[test]
    fn test_single_replace_counts_occurrences() {
        let result = apply("the cat sat on the mat", &rules(&[("the", "a")]));
        assert_eq!(result.output, "a cat sat on a mat");
        assert_eq!(result.report.len(), 1);
        assert_eq!(result.report.entries()[0].count, 2);
        assert_eq!(result.report.entries()[0].operation, Operation::Replace);
    }

    #[test]
    fn test_replacement_is_not_rescanned() {
        let result = apply("aaa", &rules(&[("a", "aa")]));
        assert_eq!(result.output, "aaaaaa");
        assert_eq!(result.report.entries()[0].count, 3);
    }

    #[test]
    fn test_matches_do_not_overlap() {
        let result = apply("aaaa", &rules(&[("aa", "b")]));
        assert_eq!(result.output, "bb");
        assert_eq!(result.report.total(), 2);

        let result = apply("aaa", &rules(&[("aa", "b")]));
        assert_eq!(result.output, "ba");
        assert_eq!(result.report.total(), 1);
    }

    #[test]
    fn test_cascading_order() {
        let result = apply("x", &rules(&[("x", "y"), ("y", "z")]));
        assert_eq!(result.output, "z");
        let counts: Vec<_> = result
            .report
            .iter()
            .map(|e| (e.matched.as_str(), e.count))
            .collect();
        assert_eq!(counts, vec![("x", 1), ("y", 1)]);
    }

    #[test]
    fn test_earlier_rule_can_destroy_later_matches() {
        let result = apply("foobar", &rules(&[("foo", "baz"), ("foobar", "nope")]));
        assert_eq!(result.output, "bazbar");
        assert_eq!(result.report.len(), 1);
    }

    #[test]
    fn test_zero_count_rules_are_omitted() {
        let result = apply("hello", &rules(&[("zzz", "y"), ("ell", "ipp")]));
        assert_eq!(result.output, "hippo");
        assert_eq!(result.report.len(), 1);
        assert_eq!(result.report.entries()[0].matched, "ell");
    }

    #[test]
    fn test_delete_reports_delete_operation() {
        let mut builder = RuleSetBuilder::new();
        builder.delete(" um ");
        let (rules, _) = builder.build();

        let result = apply("I um think um yes", &rules);
        assert_eq!(result.output, "I  think  yes");
        assert_eq!(result.report.entries()[0].operation, Operation::Delete);
        assert_eq!(result.report.entries()[0].replacement, "");
        assert_eq!(result.report.entries()[0].count, 2);
    }

    #[test]
    fn test_multibyte_text() {
        let (rules, _) = RuleSet::from_candidates(&[("เบาๆ", "เบาเบา")], &["ๆ"], Mode::All);
        let result = apply("เบาๆ ช้าๆ", &rules);
        assert_eq!(result.output, "เบาเบา ช้า");
        assert_eq!(result.report.total(), 2);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let result = apply("Foo foo FOO", &rules(&[("foo", "bar")]));
        assert_eq!(result.output, "Foo bar FOO");
    }

    #[test]
    fn test_report_serializes_as_list() {
        let result = apply("ab", &rules(&[("a", "c")]));
        let json = serde_json::to_value(&result.report).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"matched": "a", "replacement": "c", "operation": "replace", "count": 1}
            ])
        );
    }
}
