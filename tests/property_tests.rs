//! Property-based tests for SwapX
//!
//! This module uses proptest to check the substitution engine against
//! invariants that must hold for any input text and rule list.

use std::fs;
use tempfile::TempDir;

use swapx::file_job;
use swapx::{apply, Mode, Operation, Rule, RuleSet};

// Import proptest macro
use proptest::prelude::*;

fn replace_rules(pairs: &[(String, String)]) -> RuleSet {
    let (rules, _) = RuleSet::from_candidates(pairs, &[], Mode::All);
    rules
}

// ============================================================================
// Property 1: Identity and idempotence
// ============================================================================

proptest! {
    /// An empty rule set leaves any text untouched
    #[test]
    fn prop_empty_rules_are_identity(text in "\\PC{0,200}") {
        let result = apply(&text, &RuleSet::new());
        prop_assert_eq!(&result.output, &text);
        prop_assert!(result.report.is_empty());
        prop_assert!(!result.changed());
    }

    /// When no replacement can create a matched string, a second pass
    /// changes nothing
    #[test]
    fn prop_disjoint_rules_are_idempotent(
        text in "[a-e ]{0,80}",
        pairs in prop::collection::vec(("[a-c]{1,3}", "[x-z]{1,3}"), 0..5)
    ) {
        let rules = replace_rules(&pairs);
        let once = apply(&text, &rules);
        let twice = apply(&once.output, &rules);

        prop_assert_eq!(&twice.output, &once.output);
        prop_assert!(twice.report.is_empty());
    }
}

// ============================================================================
// Property 2: Counting
// ============================================================================

proptest! {
    /// The reported count equals the number of non-overlapping matches
    #[test]
    fn prop_count_matches_str_matches(
        text in "[ab ]{0,100}",
        old in "[ab]{1,3}",
        new in "[x-z]{1,3}"
    ) {
        let expected = text.matches(old.as_str()).count();
        let rules = replace_rules(&[(old.clone(), new)]);
        let result = apply(&text, &rules);

        prop_assert_eq!(result.report.total(), expected);
        prop_assert_eq!(result.report.len(), usize::from(expected > 0));
    }

    /// Replacements that contain the matched string grow the text by a
    /// bounded amount instead of looping
    #[test]
    fn prop_self_containing_replacement_terminates(
        text in "[ab]{0,60}",
        old in "[ab]{1,2}"
    ) {
        let new = format!("{}{}", old, old);
        let expected = text.matches(old.as_str()).count();
        let result = apply(&text, &replace_rules(&[(old.clone(), new)]));

        prop_assert_eq!(result.report.total(), expected);
        prop_assert_eq!(result.output.len(), text.len() + expected * old.len());
    }

    /// Deleting a word removes every occurrence
    #[test]
    fn prop_delete_removes_all_occurrences(
        text in "[a-d ]{0,100}",
        word in "[a-d]{1,3}"
    ) {
        let (rules, _) = RuleSet::from_candidates::<&str>(&[], &[word.as_str()], Mode::Delete);
        let result = apply(&text, &rules);

        prop_assert_eq!(&result.output, &text.replace(word.as_str(), ""));
        prop_assert_eq!(result.report.total(), text.matches(word.as_str()).count());
    }
}

// ============================================================================
// Property 3: Ordering
// ============================================================================

proptest! {
    /// Applying a rule set is the same as replacing one rule at a time
    #[test]
    fn prop_rules_cascade_in_order(
        text in "[a-f ]{0,100}",
        pairs in prop::collection::vec(("[a-f]{1,2}", "[a-f]{1,3}"), 0..6)
    ) {
        let rules = replace_rules(&pairs);
        let expected = rules.iter().fold(text.clone(), |acc, rule| {
            acc.replace(rule.matched(), rule.replacement())
        });

        prop_assert_eq!(apply(&text, &rules).output, expected);
    }

    /// In "all" mode a delete wins over a replace for the same string
    #[test]
    fn prop_delete_overrides_replace(word in "[a-z]{1,6}", new in "[A-Z]{1,6}") {
        let (rules, _) = RuleSet::from_candidates(
            &[(word.as_str(), new.as_str())],
            &[word.as_str()],
            Mode::All,
        );

        prop_assert_eq!(rules.len(), 1);
        prop_assert_eq!(
            rules.get(&word),
            Some(&Rule::Delete { word: word.clone() })
        );

        let text = format!("{0}1{0}", word);
        let result = apply(&text, &rules);
        prop_assert_eq!(result.output, "1");
        prop_assert_eq!(result.report.entries()[0].operation, Operation::Delete);
    }
}

// ============================================================================
// Property 4: Files
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Overwriting a file leaves exactly the transformed text on disk
    #[test]
    fn prop_file_content_matches_transform(
        text in "[a-z \\n]{0,200}",
        pairs in prop::collection::vec(("[a-z]{1,3}", "[a-z]{1,3}"), 0..4)
    ) {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.txt");
        fs::write(&file_path, &text).unwrap();

        let rules = replace_rules(&pairs);
        let result = file_job::run(&file_path, &rules, true);

        prop_assert!(result.success);
        prop_assert_eq!(fs::read_to_string(&file_path).unwrap(), apply(&text, &rules).output);
    }
}

#[test]
fn test_no_infinite_expansion() {
    let rules = replace_rules(&[("a".to_string(), "aa".to_string())]);
    let result = apply("aaa", &rules);
    assert_eq!(result.output, "aaaaaa");
    assert_eq!(result.report.total(), 3);
}

#[test]
fn test_cascading_example() {
    let rules = replace_rules(&[
        ("x".to_string(), "y".to_string()),
        ("y".to_string(), "z".to_string()),
    ]);
    let result = apply("x", &rules);
    assert_eq!(result.output, "z");
    assert_eq!(result.report.len(), 2);
    assert!(result.report.iter().all(|entry| entry.count == 1));
}
