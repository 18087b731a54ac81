//! Comparison logic for fixture testing.

use std::collections::BTreeMap;

use super::fixture::{Golden, GoldenEffect};

/// Result of comparing a run's actual output to a fixture's golden.
#[derive(Debug, Clone)]
pub struct CompareResult {
   /// Whether the recorded effect list matches, in order.
   pub effects_match: bool,
   /// Paths present on one side only, or with differing content.
   pub file_diffs: Vec<String>,
   /// Overall pass/fail.
   pub passed: bool,
   /// Human-readable summary.
   pub summary: String,
}

/// Compare a run's actual effects/destination tree against a fixture's
/// golden.
pub fn compare_run(golden: &Golden, actual_effects: &[GoldenEffect], actual_destination: &BTreeMap<String, String>) -> CompareResult {
   let effects_match = golden.effects == *actual_effects;

   let mut file_diffs = Vec::new();
   for (path, expected) in &golden.destination_files {
      match actual_destination.get(path) {
         None => file_diffs.push(format!("{path}: missing from actual destination")),
         Some(actual) if actual != expected => file_diffs.push(format!("{path}: content differs")),
         _ => {},
      }
   }
   for path in actual_destination.keys() {
      if !golden.destination_files.contains_key(path) {
         file_diffs.push(format!("{path}: unexpected file in actual destination"));
      }
   }

   let passed = effects_match && file_diffs.is_empty();
   let summary = if passed {
      format!("✓ {} effect(s), {} destination file(s)", actual_effects.len(), actual_destination.len())
   } else if !effects_match {
      format!("✗ effects: {} golden → {} actual", golden.effects.len(), actual_effects.len())
   } else {
      format!("✗ {} destination file mismatch(es)", file_diffs.len())
   };

   CompareResult { effects_match, file_diffs, passed, summary }
}

impl PartialEq for GoldenEffect {
   fn eq(&self, other: &Self) -> bool {
      self.effect_type == other.effect_type && self.summary == other.summary
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   fn effect(effect_type: &str, summary: &str) -> GoldenEffect {
      GoldenEffect { effect_type: effect_type.to_string(), summary: summary.to_string() }
   }

   #[test]
   fn exact_match_passes() {
      let mut destination_files = BTreeMap::new();
      destination_files.insert("a.txt".to_string(), "X\n".to_string());
      let golden = Golden { effects: vec![effect("CREATED", "imported")], destination_files: destination_files.clone() };

      let result = compare_run(&golden, &[effect("CREATED", "imported")], &destination_files);
      assert!(result.passed);
      assert!(result.effects_match);
      assert!(result.file_diffs.is_empty());
   }

   #[test]
   fn effect_type_mismatch_fails() {
      let golden = Golden { effects: vec![effect("CREATED", "imported")], destination_files: BTreeMap::new() };
      let result = compare_run(&golden, &[effect("NOOP", "nothing to migrate")], &BTreeMap::new());
      assert!(!result.passed);
      assert!(!result.effects_match);
   }

   #[test]
   fn destination_content_mismatch_is_reported() {
      let mut golden_files = BTreeMap::new();
      golden_files.insert("a.txt".to_string(), "X\n".to_string());
      let golden = Golden { effects: vec![], destination_files: golden_files };

      let mut actual_files = BTreeMap::new();
      actual_files.insert("a.txt".to_string(), "Y\n".to_string());

      let result = compare_run(&golden, &[], &actual_files);
      assert!(!result.passed);
      assert_eq!(result.file_diffs.len(), 1);
   }
}
