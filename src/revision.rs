//! Revision & reference model (C1).
//!
//! A [`Revision`] is an opaque, content-stable identifier drawn from an
//! origin, carrying zero or more derived labels. Resolution turns a
//! user-supplied string into a concrete revision; version selectors pick
//! one candidate out of a list using numbered capture groups.

use std::{cmp::Ordering, collections::BTreeMap};

use crate::error::{MigrationError, Result};

/// An opaque revision identifier. Equality and hashing are by `id` alone —
/// labels are derived data, never part of identity.
#[derive(Debug, Clone, Eq)]
pub struct Revision {
   id:     String,
   labels: BTreeMap<String, Vec<String>>,
}

impl PartialEq for Revision {
   fn eq(&self, other: &Self) -> bool {
      self.id == other.id
   }
}

impl std::hash::Hash for Revision {
   fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
      self.id.hash(state);
   }
}

impl Revision {
   pub fn new(id: impl Into<String>) -> Self {
      Self { id: id.into(), labels: BTreeMap::new() }
   }

   pub fn id(&self) -> &str {
      &self.id
   }

   /// Attach a label value (labels are multi-valued; repeated calls with the
   /// same name append).
   pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
      self.labels.entry(name.into()).or_default().push(value.into());
      self
   }

   pub fn label(&self, name: &str) -> Option<&str> {
      self.labels.get(name).and_then(|v| v.first()).map(String::as_str)
   }

   pub fn all_labels(&self, name: &str) -> &[String] {
      self.labels.get(name).map_or(&[], Vec::as_slice)
   }

   pub fn labels(&self) -> &BTreeMap<String, Vec<String>> {
      &self.labels
   }
}

impl std::fmt::Display for Revision {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      write!(f, "{}", self.id)
   }
}

/// One of the forms a `user_string` resolves from, per `4.1`.
#[derive(Debug, Clone)]
pub enum RefForm {
   BranchOrTag(String),
   RawReference(String),
   ContentHash(String),
   UrlAndRef { url: String, reference: String },
   ReviewUrl(String),
}

/// Parse a raw CLI reference string into the form it most plausibly takes.
/// This does not contact any origin; it only classifies the string so the
/// origin knows which resolution strategy to try first.
pub fn classify_reference(input: &str) -> RefForm {
   let trimmed = input.trim();

   if let Some(at) = trimmed.find('@') {
      let (url, reference) = trimmed.split_at(at);
      if url.contains("://") || url.contains(':') {
         return RefForm::UrlAndRef {
            url:       url.to_string(),
            reference: reference.trim_start_matches('@').to_string(),
         };
      }
   }

   if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
      return RefForm::ReviewUrl(trimmed.to_string());
   }

   if trimmed.len() >= 7 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
      return RefForm::ContentHash(trimmed.to_string());
   }

   if trimmed.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '_' | '.')) {
      return RefForm::BranchOrTag(trimmed.to_string());
   }

   RefForm::RawReference(trimmed.to_string())
}

/// One numbered capture group declared in a version-selector refspec
/// pattern: `n0, n1, …` are numeric (sorted as integers), `s0, s1, …` are
/// lexicographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
   Numeric,
   Lexicographic,
}

/// A compiled version selector: a regex over candidate strings (tags,
/// branches) plus the ordered list of group kinds declared for it.
pub struct VersionSelector {
   pattern: regex::Regex,
   groups:  Vec<GroupKind>,
}

#[derive(Debug, Clone)]
struct SortKey {
   // Numeric groups dominate lexicographic ones; within a group kind,
   // values compare in declaration order.
   numeric: Vec<i64>,
   lexical: Vec<String>,
   // Index in the original candidate list, used as the final tie-break
   // (most-recently-added wins, i.e. higher index wins).
   index:   usize,
}

impl Ord for SortKey {
   fn cmp(&self, other: &Self) -> Ordering {
      self
         .numeric
         .cmp(&other.numeric)
         .then_with(|| self.lexical.cmp(&other.lexical))
         .then_with(|| self.index.cmp(&other.index))
   }
}
impl PartialOrd for SortKey {
   fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
      Some(self.cmp(other))
   }
}
impl PartialEq for SortKey {
   fn eq(&self, other: &Self) -> bool {
      self.cmp(other) == Ordering::Equal
   }
}
impl Eq for SortKey {}

impl VersionSelector {
   /// Build a selector from a refspec pattern such as
   /// `v(?P<n0>\d+)\.(?P<n1>\d+)\.(?P<n2>\d+)` where group names declare
   /// their kind by prefix (`n` = numeric, `s` = lexicographic).
   pub fn compile(pattern: &str) -> Result<Self> {
      let regex = regex::Regex::new(pattern)
         .map_err(|e| MigrationError::ConfigError(format!("invalid version selector: {e}")))?;

      let mut groups = Vec::new();
      for name in regex.capture_names().flatten() {
         if let Some(rest) = name.strip_prefix('n') {
            if rest.chars().all(|c| c.is_ascii_digit()) {
               groups.push(GroupKind::Numeric);
            }
         } else if let Some(rest) = name.strip_prefix('s')
            && rest.chars().all(|c| c.is_ascii_digit())
         {
            groups.push(GroupKind::Lexicographic);
         }
      }
      Ok(Self { pattern: regex, groups })
   }

   /// Select the best-matching candidate out of an ordered list, applying
   /// the tie-break rules from `4.1`. Returns `None` (→ `ResolutionError`
   /// with `--force` absent) when nothing matches.
   pub fn select<'a>(&self, candidates: &[&'a str]) -> Option<&'a str> {
      let mut best: Option<(SortKey, &'a str)> = None;

      for (index, candidate) in candidates.iter().enumerate() {
         let Some(captures) = self.pattern.captures(candidate) else { continue };

         let mut numeric = Vec::new();
         let mut lexical = Vec::new();
         for name in self.pattern.capture_names().flatten() {
            let Some(m) = captures.name(name) else { continue };
            if name.starts_with('n') {
               numeric.push(m.as_str().parse::<i64>().unwrap_or(0));
            } else if name.starts_with('s') {
               lexical.push(m.as_str().to_string());
            }
         }

         let key = SortKey { numeric, lexical, index };
         if best.as_ref().is_none_or(|(best_key, _)| key > *best_key) {
            best = Some((key, candidate));
         }
      }

      best.map(|(_, candidate)| candidate)
   }

   pub fn group_kinds(&self) -> &[GroupKind] {
      &self.groups
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn classify_branch_name() {
      assert!(matches!(classify_reference("main"), RefForm::BranchOrTag(_)));
      assert!(matches!(classify_reference("release/1.2"), RefForm::BranchOrTag(_)));
   }

   #[test]
   fn classify_content_hash() {
      assert!(matches!(
         classify_reference("deadbeefcafe0123"),
         RefForm::ContentHash(_)
      ));
   }

   #[test]
   fn classify_review_url() {
      assert!(matches!(
         classify_reference("https://github.com/x/y/pull/1"),
         RefForm::ReviewUrl(_)
      ));
   }

   #[test]
   fn revision_identity_ignores_labels() {
      let a = Revision::new("abc").with_label("GITHUB_PR_NUMBER", "1");
      let b = Revision::new("abc");
      assert_eq!(a, b);
   }

   #[test]
   fn version_selector_numeric_dominates_lexicographic() {
      let selector = VersionSelector::compile(r"v(?P<n0>\d+)-(?P<s0>[a-z]+)").unwrap();
      let candidates = ["v1-zeta", "v2-alpha"];
      assert_eq!(selector.select(&candidates), Some("v2-alpha"));
   }

   #[test]
   fn version_selector_tie_break_most_recently_added() {
      let selector = VersionSelector::compile(r"v(?P<n0>\d+)").unwrap();
      let candidates = ["v1", "v1"];
      // Same numeric key on both; the later index wins.
      assert_eq!(selector.select(&candidates), Some("v1"));
   }

   #[test]
   fn version_selector_no_match_returns_none() {
      let selector = VersionSelector::compile(r"v(?P<n0>\d+)").unwrap();
      assert_eq!(selector.select(&["nope"]), None);
   }
}
