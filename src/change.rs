//! Change data model: authorship, timestamps, and the label paragraph
//! parser shared by origin readers (parsing incoming commit messages) and
//! destination writers (rendering outgoing ones).

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;

use crate::revision::Revision;

/// A commit author: display name and email, matching the `Name <email>`
/// authorship line format destinations must produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
   pub name:  String,
   pub email: String,
}

impl Author {
   pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
      Self { name: name.into(), email: email.into() }
   }
}

impl std::fmt::Display for Author {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      write!(f, "{} <{}>", self.name, self.email)
   }
}

/// One importable unit: a commit, or (in SQUASH mode) a synthesized
/// aggregate over several commits.
#[derive(Debug, Clone)]
pub struct Change {
   pub revision:        Revision,
   pub author:           Author,
   /// Frozen at ingestion; never remapped by transformations (`save_author`
   /// stashes the pre-`map_author` value here on first touch).
   pub original_author:  Author,
   pub timestamp:         DateTime<FixedOffset>,
   /// Subject + body, with the trailing label paragraph already split out
   /// into `labels`. Use [`Change::render_message`] to reassemble.
   pub message:           String,
   pub parents:           Vec<Revision>,
   pub is_merge:          bool,
   pub labels:            IndexMap<String, Vec<String>>,
}

impl Change {
   /// Reassemble the full commit message: free-text body followed by the
   /// label paragraph, one `Key=value` per line, matching the wire format
   /// in `spec.md` §6.
   pub fn render_message(&self) -> String {
      if self.labels.is_empty() {
         return self.message.clone();
      }
      let mut out = self.message.trim_end().to_string();
      out.push_str("\n\n");
      for (key, values) in &self.labels {
         for value in values {
            out.push_str(&format!("{key}={value}\n"));
         }
      }
      out.trim_end().to_string() + "\n"
   }

   pub fn label(&self, name: &str) -> Option<&str> {
      self.labels.get(name).and_then(|v| v.first()).map(String::as_str)
   }

   pub fn add_label(&mut self, name: impl Into<String>, value: impl Into<String>) {
      self.labels.entry(name.into()).or_default().push(value.into());
   }

   pub fn add_or_replace_label(&mut self, name: impl Into<String>, value: impl Into<String>) {
      let name = name.into();
      self.labels.insert(name, vec![value.into()]);
   }

   pub fn remove_label(&mut self, name: &str) {
      self.labels.shift_remove(name);
   }

   /// Every label name/values pair, in insertion order — used by
   /// transformations that must visit the whole label set rather than one
   /// name at a time (e.g. `add_header`'s `ignore_labels` filter).
   pub fn all_labels(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
      self.labels.iter()
   }
}

/// Split a raw commit message into (free text, label map). The trailing
/// paragraph is treated specially only if every non-blank line in it
/// matches `KEY=VALUE` or `KEY: VALUE`; otherwise the whole message is
/// treated as free text with no labels — non-label text is always
/// preserved verbatim.
pub fn parse_message(raw: &str) -> (String, IndexMap<String, Vec<String>>) {
   let mut labels = IndexMap::new();

   let Some(split_at) = find_trailing_label_paragraph(raw) else {
      return (raw.to_string(), labels);
   };

   let (body, paragraph) = raw.split_at(split_at);
   for line in paragraph.lines() {
      let line = line.trim();
      if line.is_empty() {
         continue;
      }
      if let Some((key, value)) = split_label_line(line) {
         labels.entry(key.to_string()).or_insert_with(Vec::new).push(value.to_string());
      }
   }

   (body.trim_end().to_string(), labels)
}

fn split_label_line(line: &str) -> Option<(&str, &str)> {
   if let Some(idx) = line.find('=') {
      let (key, value) = line.split_at(idx);
      if is_label_key(key) {
         return Some((key, &value[1..]));
      }
   }
   if let Some(idx) = line.find(": ") {
      let (key, value) = line.split_at(idx);
      if is_label_key(key) {
         return Some((key, &value[2..]));
      }
   }
   None
}

fn is_label_key(key: &str) -> bool {
   !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Find the byte offset where the trailing label paragraph begins, i.e.
/// the start of the last blank-line-separated paragraph, if every
/// non-blank line in it parses as a label.
fn find_trailing_label_paragraph(raw: &str) -> Option<usize> {
   let trimmed = raw.trim_end();
   let mut last_blank = None;
   let mut offset = 0;
   let mut prev_blank = true;

   for line in trimmed.split_inclusive('\n') {
      let stripped = line.trim_end_matches('\n');
      if stripped.trim().is_empty() {
         prev_blank = true;
      } else {
         if prev_blank {
            last_blank = Some(offset);
         }
         prev_blank = false;
      }
      offset += line.len();
   }
   // Fallback for a message with no trailing newline on its last line.
   let candidate_start = last_blank?;
   let paragraph = &trimmed[candidate_start..];
   let all_labels = paragraph
      .lines()
      .filter(|l| !l.trim().is_empty())
      .all(|l| split_label_line(l.trim()).is_some());

   if all_labels && paragraph.lines().any(|l| !l.trim().is_empty()) {
      Some(candidate_start)
   } else {
      None
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn parses_trailing_label_paragraph() {
      let raw = "Fix the thing\n\nLonger body text here.\n\nGitOrigin-RevId=abc123\nReviewed-by=me\n";
      let (body, labels) = parse_message(raw);
      assert_eq!(body, "Fix the thing\n\nLonger body text here.");
      assert_eq!(labels.get("GitOrigin-RevId").unwrap()[0], "abc123");
      assert_eq!(labels.get("Reviewed-by").unwrap()[0], "me");
   }

   #[test]
   fn preserves_non_label_trailing_paragraph() {
      let raw = "Fix the thing\n\nThis paragraph is not key=value pairs at all.\n";
      let (body, labels) = parse_message(raw);
      assert_eq!(body, raw.trim_end());
      assert!(labels.is_empty());
   }

   #[test]
   fn message_without_labels_round_trips() {
      let raw = "Just a subject line";
      let (body, labels) = parse_message(raw);
      assert_eq!(body, raw);
      assert!(labels.is_empty());
   }

   #[test]
   fn render_message_reassembles_labels() {
      let mut labels = IndexMap::new();
      labels.insert("GitOrigin-RevId".to_string(), vec!["abc".to_string()]);
      let change = Change {
         revision: Revision::new("abc"),
         author: Author::new("A", "a@example.com"),
         original_author: Author::new("A", "a@example.com"),
         timestamp: chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
         message: "Subject".to_string(),
         parents: vec![],
         is_merge: false,
         labels,
      };
      assert_eq!(change.render_message(), "Subject\n\nGitOrigin-RevId=abc\n");
   }
}
