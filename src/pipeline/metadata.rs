//! Metadata transformations: operations on the in-flight [`Change`] rather
//! than the checkout tree (`4.5`, `4.9`).

use std::collections::BTreeMap;

use crate::{
   error::{MigrationError, Result},
   pipeline::{TransformContext, TransformResult, Transformation},
};

/// `metadata.add_header(header_template)`. Prefixes the rendered message
/// with a header line/paragraph, e.g. `"Imported from {{ reference }}"`.
pub struct AddHeader {
   pub header_template: String,
   pub ignore_labels:   bool,
}

impl Transformation for AddHeader {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
      let mut vars = BTreeMap::new();
      vars.insert("reference".to_string(), ctx.change.revision.id().to_string());
      if !self.ignore_labels {
         for (key, values) in ctx.change.all_labels() {
            if let Some(v) = values.first() {
               vars.insert(key.clone(), v.clone());
            }
         }
      }
      let header = crate::templates::render_str(&self.header_template, &vars)?;

      if ctx.change.message.starts_with(&header) {
         return Err(MigrationError::TransformationNoOp { name: self.name().to_string() });
      }
      ctx.change.message = format!("{header}\n\n{}", ctx.change.message);
      Ok(TransformResult::Success)
   }

   fn name(&self) -> &str {
      "metadata.add_header"
   }
}

/// `metadata.replace_message(template)`. Unconditionally replaces the
/// message body (labels untouched), e.g. to strip an origin's commit
/// message entirely in favor of a fixed string.
pub struct ReplaceMessage {
   pub template: String,
}

impl Transformation for ReplaceMessage {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
      let mut vars = BTreeMap::new();
      vars.insert("reference".to_string(), ctx.change.revision.id().to_string());
      let rendered = crate::templates::render_str(&self.template, &vars)?;
      if rendered == ctx.change.message {
         return Err(MigrationError::TransformationNoOp { name: self.name().to_string() });
      }
      ctx.change.message = rendered;
      Ok(TransformResult::Success)
   }

   fn name(&self) -> &str {
      "metadata.replace_message"
   }
}

/// `metadata.scrubber(regex)`. Strips lines matching `regex` from the
/// message — used to remove internal-only trailers before publishing.
pub struct Scrubber {
   pub regex: regex::Regex,
}

impl Transformation for Scrubber {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
      let mut changed = false;
      let scrubbed: Vec<&str> = ctx
         .change
         .message
         .lines()
         .filter(|line| {
            let keep = !self.regex.is_match(line);
            changed |= !keep;
            keep
         })
         .collect();

      if !changed {
         return Err(MigrationError::TransformationNoOp { name: self.name().to_string() });
      }
      ctx.change.message = scrubbed.join("\n");
      Ok(TransformResult::Success)
   }

   fn name(&self) -> &str {
      "metadata.scrubber"
   }
}

/// `metadata.squash_notes(prefix, max, compact)`. Only meaningful in
/// SQUASH mode, where the workflow runner accumulates one synthetic
/// [`Change`] out of many origin commits beforehand; this transformation
/// renders the accumulated per-commit summaries into the final message.
pub struct SquashNotes {
   pub prefix:         String,
   pub max:             Option<usize>,
   /// One summary line per squashed origin commit, oldest first, supplied
   /// by the workflow runner (`6`) before the pipeline runs.
   pub change_summaries: Vec<String>,
}

impl Transformation for SquashNotes {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
      if self.change_summaries.is_empty() {
         return Err(MigrationError::TransformationNoOp { name: self.name().to_string() });
      }

      let mut lines: Vec<&str> = self.change_summaries.iter().map(String::as_str).collect();
      let truncated = self.max.is_some_and(|max| lines.len() > max);
      if let Some(max) = self.max {
         lines.truncate(max);
      }

      let mut changes = lines.iter().map(|l| format!("  - {l}")).collect::<Vec<_>>().join("\n");
      if truncated {
         changes.push_str("\n  - ...");
      }

      let mut vars = BTreeMap::new();
      vars.insert("prefix".to_string(), self.prefix.clone());
      vars.insert("changes".to_string(), changes);
      ctx.change.message = crate::templates::render("commit/squash_notes.txt", &vars)?;
      Ok(TransformResult::Success)
   }

   fn name(&self) -> &str {
      "metadata.squash_notes"
   }
}

/// `metadata.use_last_change(use_message, use_author)`. In SQUASH mode,
/// discards the synthesized aggregate message/author in favor of the
/// *last* origin commit's, when the caller wants a real author attached
/// instead of a bot identity.
pub struct UseLastChange {
   pub use_message: bool,
   pub use_author:  bool,
   pub last_message: String,
   pub last_author:  crate::change::Author,
}

impl Transformation for UseLastChange {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
      let mut changed = false;
      if self.use_message && ctx.change.message != self.last_message {
         ctx.change.message = self.last_message.clone();
         changed = true;
      }
      if self.use_author && ctx.change.author != self.last_author {
         ctx.change.author = self.last_author.clone();
         changed = true;
      }
      if changed {
         Ok(TransformResult::Success)
      } else {
         Err(MigrationError::TransformationNoOp { name: self.name().to_string() })
      }
   }

   fn name(&self) -> &str {
      "metadata.use_last_change"
   }
}

/// `metadata.expose_label(name, new_name, separator)`. Copies an existing
/// label's value into the rendered message body (rather than the trailing
/// label paragraph), e.g. to surface `GitOrigin-RevId` in a PR title.
pub struct ExposeLabel {
   pub name:        String,
   pub new_name:    Option<String>,
   pub separator:   String,
}

impl Transformation for ExposeLabel {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
      let Some(value) = ctx.change.label(&self.name).map(str::to_string) else {
         return Err(MigrationError::TransformationNoOp { name: self.name().to_string() });
      };
      let label_name = self.new_name.as_deref().unwrap_or(&self.name);
      let line = format!("{label_name}{}{value}", self.separator);
      if ctx.change.message.contains(&line) {
         return Err(MigrationError::TransformationNoOp { name: self.name().to_string() });
      }
      ctx.change.message = format!("{}\n\n{line}", ctx.change.message.trim_end());
      Ok(TransformResult::Success)
   }

   fn name(&self) -> &str {
      "metadata.expose_label"
   }
}

/// `metadata.remove_label(name)`. Drops a label from the trailing
/// paragraph entirely (as opposed to `core.verify_match`, which only
/// inspects).
pub struct RemoveLabel {
   pub name: String,
}

impl Transformation for RemoveLabel {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
      if ctx.change.label(&self.name).is_none() {
         return Err(MigrationError::TransformationNoOp { name: self.name().to_string() });
      }
      ctx.change.remove_label(&self.name);
      Ok(TransformResult::Success)
   }

   fn name(&self) -> &str {
      "metadata.remove_label"
   }
}

/// `metadata.save_author()` / `metadata.restore_author()`. A matched
/// pair: `save_author` stashes the current author as `original_author`
/// (a no-op if already saved this run); `restore_author` overwrites the
/// working author with whatever was stashed, undoing an intervening
/// `map_author`.
pub struct SaveAuthor;

impl Transformation for SaveAuthor {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
      if ctx.change.original_author == ctx.change.author {
         return Err(MigrationError::TransformationNoOp { name: self.name().to_string() });
      }
      ctx.change.original_author = ctx.change.author.clone();
      Ok(TransformResult::Success)
   }

   fn name(&self) -> &str {
      "metadata.save_author"
   }
}

pub struct RestoreAuthor;

impl Transformation for RestoreAuthor {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
      if ctx.change.author == ctx.change.original_author {
         return Err(MigrationError::TransformationNoOp { name: self.name().to_string() });
      }
      ctx.change.author = ctx.change.original_author.clone();
      Ok(TransformResult::Success)
   }

   fn name(&self) -> &str {
      "metadata.restore_author"
   }
}

/// `metadata.map_author(mapping)`. Rewrites authorship through a static
/// origin-email -> destination-author dictionary (the common "map
/// internal committers to public GitHub identities" use case).
pub struct MapAuthor {
   pub mapping: BTreeMap<String, crate::change::Author>,
   pub reversible: bool,
}

impl Transformation for MapAuthor {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
      let Some(mapped) = self.mapping.get(&ctx.change.author.email) else {
         return Err(MigrationError::TransformationNoOp { name: self.name().to_string() });
      };
      if *mapped == ctx.change.author {
         return Err(MigrationError::TransformationNoOp { name: self.name().to_string() });
      }
      ctx.change.author = mapped.clone();
      Ok(TransformResult::Success)
   }

   fn invert(&self) -> Option<Box<dyn Transformation>> {
      if !self.reversible {
         return None;
      }
      let flipped: BTreeMap<String, crate::change::Author> = self
         .mapping
         .iter()
         .map(|(origin_email, dest_author)| {
            (dest_author.email.clone(), crate::change::Author::new(origin_email.clone(), origin_email.clone()))
         })
         .collect();
      Some(Box::new(Self { mapping: flipped, reversible: true }))
   }

   fn name(&self) -> &str {
      "metadata.map_author"
   }
}

/// `metadata.map_references(regex, format, mapping_or_transform)`.
/// Rewrites cross-repository reference strings in the message (e.g.
/// internal bug IDs to public issue URLs) using a regex + replacement
/// template, thin wrapper sharing `$`-group syntax with
/// [`crate::pipeline::replace::Replace`].
pub struct MapReferences {
   pub regex:       regex::Regex,
   pub replacement: String,
}

impl Transformation for MapReferences {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
      let rewritten = self.regex.replace_all(&ctx.change.message, self.replacement.as_str());
      if rewritten == ctx.change.message {
         return Err(MigrationError::TransformationNoOp { name: self.name().to_string() });
      }
      ctx.change.message = rewritten.into_owned();
      Ok(TransformResult::Success)
   }

   fn name(&self) -> &str {
      "metadata.map_references"
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::{change::{Author, Change}, checkout::Checkout, revision::Revision};

   fn dummy_change() -> Change {
      Change {
         revision: Revision::new("abc123"),
         author: Author::new("Alice", "alice@internal.example"),
         original_author: Author::new("Alice", "alice@internal.example"),
         timestamp: chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
         message: "Fix the bug".to_string(),
         parents: vec![],
         is_merge: false,
         labels: indexmap::IndexMap::new(),
      }
   }

   #[test]
   fn add_header_prefixes_message_once() {
      let mut checkout = Checkout::new();
      let mut change = dummy_change();
      let header = AddHeader { header_template: "Imported change".to_string(), ignore_labels: true };
      {
         let mut ctx = TransformContext { checkout: &mut checkout, change: &mut change };
         assert_eq!(header.apply(&mut ctx).unwrap(), TransformResult::Success);
      }
      assert!(change.message.starts_with("Imported change"));
      {
         let mut ctx = TransformContext { checkout: &mut checkout, change: &mut change };
         assert!(matches!(header.apply(&mut ctx), Err(MigrationError::TransformationNoOp { .. })));
      }
   }

   #[test]
   fn scrubber_removes_matching_lines() {
      let mut checkout = Checkout::new();
      let mut change = dummy_change();
      change.message = "Fix the bug\n\nInternal-Only: do not ship".to_string();
      let scrub = Scrubber { regex: regex::Regex::new("^Internal-Only:").unwrap() };
      let mut ctx = TransformContext { checkout: &mut checkout, change: &mut change };
      assert_eq!(scrub.apply(&mut ctx).unwrap(), TransformResult::Success);
      assert!(!change.message.contains("Internal-Only"));
   }

   #[test]
   fn map_author_rewrites_known_email_only() {
      let mut checkout = Checkout::new();
      let mut change = dummy_change();
      let mut mapping = BTreeMap::new();
      mapping.insert("alice@internal.example".to_string(), Author::new("Alice Public", "alice@public.example"));
      let m = MapAuthor { mapping, reversible: true };
      let mut ctx = TransformContext { checkout: &mut checkout, change: &mut change };
      assert_eq!(m.apply(&mut ctx).unwrap(), TransformResult::Success);
      assert_eq!(change.author.email, "alice@public.example");
      assert!(m.invert().is_some());
   }

   #[test]
   fn save_and_restore_author_round_trip() {
      let mut checkout = Checkout::new();
      let mut change = dummy_change();
      change.author = Author::new("Alice Public", "alice@public.example");
      let restore = RestoreAuthor;
      let mut ctx = TransformContext { checkout: &mut checkout, change: &mut change };
      assert_eq!(restore.apply(&mut ctx).unwrap(), TransformResult::Success);
      assert_eq!(change.author.email, "alice@internal.example");
   }
}
