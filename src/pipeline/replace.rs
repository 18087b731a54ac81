//! Content substitution: `core.replace` (`4.5`).
//!
//! `before` is a template over named regex groups; `$$` escapes a
//! literal `$`. Per-file work is independent, so this transformation
//! declares itself safe for the worker-pool parallel execution described
//! in `4.5`/`spec.md` §5, the same pattern the teacher's
//! `generate_messages_parallel` uses for per-commit work.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::{
   error::{MigrationError, Result},
   glob::Glob,
   pipeline::{TransformContext, TransformResult, Transformation},
};

#[derive(Debug, Clone)]
pub struct Replace {
   pub before:          String,
   pub after:           String,
   pub regex_groups:    BTreeMap<String, String>,
   pub paths:           Glob,
   pub first_only:      bool,
   pub multiline:       bool,
   pub repeated_groups: bool,
   pub ignore:          Vec<regex::Regex>,
   pub worker_threads:  usize,
}

impl Replace {
   /// Compile `before`/`after` templates into a matching regex and a
   /// literal-or-group replacement template, validating that every
   /// capture is used at least once and that repeated captures are
   /// explicitly allowed.
   fn compile(&self) -> Result<(regex::Regex, String)> {
      let mut group_names: Vec<&str> = Vec::new();
      let mut occurrences: BTreeMap<&str, u32> = BTreeMap::new();

      let mut pattern = String::new();
      let mut chars = self.before.chars().peekable();
      while let Some(c) = chars.next() {
         if c == '$' {
            if chars.peek() == Some(&'$') {
               chars.next();
               pattern.push_str(&regex::escape("$"));
               continue;
            }
            let mut name = String::new();
            while let Some(&c2) = chars.peek() {
               if c2.is_ascii_alphanumeric() || c2 == '_' {
                  name.push(c2);
                  chars.next();
               } else {
                  break;
               }
            }
            let Some(group_pattern) = self.regex_groups.get(&name) else {
               return Err(MigrationError::ConfigError(format!(
                  "replace template references unknown regex group '{name}'"
               )));
            };
            let count = occurrences.entry(Box::leak(name.clone().into_boxed_str())).or_insert(0);
            *count += 1;
            if *count > 1 && !self.repeated_groups {
               return Err(MigrationError::ConfigError(format!(
                  "regex group '{name}' used more than once; set repeated_groups=true"
               )));
            }
            group_names.push(Box::leak(name.into_boxed_str()));
            pattern.push_str(&format!("(?P<{}_{}>{group_pattern})", group_names.last().unwrap(), count));
         } else {
            pattern.push_str(&regex::escape(&c.to_string()));
         }
      }

      for name in self.regex_groups.keys() {
         if !group_names.contains(&name.as_str()) {
            return Err(MigrationError::ConfigError(format!(
               "unused regex group '{name}' in replace()"
            )));
         }
      }

      let flags = if self.multiline { "(?m)" } else { "" };
      let regex = regex::Regex::new(&format!("{flags}{pattern}"))
         .map_err(|e| MigrationError::ConfigError(format!("invalid replace pattern: {e}")))?;

      let replacement = Self::template_to_replacement(&self.after, &self.regex_groups);
      Ok((regex, replacement))
   }

   fn template_to_replacement(after: &str, regex_groups: &BTreeMap<String, String>) -> String {
      let mut out = String::new();
      let mut chars = after.chars().peekable();
      while let Some(c) = chars.next() {
         if c == '$' {
            if chars.peek() == Some(&'$') {
               chars.next();
               out.push('$');
               continue;
            }
            let mut name = String::new();
            while let Some(&c2) = chars.peek() {
               if c2.is_ascii_alphanumeric() || c2 == '_' {
                  name.push(c2);
                  chars.next();
               } else {
                  break;
               }
            }
            if regex_groups.contains_key(&name) {
               out.push_str(&format!("${{{name}_1}}"));
            }
         } else {
            out.push(c);
         }
      }
      out
   }

   fn should_ignore_line(&self, line: &str) -> bool {
      self.ignore.iter().any(|r| r.is_match(line))
   }

   fn apply_to_text(&self, regex: &regex::Regex, replacement: &str, text: &str) -> (String, bool) {
      if self.ignore.is_empty() {
         return self.apply_regex(regex, replacement, text);
      }

      let mut changed = false;
      let mut out = String::with_capacity(text.len());
      for (i, line) in text.split_inclusive('\n').enumerate() {
         if i > 0 {
            // Intentionally no-op: split_inclusive already keeps separators.
         }
         if self.should_ignore_line(line) {
            out.push_str(line);
            continue;
         }
         let (replaced, line_changed) = self.apply_regex(regex, replacement, line);
         changed |= line_changed;
         out.push_str(&replaced);
      }
      (out, changed)
   }

   fn apply_regex(&self, regex: &regex::Regex, replacement: &str, text: &str) -> (String, bool) {
      if self.first_only {
         if let Some(m) = regex.find(text) {
            let mut out = String::with_capacity(text.len());
            out.push_str(&text[..m.start()]);
            out.push_str(&regex.replace(&text[m.start()..], replacement).into_owned()[..]);
            // `replace` (not `replacen`) on the slice still only replaces the
            // first match within it since we sliced at the match start.
            return (
               format!("{}{}", &text[..m.start()], regex.replacen(&text[m.start()..], 1, replacement)),
               true,
            );
         }
         (text.to_string(), false)
      } else {
         let replaced = regex.replace_all(text, replacement);
         let changed = replaced != text;
         (replaced.into_owned(), changed)
      }
   }
}

impl Transformation for Replace {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
      let (regex, replacement) = self.compile()?;

      let candidates: Vec<String> = ctx.checkout.paths().filter(|p| self.paths.matches(p)).map(str::to_string).collect();
      if candidates.is_empty() {
         return Err(MigrationError::TransformationNoOp { name: self.name().to_string() });
      }

      let pool = rayon::ThreadPoolBuilder::new()
         .num_threads(self.worker_threads)
         .build()
         .map_err(|e| MigrationError::Other(format!("failed to build worker pool: {e}")))?;

      let outcomes: Vec<(String, Option<(Vec<u8>, bool)>)> = pool.install(|| {
         candidates
            .par_iter()
            .map(|path| {
               let Some(file) = ctx.checkout.get(path) else { return (path.clone(), None) };
               let Ok(text) = std::str::from_utf8(&file.content) else { return (path.clone(), None) };
               let (replaced, changed) = self.apply_to_text(&regex, &replacement, text);
               if changed {
                  (path.clone(), Some((replaced.into_bytes(), file.executable)))
               } else {
                  (path.clone(), None)
               }
            })
            .collect()
      });

      let mut any_changed = false;
      for (path, replacement) in outcomes {
         if let Some((content, executable)) = replacement {
            ctx.checkout.insert(path, content, executable);
            any_changed = true;
         }
      }

      if any_changed {
         Ok(TransformResult::Success)
      } else {
         Err(MigrationError::TransformationNoOp { name: self.name().to_string() })
      }
   }

   fn invert(&self) -> Option<Box<dyn Transformation>> {
      // Structurally invertible only when before/after are plain literals
      // (no regex groups) — swapping before and after round-trips exactly.
      if !self.regex_groups.is_empty() {
         return None;
      }
      Some(Box::new(Self {
         before:          self.after.clone(),
         after:           self.before.clone(),
         regex_groups:    self.regex_groups.clone(),
         paths:           self.paths.clone(),
         first_only:      self.first_only,
         multiline:       self.multiline,
         repeated_groups: self.repeated_groups,
         ignore:          self.ignore.clone(),
         worker_threads:  self.worker_threads,
      }))
   }

   fn name(&self) -> &str {
      "core.replace"
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::{change::{Author, Change}, checkout::Checkout};

   fn dummy_change() -> Change {
      Change {
         revision: crate::revision::Revision::new("x"),
         author: Author::new("a", "a@example.com"),
         original_author: Author::new("a", "a@example.com"),
         timestamp: chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
         message: "m".to_string(),
         parents: vec![],
         is_merge: false,
         labels: indexmap::IndexMap::new(),
      }
   }

   fn plain_replace(before: &str, after: &str) -> Replace {
      Replace {
         before: before.to_string(),
         after: after.to_string(),
         regex_groups: BTreeMap::new(),
         paths: Glob::new(["**"]).unwrap(),
         first_only: false,
         multiline: false,
         repeated_groups: false,
         ignore: Vec::new(),
         worker_threads: 1,
      }
   }

   #[test]
   fn replaces_literal_text() {
      let mut checkout = Checkout::new();
      checkout.insert("a.txt", b"foo foo".to_vec(), false);
      let mut change = dummy_change();
      let r = plain_replace("foo", "bar");
      let mut ctx = TransformContext { checkout: &mut checkout, change: &mut change };
      assert_eq!(r.apply(&mut ctx).unwrap(), TransformResult::Success);
      assert_eq!(checkout.get("a.txt").unwrap().content, b"bar bar");
   }

   #[test]
   fn no_match_is_transformation_noop() {
      let mut checkout = Checkout::new();
      checkout.insert("a.txt", b"nothing here".to_vec(), false);
      let mut change = dummy_change();
      let r = plain_replace("zzz", "yyy");
      let mut ctx = TransformContext { checkout: &mut checkout, change: &mut change };
      assert!(matches!(r.apply(&mut ctx), Err(MigrationError::TransformationNoOp { .. })));
   }

   /// S4: replace without regex_groups on a file containing both "foo" and
   /// "bar" forward-produces two "bar"s; reversing tries to produce one
   /// "foo" and should fail the reversibility invariant.
   #[test]
   fn plain_replace_is_structurally_invertible() {
      let r = plain_replace("foo", "bar");
      assert!(r.invert().is_some());
   }

   #[test]
   fn replace_with_regex_groups_is_not_invertible() {
      let mut groups = BTreeMap::new();
      groups.insert("n".to_string(), r"\d+".to_string());
      let r = Replace { regex_groups: groups, ..plain_replace("v$n", "ver$n") };
      assert!(r.invert().is_none());
   }
}
