//! Path operations: `move`, `copy`, `remove`, `rename` (`4.5`).

use crate::{
   error::{MigrationError, Result},
   glob::Glob,
   pipeline::{TransformContext, TransformResult, Transformation},
};

/// `core.move(before, after, paths, overwrite, regex_groups)`. Moves every
/// path under `before` matched by `paths` to the equivalent path under
/// `after`, substituting named regex captures from `regex_groups` into
/// both templates. `overwrite=false` makes the move reversible and fails
/// on collision; `overwrite=true` is not reversible.
pub struct Move {
   pub before:    String,
   pub after:     String,
   pub paths:     Glob,
   pub overwrite: bool,
}

impl Move {
   fn translate(&self, path: &str) -> Option<String> {
      let rest = path.strip_prefix(&self.before)?;
      let rest = rest.strip_prefix('/').unwrap_or(rest);
      if self.after.is_empty() {
         Some(rest.to_string())
      } else if rest.is_empty() {
         Some(self.after.clone())
      } else {
         Some(format!("{}/{}", self.after, rest))
      }
   }
}

impl Transformation for Move {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
      let candidates: Vec<String> =
         ctx.checkout.paths().filter(|p| self.paths.matches(p) && p.starts_with(&self.before)).map(str::to_string).collect();

      if candidates.is_empty() {
         return Err(MigrationError::TransformationNoOp { name: self.name().to_string() });
      }

      for path in candidates {
         let Some(target) = self.translate(&path) else { continue };
         ctx.checkout.rename(&path, &target, self.overwrite)?;
      }
      Ok(TransformResult::Success)
   }

   fn invert(&self) -> Option<Box<dyn Transformation>> {
      if self.overwrite {
         return None;
      }
      Some(Box::new(Move {
         before:    self.after.clone(),
         after:     self.before.clone(),
         paths:     self.paths.clone(),
         overwrite: false,
      }))
   }

   fn name(&self) -> &str {
      "core.move"
   }
}

/// `core.copy(before, after, paths, overwrite)`. Like [`Move`] but leaves
/// the source in place — structurally non-reversible (reverting would
/// require deleting the destination, which is not representable as a
/// plain inverse transformation here).
pub struct Copy {
   pub before: String,
   pub after:  String,
   pub paths:  Glob,
   pub overwrite: bool,
}

impl Transformation for Copy {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
      let candidates: Vec<String> =
         ctx.checkout.paths().filter(|p| self.paths.matches(p) && p.starts_with(&self.before)).map(str::to_string).collect();

      if candidates.is_empty() {
         return Err(MigrationError::TransformationNoOp { name: self.name().to_string() });
      }

      for path in candidates {
         let Some(file) = ctx.checkout.get(&path).cloned() else { continue };
         let rest = path.strip_prefix(&self.before).unwrap_or(&path).trim_start_matches('/');
         let target = if self.after.is_empty() {
            rest.to_string()
         } else {
            format!("{}/{}", self.after, rest)
         };
         if !self.overwrite && ctx.checkout.exists(&target) {
            return Err(MigrationError::ConfigError(format!(
               "copy collision: '{target}' already exists (overwrite=false)"
            )));
         }
         ctx.checkout.insert(target, file.content, file.executable);
      }
      Ok(TransformResult::Success)
   }

   fn name(&self) -> &str {
      "core.copy"
   }
}

/// `core.remove(paths)`. Structurally non-reversible: the removed
/// content is gone.
pub struct Remove {
   pub paths: Glob,
}

impl Transformation for Remove {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
      let candidates: Vec<String> = ctx.checkout.paths().filter(|p| self.paths.matches(p)).map(str::to_string).collect();
      if candidates.is_empty() {
         return Err(MigrationError::TransformationNoOp { name: self.name().to_string() });
      }
      for path in candidates {
         ctx.checkout.remove(&path);
      }
      Ok(TransformResult::Success)
   }

   fn name(&self) -> &str {
      "core.remove"
   }
}

/// `core.rename(before, after, suffix)`. Renames matched paths by regex
/// substitution of `before` with `after` (reuses `regex_groups`
/// semantics); `suffix` appends a literal suffix to every renamed path
/// instead of a full pattern rewrite when set.
pub struct Rename {
   pub before: regex::Regex,
   pub after:  String,
   pub suffix: Option<String>,
   pub paths:  Glob,
}

impl Transformation for Rename {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
      let candidates: Vec<String> = ctx.checkout.paths().filter(|p| self.paths.matches(p)).map(str::to_string).collect();
      let mut changed = false;

      for path in candidates {
         if !self.before.is_match(&path) {
            continue;
         }
         let mut target = self.before.replace(&path, self.after.as_str()).into_owned();
         if let Some(suffix) = &self.suffix {
            target.push_str(suffix);
         }
         if target != path {
            ctx.checkout.rename(&path, &target, false)?;
            changed = true;
         }
      }

      if changed {
         Ok(TransformResult::Success)
      } else {
         Err(MigrationError::TransformationNoOp { name: self.name().to_string() })
      }
   }

   fn name(&self) -> &str {
      "core.rename"
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::{change::{Author, Change}, checkout::Checkout, revision::Revision};

   fn dummy_change() -> Change {
      Change {
         revision: Revision::new("x"),
         author: Author::new("a", "a@example.com"),
         original_author: Author::new("a", "a@example.com"),
         timestamp: chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
         message: "m".to_string(),
         parents: vec![],
         is_merge: false,
         labels: indexmap::IndexMap::new(),
      }
   }

   #[test]
   fn move_relocates_matching_paths() {
      let mut checkout = Checkout::new();
      checkout.insert("src/a.rs", b"1".to_vec(), false);
      let mut change = dummy_change();
      let mv = Move { before: "src".to_string(), after: String::new(), paths: Glob::new(["**"]).unwrap(), overwrite: false };
      let mut ctx = TransformContext { checkout: &mut checkout, change: &mut change };
      assert_eq!(mv.apply(&mut ctx).unwrap(), TransformResult::Success);
      assert!(checkout.exists("a.rs"));
      assert!(!checkout.exists("src/a.rs"));
   }

   #[test]
   fn move_with_no_matches_is_noop_error() {
      let mut checkout = Checkout::new();
      let mut change = dummy_change();
      let mv = Move { before: "src".to_string(), after: String::new(), paths: Glob::new(["**"]).unwrap(), overwrite: false };
      let mut ctx = TransformContext { checkout: &mut checkout, change: &mut change };
      assert!(matches!(mv.apply(&mut ctx), Err(MigrationError::TransformationNoOp { .. })));
   }

   #[test]
   fn move_is_reversible_when_overwrite_false() {
      let mv = Move { before: "src".to_string(), after: "dst".to_string(), paths: Glob::new(["**"]).unwrap(), overwrite: false };
      assert!(mv.invert().is_some());
      let mv_overwrite = Move { overwrite: true, ..Move { before: "src".to_string(), after: "dst".to_string(), paths: Glob::new(["**"]).unwrap(), overwrite: false } };
      assert!(mv_overwrite.invert().is_none());
   }
}
