//! Transformation pipeline (C5).
//!
//! An ordered sequence of transformations applied to (checkout,
//! metadata). Transformations are composable, optionally reversible, and
//! report a `Success`/`NoOp` status rather than raising exceptions for
//! control flow — the redesign direction `spec.md` §9 calls for.

pub mod filter_replace;
pub mod metadata;
pub mod path_ops;
pub mod replace;
pub mod verify;

use crate::{change::Change, checkout::Checkout, error::{MigrationError, Result}};

/// Per-call outcome of a transformation. A transformation either changed
/// state and returned `Success`, or left state unchanged and returned
/// `NoOp` — mixed behavior is a bug, per the invariant in `spec.md` §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformResult {
   Success,
   NoOp,
}

/// Mutable context a transformation acts on: the checkout tree and the
/// in-flight change metadata for the group currently being migrated.
pub struct TransformContext<'a> {
   pub checkout: &'a mut Checkout,
   pub change:   &'a mut Change,
}

/// The shared interface every built-in and dynamic transformation
/// implements.
pub trait Transformation: Send + Sync {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult>;

   /// Most transformations are not reversible by default; ones that are
   /// (moves, renames, invertible replaces) override this.
   fn invert(&self) -> Option<Box<dyn Transformation>> {
      None
   }

   fn name(&self) -> &str;
}

/// Group-level no-op policy (`4.5`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoopBehavior {
   #[default]
   NoopIfAnyNoop,
   IgnoreNoop,
   NoopIfAllNoop,
}

/// A named, ordered list of child transformations executed as a unit,
/// with group-level reversal and no-op semantics.
pub struct TransformGroup {
   name:          String,
   children:      Vec<Box<dyn Transformation>>,
   noop_behavior: NoopBehavior,
   /// `reverse(list)`: this group's forward execution *is* reversal of
   /// `children`, reusing the same no-op semantics.
   reversed:      bool,
}

impl TransformGroup {
   pub fn new(name: impl Into<String>, children: Vec<Box<dyn Transformation>>) -> Self {
      Self { name: name.into(), children, noop_behavior: NoopBehavior::default(), reversed: false }
   }

   pub fn with_noop_behavior(mut self, behavior: NoopBehavior) -> Self {
      self.noop_behavior = behavior;
      self
   }

   pub fn reversed(mut self) -> Self {
      self.reversed = true;
      self
   }
}

impl Transformation for TransformGroup {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
      let mut results = Vec::with_capacity(self.children.len());

      let run_one = |t: &dyn Transformation, ctx: &mut TransformContext<'_>| -> Result<TransformResult> {
         match t.apply(ctx) {
            Ok(r) => Ok(r),
            Err(MigrationError::TransformationNoOp { .. }) => Ok(TransformResult::NoOp),
            Err(e) => Err(e),
         }
      };

      if self.reversed {
         for child in self.children.iter().rev() {
            let reversible = child.invert().ok_or_else(|| {
               MigrationError::ConfigError(format!(
                  "transformation '{}' in reversed group '{}' has no inverse",
                  child.name(),
                  self.name
               ))
            })?;
            results.push(run_one(reversible.as_ref(), ctx)?);
         }
      } else {
         for child in &self.children {
            let result = run_one(child.as_ref(), ctx);
            match (&self.noop_behavior, result) {
               (NoopBehavior::IgnoreNoop, r) => {
                  results.push(r?);
               },
               (_, r) => results.push(r?),
            }
         }
      }

      Ok(resolve_group_result(&self.noop_behavior, &results))
   }

   fn invert(&self) -> Option<Box<dyn Transformation>> {
      let inverted_children: Option<Vec<_>> =
         self.children.iter().rev().map(|c| c.invert()).collect();
      Some(Box::new(TransformGroup {
         name:          format!("reverse({})", self.name),
         children:      inverted_children?,
         noop_behavior: self.noop_behavior,
         reversed:      false,
      }))
   }

   fn name(&self) -> &str {
      &self.name
   }
}

fn resolve_group_result(behavior: &NoopBehavior, results: &[TransformResult]) -> TransformResult {
   let any_noop = results.iter().any(|r| *r == TransformResult::NoOp);
   let all_noop = !results.is_empty() && results.iter().all(|r| *r == TransformResult::NoOp);

   match behavior {
      NoopBehavior::NoopIfAnyNoop => {
         if any_noop {
            TransformResult::NoOp
         } else {
            TransformResult::Success
         }
      },
      NoopBehavior::IgnoreNoop => {
         if results.is_empty() {
            TransformResult::NoOp
         } else {
            TransformResult::Success
         }
      },
      NoopBehavior::NoopIfAllNoop => {
         if all_noop {
            TransformResult::NoOp
         } else {
            TransformResult::Success
         }
      },
   }
}

/// The top-level pipeline: an ordered list of transformations run in
/// declared order, with an optional reverse-check pass.
pub struct Pipeline {
   pub transformations: Vec<Box<dyn Transformation>>,
   pub reversible_check: bool,
   pub reversible_check_ignore: crate::glob::Glob,
}

impl Pipeline {
   pub fn run(&self, checkout: &mut Checkout, change: &mut Change) -> Result<()> {
      let original = if self.reversible_check { Some(checkout.clone()) } else { None };

      {
         let mut ctx = TransformContext { checkout, change };
         for t in &self.transformations {
            t.apply(&mut ctx)?;
         }
      }

      if let Some(original) = original {
         self.assert_reversible(checkout, change, &original)?;
      }
      Ok(())
   }

   fn assert_reversible(&self, checkout: &Checkout, change: &mut Change, original: &Checkout) -> Result<()> {
      let mut working = checkout.clone();
      {
         let mut ctx = TransformContext { checkout: &mut working, change };
         for t in self.transformations.iter().rev() {
            let inverse = t.invert().ok_or_else(|| {
               MigrationError::ConfigError(format!(
                  "transformation '{}' is not reversible but reversible_check=true",
                  t.name()
               ))
            })?;
            inverse.apply(&mut ctx)?;
         }
      }

      if working.byte_equal_modulo(original, &|p| self.reversible_check_ignore.matches(p)) {
         Ok(())
      } else {
         Err(MigrationError::ReversibilityError(
            "reverse-executed pipeline diverges from the original checkout".to_string(),
         ))
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   struct Noop;
   impl Transformation for Noop {
      fn apply(&self, _ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
         Ok(TransformResult::NoOp)
      }
      fn name(&self) -> &str {
         "noop"
      }
   }

   struct Success;
   impl Transformation for Success {
      fn apply(&self, _ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
         Ok(TransformResult::Success)
      }
      fn name(&self) -> &str {
         "success"
      }
   }

   #[test]
   fn noop_if_any_noop_group_fails_on_one_noop() {
      let results = [TransformResult::Success, TransformResult::NoOp];
      assert_eq!(resolve_group_result(&NoopBehavior::NoopIfAnyNoop, &results), TransformResult::NoOp);
   }

   #[test]
   fn noop_if_all_noop_requires_every_child_noop() {
      let results = [TransformResult::Success, TransformResult::NoOp];
      assert_eq!(
         resolve_group_result(&NoopBehavior::NoopIfAllNoop, &results),
         TransformResult::Success
      );
   }

   #[test]
   fn ignore_noop_only_runs_non_noop_children_as_success() {
      let results = [TransformResult::NoOp];
      assert_eq!(resolve_group_result(&NoopBehavior::IgnoreNoop, &results), TransformResult::Success);
   }
}
