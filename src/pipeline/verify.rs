//! `core.verify_match`: assert a pattern is (or is not) present, without
//! transforming anything (`4.5`).

use crate::{
   error::{MigrationError, Result},
   glob::Glob,
   pipeline::{TransformContext, TransformResult, Transformation},
};

/// `verify_match(regex, paths, verify_no_match, also_on_reversal,
/// failure_message)`. Scans matched files for `regex`; fails the whole run
/// (a hard [`MigrationError::PreconditionError`], not a transformation
/// no-op) if the expected presence/absence does not hold.
pub struct VerifyMatch {
   pub regex:           regex::Regex,
   pub paths:           Glob,
   pub verify_no_match: bool,
   pub also_on_reversal: bool,
   pub failure_message: Option<String>,
}

impl VerifyMatch {
   fn failure(&self, path: &str) -> MigrationError {
      let default = if self.verify_no_match {
         format!("'{path}' unexpectedly matches {}", self.regex.as_str())
      } else {
         format!("'{path}' does not match {}", self.regex.as_str())
      };
      MigrationError::PreconditionError(self.failure_message.clone().unwrap_or(default))
   }
}

impl Transformation for VerifyMatch {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
      let candidates: Vec<&str> = ctx.checkout.paths().filter(|p| self.paths.matches(p)).collect();

      for path in &candidates {
         let Some(file) = ctx.checkout.get(path) else { continue };
         let Ok(text) = std::str::from_utf8(&file.content) else { continue };
         let matched = self.regex.is_match(text);
         if matched == self.verify_no_match {
            return Err(self.failure(path));
         }
      }

      // verify_match never itself changes content; per `4.5` it is not
      // subject to the success/no-op group convergence rules the same
      // way mutating transformations are, so it always reports Success
      // once preconditions hold.
      Ok(TransformResult::Success)
   }

   fn invert(&self) -> Option<Box<dyn Transformation>> {
      if !self.also_on_reversal {
         return None;
      }
      Some(Box::new(Self {
         regex:            self.regex.clone(),
         paths:            self.paths.clone(),
         verify_no_match:  self.verify_no_match,
         also_on_reversal: self.also_on_reversal,
         failure_message:  self.failure_message.clone(),
      }))
   }

   fn name(&self) -> &str {
      "core.verify_match"
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
   fn passes_when_pattern_present_and_required() {
      let mut checkout = Checkout::new();
      checkout.insert("LICENSE", b"Copyright 2024".to_vec(), false);
      let mut change = dummy_change();
      let v = VerifyMatch {
         regex: regex::Regex::new("Copyright").unwrap(),
         paths: Glob::new(["**"]).unwrap(),
         verify_no_match: false,
         also_on_reversal: false,
         failure_message: None,
      };
      let mut ctx = TransformContext { checkout: &mut checkout, change: &mut change };
      assert_eq!(v.apply(&mut ctx).unwrap(), TransformResult::Success);
   }

   #[test]
   fn fails_when_required_pattern_absent() {
      let mut checkout = Checkout::new();
      checkout.insert("LICENSE", b"nothing relevant".to_vec(), false);
      let mut change = dummy_change();
      let v = VerifyMatch {
         regex: regex::Regex::new("Copyright").unwrap(),
         paths: Glob::new(["**"]).unwrap(),
         verify_no_match: false,
         also_on_reversal: false,
         failure_message: None,
      };
      let mut ctx = TransformContext { checkout: &mut checkout, change: &mut change };
      assert!(matches!(v.apply(&mut ctx), Err(MigrationError::PreconditionError(_))));
   }

   #[test]
   fn verify_no_match_fails_when_pattern_found() {
      let mut checkout = Checkout::new();
      checkout.insert("a.rs", b"TODO: remove".to_vec(), false);
      let mut change = dummy_change();
      let v = VerifyMatch {
         regex: regex::Regex::new("TODO").unwrap(),
         paths: Glob::new(["**"]).unwrap(),
         verify_no_match: true,
         also_on_reversal: false,
         failure_message: Some("leftover TODO".to_string()),
      };
      let mut ctx = TransformContext { checkout: &mut checkout, change: &mut change };
      let err = v.apply(&mut ctx).unwrap_err();
      assert!(matches!(err, MigrationError::PreconditionError(m) if m == "leftover TODO"));
   }
}
