//! `core.filter_replace`: restrict a mapping transformation to files/lines
//! matched by a regex, optionally routing through a capture group (`4.5`).

use std::collections::BTreeMap;

use crate::{
   error::{MigrationError, Result},
   glob::Glob,
   pipeline::{replace::Replace, TransformContext, TransformResult, Transformation},
};

/// How a matched (or captured) string is rewritten once `filter_replace`
/// has decided a line is in scope.
pub enum ReplaceMapper {
   /// Look the matched text up verbatim in a dictionary; unmapped text is
   /// left untouched.
   Dictionary(BTreeMap<String, String>),
   /// Run a list of `replace` transformations against the matched text,
   /// in order. `first_match_wins=false` (`all`) applies every
   /// transformation that matches in sequence; `true` stops at the first.
   Chain { replaces: Vec<Replace>, first_match_wins: bool },
}

impl ReplaceMapper {
   fn map(&self, text: &str, change: &mut crate::change::Change) -> Result<Option<String>> {
      match self {
         Self::Dictionary(map) => Ok(map.get(text).cloned()),
         Self::Chain { replaces, first_match_wins } => {
            let mut checkout = crate::checkout::Checkout::new();
            checkout.insert("__filter_replace__", text.as_bytes().to_vec(), false);
            let mut any = false;
            for r in replaces {
               let mut ctx = TransformContext { checkout: &mut checkout, change };
               match r.apply(&mut ctx) {
                  Ok(_) => {
                     any = true;
                     if *first_match_wins {
                        break;
                     }
                  },
                  Err(MigrationError::TransformationNoOp { .. }) => continue,
                  Err(e) => return Err(e),
               }
            }
            if any {
               let content = checkout.get("__filter_replace__").map(|f| f.content.clone()).unwrap_or_default();
               Ok(Some(String::from_utf8_lossy(&content).into_owned()))
            } else {
               Ok(None)
            }
         },
      }
   }
}

/// `filter_replace(regex, mapping, group, paths, reverse)`. Unlike
/// [`Replace`], which substitutes against a fixed template, this scans
/// each matched occurrence of `regex` (or its `group`-th capture) and asks
/// `mapping` what to put there — a per-occurrence dictionary/chain lookup
/// rather than a single textual substitution.
pub struct FilterReplace {
   pub regex:   regex::Regex,
   pub mapping: ReplaceMapper,
   pub group:   Option<usize>,
   pub paths:   Glob,
   pub reverse: Option<regex::Regex>,
}

impl FilterReplace {
   fn rewrite(&self, text: &str, change: &mut crate::change::Change) -> Result<(String, bool)> {
      let mut out = String::with_capacity(text.len());
      let mut last = 0;
      let mut changed = false;

      for caps in self.regex.captures_iter(text) {
         let whole = caps.get(0).unwrap();
         let target = match self.group {
            Some(g) => caps.get(g).unwrap_or(whole),
            None => whole,
         };

         out.push_str(&text[last..target.start()]);
         match self.mapping.map(target.as_str(), change)? {
            Some(replacement) => {
               out.push_str(&replacement);
               changed = true;
            },
            None => out.push_str(target.as_str()),
         }
         last = target.end();
      }
      out.push_str(&text[last..]);
      Ok((out, changed))
   }
}

impl Transformation for FilterReplace {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
      let candidates: Vec<String> = ctx.checkout.paths().filter(|p| self.paths.matches(p)).map(str::to_string).collect();
      if candidates.is_empty() {
         return Err(MigrationError::TransformationNoOp { name: self.name().to_string() });
      }

      let mut any_changed = false;
      for path in candidates {
         let Some(file) = ctx.checkout.get(&path).cloned() else { continue };
         let Ok(text) = std::str::from_utf8(&file.content) else { continue };
         let (rewritten, changed) = self.rewrite(text, ctx.change)?;
         if changed {
            ctx.checkout.insert(path, rewritten.into_bytes(), file.executable);
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
      // Only invertible when an explicit `reverse` regex was supplied and
      // the mapping is a plain dictionary, which can be flipped key<->value.
      let reverse = self.reverse.clone()?;
      let ReplaceMapper::Dictionary(map) = &self.mapping else { return None };
      let flipped: BTreeMap<String, String> = map.iter().map(|(k, v)| (v.clone(), k.clone())).collect();
      Some(Box::new(Self {
         regex:   reverse,
         mapping: ReplaceMapper::Dictionary(flipped),
         group:   self.group,
         paths:   self.paths.clone(),
         reverse: Some(self.regex.clone()),
      }))
   }

   fn name(&self) -> &str {
      "core.filter_replace"
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
   fn dictionary_mapping_rewrites_matched_words_only() {
      let mut checkout = Checkout::new();
      checkout.insert("a.txt", b"import foo; import bar;".to_vec(), false);
      let mut change = dummy_change();

      let mut map = BTreeMap::new();
      map.insert("foo".to_string(), "baz".to_string());

      let fr = FilterReplace {
         regex:   regex::Regex::new(r"\bimport (\w+)").unwrap(),
         mapping: ReplaceMapper::Dictionary(map),
         group:   Some(1),
         paths:   Glob::new(["**"]).unwrap(),
         reverse: None,
      };
      let mut ctx = TransformContext { checkout: &mut checkout, change: &mut change };
      assert_eq!(fr.apply(&mut ctx).unwrap(), TransformResult::Success);
      assert_eq!(checkout.get("a.txt").unwrap().content, b"import baz; import bar;");
   }

   #[test]
   fn unmapped_matches_leave_text_untouched_and_report_noop() {
      let mut checkout = Checkout::new();
      checkout.insert("a.txt", b"import bar;".to_vec(), false);
      let mut change = dummy_change();

      let fr = FilterReplace {
         regex:   regex::Regex::new(r"\bimport (\w+)").unwrap(),
         mapping: ReplaceMapper::Dictionary(BTreeMap::new()),
         group:   Some(1),
         paths:   Glob::new(["**"]).unwrap(),
         reverse: None,
      };
      let mut ctx = TransformContext { checkout: &mut checkout, change: &mut change };
      assert!(matches!(fr.apply(&mut ctx), Err(MigrationError::TransformationNoOp { .. })));
   }

   #[test]
   fn dictionary_with_reverse_regex_is_invertible() {
      let mut map = BTreeMap::new();
      map.insert("foo".to_string(), "baz".to_string());
      let fr = FilterReplace {
         regex:   regex::Regex::new(r"\bimport (\w+)").unwrap(),
         mapping: ReplaceMapper::Dictionary(map),
         group:   Some(1),
         paths:   Glob::new(["**"]).unwrap(),
         reverse: Some(regex::Regex::new(r"\bimport (\w+)").unwrap()),
      };
      assert!(fr.invert().is_some());
   }
}
