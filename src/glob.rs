//! Glob & path model (C4).
//!
//! A semantic set of relative paths, described by include/exclude pattern
//! lists and closed under union (`+`) and difference (`-`). Matching is
//! purely by pattern — a `Glob` never walks a filesystem, it only tests
//! candidate relative paths already known to a checkout or destination
//! tree.

use std::fmt;

use crate::error::{MigrationError, Result};

/// One compiled include/exclude pattern list, equivalent to a `regex::Regex`
/// alternation compiled once at construction time.
#[derive(Clone)]
struct PatternSet {
   regexes: Vec<regex::Regex>,
}

impl fmt::Debug for PatternSet {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("PatternSet").field("patterns", &self.regexes.len()).finish()
   }
}

impl PatternSet {
   fn compile(patterns: &[String]) -> Result<Self> {
      let mut regexes = Vec::with_capacity(patterns.len());
      for pattern in patterns {
         regexes.push(compile_pattern(pattern)?);
      }
      Ok(Self { regexes })
   }

   fn matches(&self, path: &str) -> bool {
      self.regexes.iter().any(|r| r.is_match(path))
   }
}

/// A semantic set of relative paths. `Glob::new` memoizes pattern
/// compilation; `matches` only tests a candidate path string.
#[derive(Debug, Clone)]
pub struct Glob {
   include: PatternSet,
   exclude: PatternSet,
}

impl Glob {
   /// Construct a glob from plain include patterns (no exclusions). A
   /// plain path list is a degenerate form of this constructor.
   pub fn new(include: impl IntoIterator<Item = impl Into<String>>) -> Result<Self> {
      Self::with_exclude(include, std::iter::empty::<String>())
   }

   /// Construct a glob with both include and exclude pattern lists.
   pub fn with_exclude(
      include: impl IntoIterator<Item = impl Into<String>>,
      exclude: impl IntoIterator<Item = impl Into<String>>,
   ) -> Result<Self> {
      let include: Vec<String> = include.into_iter().map(Into::into).collect();
      let exclude: Vec<String> = exclude.into_iter().map(Into::into).collect();

      for pattern in include.iter().chain(exclude.iter()) {
         validate_pattern(pattern)?;
      }

      Ok(Self { include: PatternSet::compile(&include)?, exclude: PatternSet::compile(&exclude)? })
   }

   /// `p ∈ glob` iff `p` matches some include pattern and no exclude
   /// pattern. Paths are tested with forward-slash separators.
   pub fn matches(&self, path: &str) -> bool {
      self.include.matches(path) && !self.exclude.matches(path)
   }

   /// `a + b`: union. A path is in the union iff it is in either operand.
   pub fn union(self, other: Self) -> UnionGlob {
      UnionGlob::Union(Box::new(self), Box::new(other))
   }

   /// `a - b`: difference. A path is in the difference iff it is in `self`
   /// and not in `other`.
   pub fn difference(self, other: Self) -> UnionGlob {
      UnionGlob::Difference(Box::new(self), Box::new(other))
   }
}

/// The result of combining globs with `+`/`-`. Kept distinct from `Glob`
/// because union/difference compose recursively without re-flattening
/// pattern lists, and because a `Glob` alone already supports
/// include/exclude — `UnionGlob` models cross-glob boolean algebra.
#[derive(Debug, Clone)]
pub enum UnionGlob {
   Single(Glob),
   Union(Box<UnionGlobLike>, Box<UnionGlobLike>),
   Difference(Box<UnionGlobLike>, Box<UnionGlobLike>),
}

/// Anything that can answer "does this path match" — a leaf `Glob` or a
/// composed `UnionGlob`.
pub type UnionGlobLike = UnionGlob;

impl From<Glob> for UnionGlob {
   fn from(glob: Glob) -> Self {
      Self::Single(glob)
   }
}

impl UnionGlob {
   pub fn matches(&self, path: &str) -> bool {
      match self {
         Self::Single(glob) => glob.matches(path),
         Self::Union(a, b) => a.matches(path) || b.matches(path),
         Self::Difference(a, b) => a.matches(path) && !b.matches(path),
      }
   }

   pub fn union(self, other: impl Into<Self>) -> Self {
      Self::Union(Box::new(self), Box::new(other.into()))
   }

   pub fn difference(self, other: impl Into<Self>) -> Self {
      Self::Difference(Box::new(self), Box::new(other.into()))
   }
}

fn validate_pattern(pattern: &str) -> Result<()> {
   if pattern.starts_with('/') {
      return Err(MigrationError::ConfigError(format!(
         "glob pattern '{pattern}' must be relative, not absolute"
      )));
   }
   if pattern.starts_with("..") || pattern.split('/').any(|seg| seg == "..") {
      return Err(MigrationError::ConfigError(format!(
         "glob pattern '{pattern}' must not contain '..'"
      )));
   }
   Ok(())
}

/// Compile one bash-like glob pattern (`**`, `*`, `?`, `{a,b}`) to a
/// fully-anchored regex.
fn compile_pattern(pattern: &str) -> Result<regex::Regex> {
   let expanded = expand_braces(pattern)?;
   let alternation = expanded
      .iter()
      .map(|p| translate_to_regex(p))
      .collect::<Vec<_>>()
      .join("|");
   let anchored = format!("^(?:{alternation})$");
   regex::Regex::new(&anchored)
      .map_err(|e| MigrationError::ConfigError(format!("invalid glob pattern '{pattern}': {e}")))
}

/// Expand `{a,b,c}` alternatives into the cartesian product of literal
/// strings. Only one level of braces is supported, matching the grammar
/// in `4.4` (no nested brace expansion).
fn expand_braces(pattern: &str) -> Result<Vec<String>> {
   let Some(open) = pattern.find('{') else { return Ok(vec![pattern.to_string()]) };
   let Some(close) = pattern[open..].find('}').map(|i| i + open) else {
      return Err(MigrationError::ConfigError(format!(
         "unbalanced '{{' in glob pattern '{pattern}'"
      )));
   };

   let prefix = &pattern[..open];
   let alternatives = &pattern[open + 1..close];
   let suffix = &pattern[close + 1..];

   let mut results = Vec::new();
   for alt in alternatives.split(',') {
      for tail in expand_braces(suffix)? {
         results.push(format!("{prefix}{alt}{tail}"));
      }
   }
   Ok(results)
}

/// Translate one brace-free glob segment into a regex fragment. `**`
/// matches any number of path segments including zero; `*` matches any
/// run of non-separator characters; `?` matches exactly one
/// non-separator character; everything else is escaped literally.
fn translate_to_regex(pattern: &str) -> String {
   let mut out = String::with_capacity(pattern.len() * 2);
   let chars: Vec<char> = pattern.chars().collect();
   let mut i = 0;
   while i < chars.len() {
      match chars[i] {
         '*' if chars.get(i + 1) == Some(&'*') => {
            // `**` consumes path segments; also swallow an adjacent `/`
            // so `a/**/b` matches `a/b` (zero segments).
            if chars.get(i + 2) == Some(&'/') {
               out.push_str("(?:.*/)?");
               i += 3;
            } else {
               out.push_str(".*");
               i += 2;
            }
         },
         '*' => {
            out.push_str("[^/]*");
            i += 1;
         },
         '?' => {
            out.push_str("[^/]");
            i += 1;
         },
         c => {
            out.push_str(&regex::escape(&c.to_string()));
            i += 1;
         },
      }
   }
   out
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn star_star_matches_any_depth() {
      let glob = Glob::new(["**"]).unwrap();
      assert!(glob.matches("a"));
      assert!(glob.matches("a/b/c.rs"));
   }

   #[test]
   fn star_does_not_cross_separator() {
      let glob = Glob::new(["src/*.rs"]).unwrap();
      assert!(glob.matches("src/main.rs"));
      assert!(!glob.matches("src/sub/main.rs"));
   }

   #[test]
   fn brace_expansion() {
      let glob = Glob::new(["*.{txt,md}"]).unwrap();
      assert!(glob.matches("readme.md"));
      assert!(glob.matches("notes.txt"));
      assert!(!glob.matches("main.rs"));
   }

   #[test]
   fn exclude_overrides_include() {
      let glob = Glob::with_exclude(["**"], ["**/*.tmp"]).unwrap();
      assert!(glob.matches("src/main.rs"));
      assert!(!glob.matches("cache.tmp"));
   }

   #[test]
   fn absolute_pattern_is_config_error() {
      assert!(Glob::new(["/etc/passwd"]).is_err());
   }

   #[test]
   fn dotdot_pattern_is_config_error() {
      assert!(Glob::new(["../secret"]).is_err());
   }

   /// S6: `(glob(["**"]) - glob(["**.tmp"])) + glob(["keep.tmp"])` matches
   /// `keep.tmp`, not `other.tmp`, and matches `src/main.rs`.
   #[test]
   fn union_and_difference_scenario_s6() {
      let everything = Glob::new(["**"]).unwrap();
      let tmp_files = Glob::new(["**.tmp"]).unwrap();
      let keep = Glob::new(["keep.tmp"]).unwrap();

      let combined: UnionGlob =
         UnionGlob::from(everything).difference(tmp_files).union(keep);

      assert!(combined.matches("keep.tmp"));
      assert!(!combined.matches("other.tmp"));
      assert!(combined.matches("src/main.rs"));
   }

   #[test]
   fn union_is_or_difference_is_and_not() {
      let a = Glob::new(["a/**"]).unwrap();
      let b = Glob::new(["b/**"]).unwrap();

      let union: UnionGlob = UnionGlob::from(a.clone()).union(b.clone());
      assert!(union.matches("a/x"));
      assert!(union.matches("b/y"));
      assert!(!union.matches("c/z"));

      let diff: UnionGlob = UnionGlob::from(a).difference(b);
      assert!(diff.matches("a/x"));
   }
}
