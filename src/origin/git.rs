//! Git branch origin: resolves refs, lists commits, and materializes
//! trees by shelling out to the `git` binary, the same subprocess
//! discipline the teacher's history-rewriting code uses — spawn, collect
//! stdout, check exit status, map non-zero to a typed error.

use std::{
   path::{Path, PathBuf},
   process::Command,
};

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;

use crate::{
   change::{Author, Change, parse_message},
   checkout::{Checkout, SymlinkPolicy},
   config::DEFAULT_REV_ID_LABEL,
   error::{MigrationError, Result},
   glob::Glob,
   origin::{OriginReader, SubmoduleStrategy, VersionLabels},
   revision::Revision,
};

/// A local or remote git branch/ref as a migration origin.
#[derive(Debug, Clone)]
pub struct GitBranchOrigin {
   /// Local clone/working path, or a URL `git` can fetch directly.
   pub url_or_path: String,
   pub custom_rev_id: Option<String>,
}

impl GitBranchOrigin {
   pub fn new(url_or_path: impl Into<String>) -> Self {
      Self { url_or_path: url_or_path.into(), custom_rev_id: None }
   }

   fn run_git(&self, args: &[&str]) -> Result<String> {
      let output = Command::new("git")
         .arg("-C")
         .arg(&self.url_or_path)
         .args(args)
         .env("GIT_TERMINAL_PROMPT", "0")
         .output()
         .map_err(|e| MigrationError::Other(format!("failed to spawn git: {e}")))?;

      if !output.status.success() {
         return Err(MigrationError::ResolutionError(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
         )));
      }
      Ok(String::from_utf8_lossy(&output.stdout).into_owned())
   }
}

impl OriginReader for GitBranchOrigin {
   fn resolve(&self, user_ref: &str) -> Result<Revision> {
      let sha = self.run_git(&["rev-parse", user_ref])?.trim().to_string();
      if sha.is_empty() {
         return Err(MigrationError::ResolutionError(format!("unknown ref '{user_ref}'")));
      }
      Ok(Revision::new(sha))
   }

   fn changes(&self, last_rev: Option<&Revision>, head: &Revision) -> Result<Vec<Change>> {
      let range = last_rev.map_or_else(|| head.id().to_string(), |lr| format!("{}..{}", lr.id(), head.id()));

      const SEP: &str = "\x1e";
      let format = format!(
         "%H{SEP}%P{SEP}%an{SEP}%ae{SEP}%aI{SEP}%B{SEP}%x00"
      );
      let log = self.run_git(&["log", "--first-parent", "--reverse", &format!("--pretty=format:{format}"), &range])?;

      let mut changes = Vec::new();
      for record in log.split('\0') {
         let record = record.trim_start_matches('\n');
         if record.trim().is_empty() {
            continue;
         }
         let fields: Vec<&str> = record.splitn(6, SEP).collect();
         let [hash, parents, name, email, iso_date, raw_message] = fields[..] else { continue };

         let (message, labels) = parse_message(raw_message.trim_end());
         let timestamp: DateTime<FixedOffset> = DateTime::parse_from_rfc3339(iso_date)
            .unwrap_or_else(|_| DateTime::parse_from_rfc2822("Thu, 1 Jan 1970 00:00:00 +0000").unwrap());
         let parent_ids: Vec<Revision> =
            parents.split_whitespace().map(Revision::new).collect();

         let author = Author::new(name, email);
         changes.push(Change {
            revision: Revision::new(hash),
            is_merge: parent_ids.len() > 1,
            author: author.clone(),
            original_author: author,
            timestamp,
            message,
            parents: parent_ids,
            labels: labels.into_iter().collect::<IndexMap<_, _>>(),
         });
      }
      Ok(changes)
   }

   fn checkout(
      &self,
      revision: &Revision,
      workdir: &Path,
      files: &Glob,
      _submodules: SubmoduleStrategy,
      symlinks: SymlinkPolicy,
   ) -> Result<Checkout> {
      std::fs::create_dir_all(workdir)?;

      let worktree_out = Command::new("git")
         .arg("-C")
         .arg(&self.url_or_path)
         .args(["worktree", "add", "--detach", "--force"])
         .arg(workdir)
         .arg(revision.id())
         .env("GIT_TERMINAL_PROMPT", "0")
         .output()
         .map_err(|e| MigrationError::Other(format!("failed to spawn git: {e}")))?;

      if !worktree_out.status.success() {
         return Err(MigrationError::ResolutionError(format!(
            "git worktree add failed: {}",
            String::from_utf8_lossy(&worktree_out.stderr)
         )));
      }

      Checkout::load_from_dir(workdir, &|p| files.matches(p) && !p.starts_with(".git/"), symlinks)
   }

   fn describe_version(&self, revision: &Revision) -> Result<VersionLabels> {
      let described = self.run_git(&["describe", "--tags", "--always", revision.id()]).ok();
      Ok(VersionLabels {
         change_version: described.clone(),
         requested_version: described,
         first_parent: Some(revision.id().to_string()),
         sequential_number: None,
      })
   }

   fn default_rev_id_label(&self) -> &str {
      self.custom_rev_id.as_deref().unwrap_or(DEFAULT_REV_ID_LABEL)
   }
}

/// Read `last_rev` for a Git-branch origin directly from a local path
/// without constructing a full origin (used by tests and by destinations
/// discovering their own history independent of the origin side).
pub fn rev_parse_path(path: &Path, reference: &str) -> Result<String> {
   let output = Command::new("git")
      .arg("-C")
      .arg(path)
      .args(["rev-parse", reference])
      .output()
      .map_err(|e| MigrationError::Other(format!("failed to spawn git: {e}")))?;
   if !output.status.success() {
      return Err(MigrationError::ResolutionError(format!(
         "git rev-parse {reference} failed in {}",
         path.display()
      )));
   }
   Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn custom_rev_id_overrides_default_label() {
      let origin = GitBranchOrigin {
         url_or_path: ".".to_string(),
         custom_rev_id: Some("X-Origin-Rev".to_string()),
      };
      assert_eq!(origin.default_rev_id_label(), "X-Origin-Rev");
   }

   #[test]
   fn default_label_is_git_origin_rev_id() {
      let origin = GitBranchOrigin::new(".");
      assert_eq!(origin.default_rev_id_label(), DEFAULT_REV_ID_LABEL);
   }
}

/// Allow constructing a [`GitBranchOrigin`] from just a path, as used by
/// `FolderOrigin`'s delegation for git-backed folders.
impl From<PathBuf> for GitBranchOrigin {
   fn from(path: PathBuf) -> Self {
      Self::new(path.to_string_lossy().into_owned())
   }
}
