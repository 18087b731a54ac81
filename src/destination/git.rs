//! Git branch destination.
//!
//! Commits are built with `git commit-tree` exactly the way the teacher's
//! history-rewriting code built replacement commits onto a scratch ref —
//! write the tree, commit it with explicit parent(s) and author/committer
//! env vars, then move a ref. The scratch ref is always left behind for
//! inspection; it is never deleted automatically.

use std::{
   path::Path,
   process::Command,
};

use crate::{
   change::{Author, Change, parse_message},
   checkout::Checkout,
   destination::{DestinationRef, DestinationWriter, WriteMetadata, WriteResult, WriteStatus},
   error::{MigrationError, Result},
   glob::Glob,
   revision::Revision,
};

pub struct GitBranchDestination {
   pub url_or_path: String,
   pub branch:      String,
   /// Non-fast-forward updates require this explicit opt-in.
   pub force_push:  bool,
}

impl GitBranchDestination {
   pub fn new(url_or_path: impl Into<String>, branch: impl Into<String>) -> Self {
      Self { url_or_path: url_or_path.into(), branch: branch.into(), force_push: false }
   }

   fn run_git(&self, args: &[&str]) -> Result<std::process::Output> {
      Command::new("git")
         .arg("-C")
         .arg(&self.url_or_path)
         .args(args)
         .env("GIT_TERMINAL_PROMPT", "0")
         .output()
         .map_err(|e| MigrationError::Other(format!("failed to spawn git: {e}")))
   }

   fn run_git_ok(&self, args: &[&str]) -> Result<String> {
      let output = self.run_git(args)?;
      if !output.status.success() {
         return Err(MigrationError::Other(format!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
         )));
      }
      Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
   }

   fn scratch_ref(&self) -> String {
      format!("refs/copyhaul/scratch/{}", self.branch)
   }

   fn write_tree_from_checkout(&self, checkout: &Checkout) -> Result<String> {
      // Build the tree via the index: reset it, write each file as a blob,
      // update-index, then write-tree.
      self.run_git_ok(&["read-tree", "--empty"])?;
      for (path, file) in checkout.iter() {
         let mut hash_object = Command::new("git")
            .arg("-C")
            .arg(&self.url_or_path)
            .args(["hash-object", "-w", "--stdin"])
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| MigrationError::Other(format!("failed to spawn git hash-object: {e}")))?;
         use std::io::Write as _;
         hash_object
            .stdin
            .as_mut()
            .ok_or_else(|| MigrationError::Other("no stdin for hash-object".to_string()))?
            .write_all(&file.content)?;
         let output = hash_object.wait_with_output()?;
         if !output.status.success() {
            return Err(MigrationError::Other(format!(
               "git hash-object failed for {path}: {}",
               String::from_utf8_lossy(&output.stderr)
            )));
         }
         let blob_hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
         let mode = if file.executable { "100755" } else { "100644" };
         self.run_git_ok(&["update-index", "--add", "--cacheinfo", mode, &blob_hash, path])?;
      }
      self.run_git_ok(&["write-tree"])
   }

   fn commit_tree(
      &self,
      tree: &str,
      parent: Option<&str>,
      metadata: &WriteMetadata<'_>,
   ) -> Result<String> {
      let mut args = vec!["commit-tree".to_string(), tree.to_string()];
      if let Some(parent) = parent {
         args.push("-p".to_string());
         args.push(parent.to_string());
      }
      args.push("-m".to_string());
      args.push(metadata.message.to_string());

      let args_ref: Vec<&str> = args.iter().map(String::as_str).collect();

      let output = Command::new("git")
         .arg("-C")
         .arg(&self.url_or_path)
         .args(&args_ref)
         .env("GIT_AUTHOR_NAME", &metadata.author.name)
         .env("GIT_AUTHOR_EMAIL", &metadata.author.email)
         .env("GIT_COMMITTER_NAME", &metadata.author.name)
         .env("GIT_COMMITTER_EMAIL", &metadata.author.email)
         .output()
         .map_err(|e| MigrationError::Other(format!("failed to spawn git commit-tree: {e}")))?;

      if !output.status.success() {
         return Err(MigrationError::Other(format!(
            "git commit-tree failed: {}",
            String::from_utf8_lossy(&output.stderr)
         )));
      }
      Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
   }
}

impl DestinationWriter for GitBranchDestination {
   fn write(&self, checkout: &Checkout, metadata: &WriteMetadata<'_>) -> Result<WriteResult> {
      let current_tip = self.run_git_ok(&["rev-parse", &self.branch]).ok();
      let current_tree = current_tip
         .as_deref()
         .and_then(|tip| self.run_git_ok(&["rev-parse", &format!("{tip}^{{tree}}")]).ok());

      let new_tree = self.write_tree_from_checkout(checkout)?;

      if !metadata.allow_empty_diff && Some(new_tree.as_str()) == current_tree.as_deref() {
         return Ok(WriteResult { status: WriteStatus::NoOp, destination_ref: None });
      }

      let parent = metadata.parent_ref.map(Revision::id).or(current_tip.as_deref());
      let commit = self.commit_tree(&new_tree, parent, metadata)?;

      let scratch_ref = self.scratch_ref();
      self.run_git_ok(&["update-ref", &scratch_ref, &commit])?;

      let branch_ref = format!("refs/heads/{}", self.branch);
      let ff_result = if self.force_push {
         self.run_git(&["update-ref", &branch_ref, &commit])
      } else if let Some(tip) = &current_tip {
         self.run_git(&["update-ref", &branch_ref, &commit, tip])
      } else {
         self.run_git(&["update-ref", &branch_ref, &commit])
      }?;

      if !ff_result.status.success() {
         return Err(MigrationError::DestinationConflict(format!(
            "non-fast-forward update of {branch_ref} rejected (scratch ref {scratch_ref} retained at {commit})"
         )));
      }

      let status = if current_tip.is_some() { WriteStatus::Updated } else { WriteStatus::Created };
      Ok(WriteResult {
         status,
         destination_ref: Some(DestinationRef {
            id:   commit,
            kind: "git-commit".to_string(),
            url:  None,
         }),
      })
   }

   fn previous_ref(&self, label_name: &str) -> Result<Option<Revision>> {
      let history = self.history_newest_first()?;
      Ok(crate::identity::find_last_rev(&history, label_name).map(Revision::new))
   }

   fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
      let output = self.run_git(&["show", &format!("{}:{path}", self.branch)])?;
      if !output.status.success() {
         return Ok(None);
      }
      Ok(Some(output.stdout))
   }

   fn copy_files(&self, glob: &Glob, into: &mut Checkout) -> Result<()> {
      let listing = self.run_git_ok(&["ls-tree", "-r", "--name-only", &self.branch])?;
      for path in listing.lines() {
         if glob.matches(path)
            && let Some(content) = self.read_file(path)?
         {
            into.insert(path.to_string(), content, false);
         }
      }
      Ok(())
   }

   fn history_newest_first(&self) -> Result<Vec<Change>> {
      let Ok(head) = self.run_git_ok(&["rev-parse", &self.branch]) else { return Ok(Vec::new()) };

      const SEP: &str = "\x1e";
      let format = format!("%H{SEP}%P{SEP}%an{SEP}%ae{SEP}%aI{SEP}%B{SEP}%x00");
      let log = self.run_git_ok(&[
         "log",
         "--first-parent",
         &format!("--pretty=format:{format}"),
         &head,
      ])?;

      let mut changes = Vec::new();
      for record in log.split('\0') {
         let record = record.trim_start_matches('\n');
         if record.trim().is_empty() {
            continue;
         }
         let fields: Vec<&str> = record.splitn(6, SEP).collect();
         let [hash, parents, name, email, iso_date, raw_message] = fields[..] else { continue };
         let (message, labels) = parse_message(raw_message.trim_end());
         let timestamp = chrono::DateTime::parse_from_rfc3339(iso_date)
            .unwrap_or_else(|_| chrono::DateTime::parse_from_rfc2822("Thu, 1 Jan 1970 00:00:00 +0000").unwrap());
         let author = Author::new(name, email);
         changes.push(Change {
            revision: Revision::new(hash),
            is_merge: parents.split_whitespace().count() > 1,
            author: author.clone(),
            original_author: author,
            timestamp,
            message,
            parents: parents.split_whitespace().map(Revision::new).collect(),
            labels: labels.into_iter().collect(),
         });
      }
      Ok(changes)
   }
}

/// Expose the destination's local path for callers (e.g. merge-import)
/// that need to shell out to other tools against the same working tree.
pub fn working_path(destination: &GitBranchDestination) -> &Path {
   Path::new(&destination.url_or_path)
}
