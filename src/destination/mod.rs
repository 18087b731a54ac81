//! Destination writer (C3).
//!
//! The write side of a migration: receives a staged working directory and
//! commit metadata, applies it atomically to the destination, and returns
//! a destination reference. Also exposes read-back for three-way merge.

pub mod folder;
pub mod gerrit;
pub mod git;
pub mod github;

use crate::{
   change::{Author, Change},
   checkout::Checkout,
   error::Result,
   glob::Glob,
   revision::Revision,
};

/// Outcome of one `write` call, matching `4.3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
   Created,
   Updated,
   NoOp,
   InsufficientApprovals,
}

#[derive(Debug, Clone)]
pub struct DestinationRef {
   pub id:   String,
   pub kind: String,
   pub url:  Option<String>,
}

#[derive(Debug, Clone)]
pub struct WriteResult {
   pub status:          WriteStatus,
   pub destination_ref: Option<DestinationRef>,
}

/// Everything a `write` call needs beyond the staged tree: the rendered
/// commit message, authorship, the migration identity (for code-review
/// destinations), and the parent the new commit should attach to.
#[derive(Debug, Clone, Copy)]
pub struct WriteMetadata<'a> {
   pub message:     &'a str,
   pub author:      &'a Author,
   pub identity:    &'a str,
   pub parent_ref:  Option<&'a Revision>,
   pub allow_empty_diff: bool,
}

pub trait DestinationWriter {
   /// Apply `checkout` atomically, returning the resulting status and
   /// (for newly created or updated changes) a destination reference.
   fn write(&self, checkout: &Checkout, metadata: &WriteMetadata<'_>) -> Result<WriteResult>;

   /// Scan destination history for the most recent `label_name` value, to
   /// discover `last_rev`.
   fn previous_ref(&self, label_name: &str) -> Result<Option<Revision>>;

   /// Read back a single file from the current destination state, used by
   /// merge-import (C8) to obtain `D`.
   fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>>;

   fn file_exists(&self, path: &str) -> Result<bool> {
      Ok(self.read_file(path)?.is_some())
   }

   /// Copy every destination file matching `glob` into a target
   /// [`Checkout`] — used by transformations that need destination-aware
   /// generation via the action host.
   fn copy_files(&self, glob: &Glob, into: &mut Checkout) -> Result<()>;

   /// Every change the destination has recorded, newest first — used by
   /// [`crate::identity::find_last_rev`].
   fn history_newest_first(&self) -> Result<Vec<Change>>;
}

/// Tagged union over the concrete destination kinds this engine ships.
pub enum Destination {
   GitBranch(git::GitBranchDestination),
   GitHubPr(github::GitHubPrDestination),
   Gerrit(gerrit::GerritDestination),
   Folder(folder::FolderDestination),
}

impl DestinationWriter for Destination {
   fn write(&self, checkout: &Checkout, metadata: &WriteMetadata<'_>) -> Result<WriteResult> {
      match self {
         Self::GitBranch(d) => d.write(checkout, metadata),
         Self::GitHubPr(d) => d.write(checkout, metadata),
         Self::Gerrit(d) => d.write(checkout, metadata),
         Self::Folder(d) => d.write(checkout, metadata),
      }
   }

   fn previous_ref(&self, label_name: &str) -> Result<Option<Revision>> {
      match self {
         Self::GitBranch(d) => d.previous_ref(label_name),
         Self::GitHubPr(d) => d.previous_ref(label_name),
         Self::Gerrit(d) => d.previous_ref(label_name),
         Self::Folder(d) => d.previous_ref(label_name),
      }
   }

   fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
      match self {
         Self::GitBranch(d) => d.read_file(path),
         Self::GitHubPr(d) => d.read_file(path),
         Self::Gerrit(d) => d.read_file(path),
         Self::Folder(d) => d.read_file(path),
      }
   }

   fn copy_files(&self, glob: &Glob, into: &mut Checkout) -> Result<()> {
      match self {
         Self::GitBranch(d) => d.copy_files(glob, into),
         Self::GitHubPr(d) => d.copy_files(glob, into),
         Self::Gerrit(d) => d.copy_files(glob, into),
         Self::Folder(d) => d.copy_files(glob, into),
      }
   }

   fn history_newest_first(&self) -> Result<Vec<Change>> {
      match self {
         Self::GitBranch(d) => d.history_newest_first(),
         Self::GitHubPr(d) => d.history_newest_first(),
         Self::Gerrit(d) => d.history_newest_first(),
         Self::Folder(d) => d.history_newest_first(),
      }
   }
}
