//! Folder origin: a local directory treated as a single unversioned
//! "change" — useful for one-shot imports of a vendored tree that has no
//! revision history of its own.

use std::path::{Path, PathBuf};

use chrono::Local;

use crate::{
   change::{Author, Change},
   checkout::{Checkout, SymlinkPolicy},
   error::Result,
   glob::Glob,
   origin::{OriginReader, SubmoduleStrategy},
   revision::Revision,
};

pub struct FolderOrigin {
   pub path: PathBuf,
}

impl FolderOrigin {
   pub fn new(path: impl Into<PathBuf>) -> Self {
      Self { path: path.into() }
   }
}

impl OriginReader for FolderOrigin {
   fn resolve(&self, _user_ref: &str) -> Result<Revision> {
      // A folder has no content-hash identity of its own; the path itself
      // stands in as the revision id, since FolderOrigin has exactly one
      // unversioned change per invocation.
      Ok(Revision::new(self.path.to_string_lossy().into_owned()))
   }

   fn changes(&self, _last_rev: Option<&Revision>, head: &Revision) -> Result<Vec<Change>> {
      let author = Author::new("folder-import", "folder-import@localhost");
      Ok(vec![Change {
         revision: head.clone(),
         author: author.clone(),
         original_author: author,
         timestamp: Local::now().fixed_offset(),
         message: format!("Import from folder {}", self.path.display()),
         parents: Vec::new(),
         is_merge: false,
         labels: indexmap::IndexMap::new(),
      }])
   }

   fn checkout(
      &self,
      _revision: &Revision,
      workdir: &Path,
      files: &Glob,
      _submodules: SubmoduleStrategy,
      symlinks: SymlinkPolicy,
   ) -> Result<Checkout> {
      let checkout = Checkout::load_from_dir(&self.path, &|p| files.matches(p), symlinks)?;
      checkout.materialize(workdir)?;
      Ok(checkout)
   }
}
