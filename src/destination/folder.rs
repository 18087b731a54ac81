//! Folder destination: writes the staged checkout directly onto disk at
//! a target path, with no version history of its own. Used for one-shot
//! exports and as the simplest destination for fixture-based tests.

use std::path::PathBuf;

use crate::{
   change::Change,
   checkout::Checkout,
   destination::{DestinationRef, DestinationWriter, WriteMetadata, WriteResult, WriteStatus},
   error::Result,
   glob::Glob,
};

pub struct FolderDestination {
   pub path: PathBuf,
}

impl FolderDestination {
   pub fn new(path: impl Into<PathBuf>) -> Self {
      Self { path: path.into() }
   }
}

impl DestinationWriter for FolderDestination {
   fn write(&self, checkout: &Checkout, metadata: &WriteMetadata<'_>) -> Result<WriteResult> {
      let existing = Checkout::load_from_dir(&self.path, &|_| true, crate::checkout::SymlinkPolicy::PreserveInTree)
         .unwrap_or_default();

      if !metadata.allow_empty_diff && existing.byte_equal_modulo(checkout, &|_| false) {
         return Ok(WriteResult { status: WriteStatus::NoOp, destination_ref: None });
      }

      let existed_before = self.path.exists() && std::fs::read_dir(&self.path).is_ok_and(|mut d| d.next().is_some());
      checkout.materialize(&self.path)?;

      let status = if existed_before { WriteStatus::Updated } else { WriteStatus::Created };
      Ok(WriteResult {
         status,
         destination_ref: Some(DestinationRef {
            id:   self.path.to_string_lossy().into_owned(),
            kind: "folder".to_string(),
            url:  None,
         }),
      })
   }

   fn previous_ref(&self, _label_name: &str) -> Result<Option<crate::revision::Revision>> {
      // A plain folder keeps no commit history to scan for revision-id
      // labels; resumption for folder destinations is always
      // `--init-history`.
      Ok(None)
   }

   fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
      let full = self.path.join(path);
      if !full.exists() {
         return Ok(None);
      }
      Ok(Some(std::fs::read(full)?))
   }

   fn copy_files(&self, glob: &Glob, into: &mut Checkout) -> Result<()> {
      let existing = Checkout::load_from_dir(&self.path, &|p| glob.matches(p), crate::checkout::SymlinkPolicy::PreserveInTree)?;
      for (path, file) in existing.iter() {
         into.insert(path.to_string(), file.content.clone(), file.executable);
      }
      Ok(())
   }

   fn history_newest_first(&self) -> Result<Vec<Change>> {
      Ok(Vec::new())
   }
}
