//! Gerrit change destination: pushes to `refs/for/<branch>` and updates
//! the change identified by the migration identity (via a
//! `Change-Id:` trailer derived from the identity).

use std::process::Command;

use crate::{
   change::Change,
   checkout::Checkout,
   destination::{
      DestinationRef, DestinationWriter, WriteMetadata, WriteResult, WriteStatus,
      git::GitBranchDestination,
   },
   error::{MigrationError, Result},
   glob::Glob,
   revision::Revision,
};

pub struct GerritDestination {
   pub host:   String,
   pub branch: String,
   pub git:    GitBranchDestination,
}

impl GerritDestination {
   pub fn new(host: impl Into<String>, branch: impl Into<String>, local_path: impl Into<String>) -> Self {
      let branch = branch.into();
      Self { host: host.into(), git: GitBranchDestination::new(local_path, branch.clone()), branch }
   }

   fn change_id_trailer(identity: &str) -> String {
      format!("Change-Id: I{identity}")
   }

   fn push_for_review(&self, commit: &str) -> Result<()> {
      let output = Command::new("git")
         .arg("-C")
         .arg(&self.git.url_or_path)
         .args(["push", &self.host, &format!("{commit}:refs/for/{}", self.branch)])
         .env("GIT_TERMINAL_PROMPT", "0")
         .output()
         .map_err(|e| MigrationError::Other(format!("failed to spawn git push: {e}")))?;
      if !output.status.success() {
         return Err(MigrationError::Other(format!(
            "gerrit push for review failed: {}",
            String::from_utf8_lossy(&output.stderr)
         )));
      }
      Ok(())
   }
}

impl DestinationWriter for GerritDestination {
   fn write(&self, checkout: &Checkout, metadata: &WriteMetadata<'_>) -> Result<WriteResult> {
      let message_with_trailer =
         format!("{}\n\n{}\n", metadata.message.trim_end(), Self::change_id_trailer(metadata.identity));
      let augmented = WriteMetadata { message: &message_with_trailer, ..*metadata };

      let result = self.git.write(checkout, &augmented)?;
      if matches!(result.status, WriteStatus::NoOp) {
         return Ok(result);
      }
      let Some(commit_ref) = &result.destination_ref else { return Ok(result) };
      self.push_for_review(&commit_ref.id)?;

      Ok(WriteResult {
         status: result.status,
         destination_ref: Some(DestinationRef {
            id:   metadata.identity.to_string(),
            kind: "gerrit-change".to_string(),
            url:  Some(format!("{}/c/{}", self.host, metadata.identity)),
         }),
      })
   }

   fn previous_ref(&self, label_name: &str) -> Result<Option<Revision>> {
      self.git.previous_ref(label_name)
   }

   fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
      self.git.read_file(path)
   }

   fn copy_files(&self, glob: &Glob, into: &mut Checkout) -> Result<()> {
      self.git.copy_files(glob, into)
   }

   fn history_newest_first(&self) -> Result<Vec<Change>> {
      self.git.history_newest_first()
   }
}
