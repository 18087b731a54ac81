//! Gerrit change origin: resolves a change number/Change-Id to its
//! current patch-set revision and fetches change metadata over Gerrit's
//! REST API. Tree materialization delegates to a local clone of the
//! Gerrit-backed git repository.

use std::path::Path;

use crate::{
   change::Change,
   checkout::{Checkout, SymlinkPolicy},
   error::{MigrationError, Result},
   glob::Glob,
   origin::{EligibilityPredicates, OriginReader, SubmoduleStrategy, VersionLabels, git::GitBranchOrigin},
   revision::Revision,
};

#[derive(Debug, Clone, serde::Deserialize)]
pub struct GerritChangeInfo {
   #[serde(rename = "_number")]
   pub number:      u64,
   pub change_id:   String,
   pub status:      String,
   pub current_revision: String,
   #[serde(default)]
   pub labels: std::collections::BTreeMap<String, GerritLabelInfo>,
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct GerritLabelInfo {
   #[serde(default)]
   pub approved: Option<serde_json::Value>,
   #[serde(default)]
   pub rejected: Option<serde_json::Value>,
}

pub struct GerritOrigin {
   pub host:        String,
   pub local_clone: GitBranchOrigin,
}

impl GerritOrigin {
   pub fn new(host: impl Into<String>, local_clone_path: impl Into<String>) -> Self {
      Self { host: host.into(), local_clone: GitBranchOrigin::new(local_clone_path) }
   }

   fn client(&self) -> Result<reqwest::blocking::Client> {
      reqwest::blocking::Client::builder().user_agent("copyhaul").build().map_err(MigrationError::HttpError)
   }

   /// Gerrit prefixes JSON responses with a magic string to prevent XSSI;
   /// strip it before parsing.
   fn fetch_change(&self, id: &str) -> Result<GerritChangeInfo> {
      let url = format!("{}/changes/{id}/detail?o=CURRENT_REVISION&o=LABELS", self.host);
      let response = self.client()?.get(&url).send().map_err(MigrationError::HttpError)?;
      if !response.status().is_success() {
         return Err(MigrationError::ResolutionError(format!(
            "Gerrit returned {} for change {id}",
            response.status()
         )));
      }
      let body = response.text().map_err(MigrationError::HttpError)?;
      let trimmed = body.trim_start_matches(")]}'\n");
      serde_json::from_str(trimmed).map_err(MigrationError::JsonError)
   }
}

impl OriginReader for GerritOrigin {
   fn resolve(&self, user_ref: &str) -> Result<Revision> {
      let change = self.fetch_change(user_ref)?;
      Ok(
         Revision::new(change.current_revision.clone())
            .with_label("GERRIT_CHANGE_NUMBER", change.number.to_string())
            .with_label("GERRIT_CHANGE_ID", change.change_id),
      )
   }

   fn changes(&self, last_rev: Option<&Revision>, head: &Revision) -> Result<Vec<Change>> {
      self.local_clone.changes(last_rev, head)
   }

   fn checkout(
      &self,
      revision: &Revision,
      workdir: &Path,
      files: &Glob,
      submodules: SubmoduleStrategy,
      symlinks: SymlinkPolicy,
   ) -> Result<Checkout> {
      self.local_clone.checkout(revision, workdir, files, submodules, symlinks)
   }

   fn describe_version(&self, revision: &Revision) -> Result<VersionLabels> {
      self.local_clone.describe_version(revision)
   }

   fn check_eligibility(
      &self,
      revision: &Revision,
      predicates: &EligibilityPredicates,
   ) -> Result<Vec<String>> {
      let Some(number) = revision.label("GERRIT_CHANGE_NUMBER") else { return Ok(Vec::new()) };
      let change = self.fetch_change(number)?;
      let mut unmet = Vec::new();

      if change.status != "NEW" {
         unmet.push(format!("change is not open (status={})", change.status));
      }
      for label in &predicates.allowed_review_states {
         if let Some(info) = change.labels.get(label)
            && info.rejected.is_some()
         {
            unmet.push(format!("label '{label}' has a rejection"));
         }
      }
      Ok(unmet)
   }
}
