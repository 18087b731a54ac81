//! GitHub pull-request origin: resolves a PR URL/number to its head
//! revision, fetches PR metadata over the GitHub REST API, and delegates
//! tree materialization to the underlying git ref once fetched.

use std::path::Path;

use crate::{
   change::Change,
   checkout::{Checkout, SymlinkPolicy},
   error::{MigrationError, Result},
   glob::Glob,
   origin::{
      Baseline, EligibilityPredicates, OriginReader, SubmoduleStrategy, VersionLabels,
      git::GitBranchOrigin,
   },
   revision::Revision,
};

/// A single pull request as reported by the GitHub API, trimmed to the
/// fields the engine's eligibility predicates and baseline computation
/// need.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PullRequestInfo {
   pub number: u64,
   pub title:  String,
   pub state:  String,
   pub head:   RefInfo,
   pub base:   RefInfo,
   #[serde(default)]
   pub labels: Vec<LabelInfo>,
   #[serde(default)]
   pub mergeable: Option<bool>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct RefInfo {
   pub sha: String,
   #[serde(rename = "ref")]
   pub reference: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct LabelInfo {
   pub name: String,
}

pub struct GitHubPrOrigin {
   /// `owner/repo`.
   pub repo:           String,
   /// Local bare/working clone used for checkout once a PR head SHA is
   /// known.
   pub local_clone:    GitBranchOrigin,
   pub api_base:       String,
   pub token:          Option<String>,
   pub merge_mode:     bool,
}

impl GitHubPrOrigin {
   pub fn new(repo: impl Into<String>, local_clone_path: impl Into<String>) -> Self {
      Self {
         repo:        repo.into(),
         local_clone: GitBranchOrigin::new(local_clone_path),
         api_base:    "https://api.github.com".to_string(),
         token:       std::env::var("GITHUB_TOKEN").ok(),
         merge_mode:  false,
      }
   }

   fn client(&self) -> Result<reqwest::blocking::Client> {
      reqwest::blocking::Client::builder()
         .user_agent("copyhaul")
         .build()
         .map_err(MigrationError::HttpError)
   }

   fn pr_number(&self, user_ref: &str) -> Result<u64> {
      if let Some(n) = user_ref.rsplit('/').next().and_then(|s| s.parse().ok()) {
         return Ok(n);
      }
      user_ref
         .parse()
         .map_err(|_| MigrationError::ResolutionError(format!("not a PR reference: '{user_ref}'")))
   }

   pub fn fetch_pr(&self, number: u64) -> Result<PullRequestInfo> {
      let url = format!("{}/repos/{}/pulls/{number}", self.api_base, self.repo);
      let mut request = self.client()?.get(&url);
      if let Some(token) = &self.token {
         request = request.bearer_auth(token);
      }
      let response = request.send().map_err(MigrationError::HttpError)?;
      if !response.status().is_success() {
         return Err(MigrationError::ResolutionError(format!(
            "GitHub API returned {} for PR #{number}",
            response.status()
         )));
      }
      response.json().map_err(MigrationError::HttpError)
   }
}

impl OriginReader for GitHubPrOrigin {
   fn resolve(&self, user_ref: &str) -> Result<Revision> {
      let number = self.pr_number(user_ref)?;
      let pr = self.fetch_pr(number)?;
      Ok(
         Revision::new(pr.head.sha.clone())
            .with_label("GITHUB_PR_NUMBER", pr.number.to_string())
            .with_label("GITHUB_PR_TITLE", pr.title)
            .with_label("GITHUB_PR_HEAD_REF", pr.head.reference)
            .with_label("GITHUB_PR_BASE_REF", pr.base.reference),
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
      let Some(number) = revision.label("GITHUB_PR_NUMBER").and_then(|s| s.parse().ok()) else {
         return Ok(Vec::new());
      };
      let pr = self.fetch_pr(number)?;
      let mut unmet = Vec::new();

      let have: Vec<&str> = pr.labels.iter().map(|l| l.name.as_str()).collect();
      for required in &predicates.required_labels {
         if !have.contains(&required.as_str()) {
            unmet.push(format!("missing required label '{required}'"));
         }
      }
      if pr.state != "open" {
         unmet.push(format!("PR is not open (state={})", pr.state));
      }
      if let Some(false) = pr.mergeable {
         unmet.push("PR has merge conflicts".to_string());
      }
      Ok(unmet)
   }

   fn baseline(&self, revision: &Revision) -> Result<Option<Baseline>> {
      let Some(number) = revision.label("GITHUB_PR_NUMBER").and_then(|s| s.parse().ok()) else {
         return Ok(None);
      };
      let pr = self.fetch_pr(number)?;
      let base_revision = if self.merge_mode {
         self.local_clone.resolve(&pr.base.reference)?
      } else {
         // The divergence point: merge-base of head and base.
         self.local_clone.resolve(&format!("{}...{}", pr.base.sha, pr.head.sha))?
      };
      Ok(Some(Baseline { revision: base_revision, is_merge_mode: self.merge_mode }))
   }
}
