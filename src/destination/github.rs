//! GitHub PR destination: pushes a commit to a head branch and
//! creates/updates the pull request identified by the migration identity.

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

pub struct GitHubPrDestination {
   pub repo:        String,
   pub base_branch: String,
   pub git:         GitBranchDestination,
   pub api_base:    String,
   pub token:       Option<String>,
}

impl GitHubPrDestination {
   pub fn new(repo: impl Into<String>, base_branch: impl Into<String>, local_path: impl Into<String>) -> Self {
      let base_branch = base_branch.into();
      let head_branch = format!("copyhaul/{base_branch}");
      Self {
         repo: repo.into(),
         base_branch,
         git: GitBranchDestination::new(local_path, head_branch),
         api_base: "https://api.github.com".to_string(),
         token: std::env::var("GITHUB_TOKEN").ok(),
      }
   }

   fn client(&self) -> Result<reqwest::blocking::Client> {
      reqwest::blocking::Client::builder().user_agent("copyhaul").build().map_err(MigrationError::HttpError)
   }

   /// Find an existing open PR whose head branch name embeds `identity`,
   /// or `None` if none exists yet — this is the PR-destination's use of
   /// the migration identity as a primary key.
   fn find_existing_pr(&self, identity: &str) -> Result<Option<u64>> {
      let url = format!("{}/repos/{}/pulls?state=open&head={}:{}", self.api_base, self.repo, self.repo.split('/').next().unwrap_or_default(), self.head_branch_for(identity));
      let mut request = self.client()?.get(&url);
      if let Some(token) = &self.token {
         request = request.bearer_auth(token);
      }
      let response = request.send().map_err(MigrationError::HttpError)?;
      if !response.status().is_success() {
         return Ok(None);
      }
      let prs: Vec<serde_json::Value> = response.json().map_err(MigrationError::HttpError)?;
      Ok(prs.first().and_then(|pr| pr.get("number")).and_then(serde_json::Value::as_u64))
   }

   fn head_branch_for(&self, identity: &str) -> String {
      format!("copyhaul/{identity}")
   }

   fn create_or_update_pr(&self, identity: &str, message: &str) -> Result<u64> {
      if let Some(number) = self.find_existing_pr(identity)? {
         return Ok(number);
      }
      let title = message.lines().next().unwrap_or("Migration").to_string();
      let url = format!("{}/repos/{}/pulls", self.api_base, self.repo);
      let body = serde_json::json!({
         "title": title,
         "head": self.head_branch_for(identity),
         "base": self.base_branch,
         "body": message,
      });
      let mut request = self.client()?.post(&url).json(&body);
      if let Some(token) = &self.token {
         request = request.bearer_auth(token);
      }
      let response = request.send().map_err(MigrationError::HttpError)?;
      if !response.status().is_success() {
         return Err(MigrationError::Other(format!(
            "GitHub PR creation failed: {}",
            response.status()
         )));
      }
      let created: serde_json::Value = response.json().map_err(MigrationError::HttpError)?;
      created
         .get("number")
         .and_then(serde_json::Value::as_u64)
         .ok_or_else(|| MigrationError::Other("GitHub PR response missing 'number'".to_string()))
   }
}

impl DestinationWriter for GitHubPrDestination {
   fn write(&self, checkout: &Checkout, metadata: &WriteMetadata<'_>) -> Result<WriteResult> {
      let mut git_dest = GitBranchDestination::new(
         self.git.url_or_path.clone(),
         self.head_branch_for(metadata.identity),
      );
      git_dest.force_push = true;
      let result = git_dest.write(checkout, metadata)?;

      if matches!(result.status, WriteStatus::NoOp) {
         return Ok(result);
      }

      let number = self.create_or_update_pr(metadata.identity, metadata.message)?;
      Ok(WriteResult {
         status: result.status,
         destination_ref: Some(DestinationRef {
            id:   number.to_string(),
            kind: "github-pr".to_string(),
            url:  Some(format!("https://github.com/{}/pull/{number}", self.repo)),
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
