//! Action and endpoint host (C9).
//!
//! A bounded escape hatch for workflow-specific logic that the fixed
//! `[[transforms]]` vocabulary in `workflow_config.rs` cannot express:
//! [`DynamicTransform`] wraps an arbitrary closure as a
//! [`crate::pipeline::Transformation`], handed an [`ActionContext`] that
//! exposes only the specific capabilities `4.9` allows (message/author/
//! label edits, path read/write, running a nested transformation, and a
//! host-checked HTTP endpoint) rather than the whole process.
//!
//! [`retry_call`] generalizes the teacher's `api.rs` `retry_api_call` from
//! one hardcoded LLM endpoint to any origin/destination REST call: same
//! `(should_retry, Option<T>)` signature, same exponential backoff.

use std::{thread, time::Duration};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
   change::Author,
   checkout::Checkout,
   config::Config,
   error::{MigrationError, Result},
   glob::Glob,
   pipeline::{Transformation, TransformContext, TransformResult},
};

/// Retry a fallible call with exponential backoff, mirroring the
/// teacher's `retry_api_call`: the closure reports `(should_retry,
/// result)` so a well-formed-but-server-error response can be retried
/// without being treated as a hard `Err`.
pub fn retry_call<F, T>(max_retries: u32, initial_backoff_ms: u64, mut f: F) -> Result<T>
where
   F: FnMut() -> Result<(bool, Option<T>)>,
{
   let mut attempt = 0;
   loop {
      attempt += 1;
      match f() {
         Ok((false, Some(result))) => return Ok(result),
         Ok((false, None)) => return Err(MigrationError::Other("endpoint call returned no result".to_string())),
         Ok((true, _)) if attempt < max_retries => {
            let backoff_ms = initial_backoff_ms * (1 << (attempt - 1));
            crate::console::warning(&format!("retry {attempt}/{max_retries} after {backoff_ms}ms"));
            thread::sleep(Duration::from_millis(backoff_ms));
         },
         Ok((true, _)) =>
            return Err(MigrationError::TransientNetworkError {
               attempts: max_retries,
               source:   Box::new(MigrationError::Other("max retries exceeded".to_string())),
            }),
         Err(e) => {
            if attempt < max_retries {
               let backoff_ms = initial_backoff_ms * (1 << (attempt - 1));
               crate::console::warning(&format!("{e} — retry {attempt}/{max_retries} after {backoff_ms}ms"));
               thread::sleep(Duration::from_millis(backoff_ms));
               continue;
            }
            return Err(e);
         },
      }
   }
}

/// A host-checked HTTP endpoint handed to action code, scoped to
/// `Config::allowed_hosts` (`4.9`'s "bounded method set" — `get_json`/
/// `post_json` only, no arbitrary request building).
#[derive(Debug, Clone)]
pub struct Endpoint {
   base_url:            String,
   bearer_token:        Option<String>,
   allowed_hosts:       Vec<String>,
   max_retries:         u32,
   initial_backoff_ms:  u64,
   request_timeout_secs: u64,
}

impl Endpoint {
   pub fn new(base_url: impl Into<String>, bearer_token: Option<String>, config: &Config) -> Self {
      Self {
         base_url:             base_url.into(),
         bearer_token,
         allowed_hosts:        config.allowed_hosts.clone(),
         max_retries:          config.max_retries,
         initial_backoff_ms:   config.initial_backoff_ms,
         request_timeout_secs: config.request_timeout_secs,
      }
   }

   fn check_host(&self, url: &str) -> Result<()> {
      if self.allowed_hosts.is_empty() {
         return Ok(());
      }
      if self.allowed_hosts.iter().any(|h| url.contains(h.as_str())) {
         Ok(())
      } else {
         Err(MigrationError::ConfigError(format!("endpoint host not in allowed_hosts: {url}")))
      }
   }

   fn client(&self) -> Result<reqwest::blocking::Client> {
      reqwest::blocking::Client::builder()
         .timeout(Duration::from_secs(self.request_timeout_secs))
         .build()
         .map_err(MigrationError::HttpError)
   }

   pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
      let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
      self.check_host(&url)?;
      retry_call(self.max_retries, self.initial_backoff_ms, || {
         let client = self.client()?;
         let mut builder = client.get(&url);
         if let Some(token) = &self.bearer_token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
         }
         let response = builder.send().map_err(MigrationError::HttpError)?;
         let status = response.status();
         if status.is_server_error() {
            return Ok((true, None));
         }
         let text = response.text().map_err(MigrationError::HttpError)?;
         if !status.is_success() {
            return Err(MigrationError::IntegrationError(format!("endpoint GET {url} failed: {status} {text}")));
         }
         Ok((false, Some(serde_json::from_str(&text)?)))
      })
   }

   pub fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
      let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
      self.check_host(&url)?;
      retry_call(self.max_retries, self.initial_backoff_ms, || {
         let client = self.client()?;
         let mut builder = client.post(&url).header("content-type", "application/json");
         if let Some(token) = &self.bearer_token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
         }
         let response = builder.json(body).send().map_err(MigrationError::HttpError)?;
         let status = response.status();
         if status.is_server_error() {
            return Ok((true, None));
         }
         let text = response.text().map_err(MigrationError::HttpError)?;
         if !status.is_success() {
            return Err(MigrationError::IntegrationError(format!("endpoint POST {url} failed: {status} {text}")));
         }
         Ok((false, Some(serde_json::from_str(&text)?)))
      })
   }
}

/// Mutable context handed to a [`DynamicTransform`] closure: the same
/// (checkout, change) pair a built-in [`Transformation`] sees, plus a
/// read-only destination snapshot and optional origin/destination
/// endpoints.
pub struct ActionContext<'a> {
   pub checkout:            &'a mut Checkout,
   pub change:               &'a mut crate::change::Change,
   destination_snapshot:    Option<&'a Checkout>,
   origin_endpoint:         Option<Endpoint>,
   destination_endpoint:    Option<Endpoint>,
}

impl<'a> ActionContext<'a> {
   pub fn new(checkout: &'a mut Checkout, change: &'a mut crate::change::Change) -> Self {
      Self { checkout, change, destination_snapshot: None, origin_endpoint: None, destination_endpoint: None }
   }

   pub fn with_destination_snapshot(mut self, snapshot: &'a Checkout) -> Self {
      self.destination_snapshot = Some(snapshot);
      self
   }

   pub fn with_origin_endpoint(mut self, endpoint: Endpoint) -> Self {
      self.origin_endpoint = Some(endpoint);
      self
   }

   pub fn with_destination_endpoint(mut self, endpoint: Endpoint) -> Self {
      self.destination_endpoint = Some(endpoint);
      self
   }

   pub fn message(&self) -> &str {
      &self.change.message
   }

   pub fn set_message(&mut self, message: impl Into<String>) {
      self.change.message = message.into();
   }

   pub fn author(&self) -> &Author {
      &self.change.author
   }

   pub fn set_author(&mut self, author: Author) {
      self.change.author = author;
   }

   pub fn find_label(&self, name: &str) -> Option<&str> {
      self.change.label(name)
   }

   pub fn find_all_labels(&self, name: &str) -> &[String] {
      self.change.labels.get(name).map_or(&[], |v| v.as_slice())
   }

   pub fn add_label(&mut self, name: impl Into<String>, value: impl Into<String>) {
      self.change.add_label(name, value);
   }

   pub fn add_or_replace_label(&mut self, name: impl Into<String>, value: impl Into<String>) {
      self.change.add_or_replace_label(name, value);
   }

   pub fn replace_label(&mut self, name: impl Into<String>, value: impl Into<String>) {
      self.change.add_or_replace_label(name, value);
   }

   pub fn remove_label(&mut self, name: &str) {
      self.change.remove_label(name);
   }

   pub fn read_path(&self, path: &str) -> Option<&[u8]> {
      self.checkout.get(path).map(|f| f.content.as_slice())
   }

   pub fn write_path(&mut self, path: impl Into<String>, content: Vec<u8>) {
      self.checkout.insert(path, content, false);
   }

   pub fn new_path(&mut self, path: &str, content: Vec<u8>) -> Result<()> {
      if self.checkout.exists(path) {
         return Err(MigrationError::ConfigError(format!("new_path: '{path}' already exists")));
      }
      self.checkout.insert(path.to_string(), content, false);
      Ok(())
   }

   /// Synthesizes a symlink as a regular file containing the link target,
   /// matching [`Checkout`]'s `MaterializeAsFiles` representation — there
   /// is no native symlink entry type in the in-memory tree.
   pub fn create_symlink(&mut self, path: &str, target: &str) {
      self.checkout.insert(path.to_string(), target.as_bytes().to_vec(), false);
   }

   pub fn set_executable(&mut self, path: &str, executable: bool) -> Result<()> {
      let Some(file) = self.checkout.get(path) else {
         return Err(MigrationError::ConfigError(format!("set_executable: '{path}' does not exist")));
      };
      let content = file.content.clone();
      self.checkout.insert(path.to_string(), content, executable);
      Ok(())
   }

   pub fn list(&self, glob: &Glob) -> Vec<String> {
      self.checkout.paths().filter(|p| glob.matches(p)).map(str::to_string).collect()
   }

   /// Read a path from the destination's pre-migration tree (if a
   /// snapshot was supplied), e.g. to compare against the origin's
   /// transformed content before deciding what to write.
   pub fn destination_reader(&self, path: &str) -> Option<&[u8]> {
      self.destination_snapshot.and_then(|d| d.get(path)).map(|f| f.content.as_slice())
   }

   pub fn origin_api(&self) -> Option<&Endpoint> {
      self.origin_endpoint.as_ref()
   }

   pub fn destination_api(&self) -> Option<&Endpoint> {
      self.destination_endpoint.as_ref()
   }

   /// Run a nested transformation against this same (checkout, change).
   pub fn run(&mut self, transform: &dyn Transformation) -> Result<TransformResult> {
      let mut ctx = TransformContext { checkout: self.checkout, change: self.change };
      transform.apply(&mut ctx)
   }

   pub fn success(&self) -> Result<TransformResult> {
      Ok(TransformResult::Success)
   }

   pub fn noop(&self, reason: impl Into<String>) -> Result<TransformResult> {
      crate::console::status(&format!("action reported no-op: {}", reason.into()));
      Ok(TransformResult::NoOp)
   }

   pub fn error(&self, message: impl Into<String>) -> Result<TransformResult> {
      Err(MigrationError::UserActionError(message.into()))
   }
}

/// A [`Transformation`] whose body is an arbitrary closure over
/// [`ActionContext`], for workflow-specific logic the fixed
/// `[[transforms]]` vocabulary cannot express.
pub struct DynamicTransform {
   name: String,
   func: Box<dyn Fn(&mut ActionContext<'_>) -> Result<TransformResult> + Send + Sync>,
}

impl DynamicTransform {
   pub fn new(
      name: impl Into<String>,
      func: impl Fn(&mut ActionContext<'_>) -> Result<TransformResult> + Send + Sync + 'static,
   ) -> Self {
      Self { name: name.into(), func: Box::new(func) }
   }
}

impl Transformation for DynamicTransform {
   fn apply(&self, ctx: &mut TransformContext<'_>) -> Result<TransformResult> {
      let mut action_ctx = ActionContext::new(ctx.checkout, ctx.change);
      (self.func)(&mut action_ctx)
   }

   fn name(&self) -> &str {
      &self.name
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::{change::Change, revision::Revision};
   use chrono::DateTime;
   use indexmap::IndexMap;

   fn dummy_change() -> Change {
      Change {
         revision:        Revision::new("abc"),
         author:          Author::new("A", "a@example.com"),
         original_author: Author::new("A", "a@example.com"),
         timestamp:       DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap(),
         message:         "subject".to_string(),
         parents:         vec![],
         is_merge:        false,
         labels:          IndexMap::new(),
      }
   }

   #[test]
   fn dynamic_transform_can_edit_message_and_report_success() {
      let mut checkout = Checkout::new();
      let mut change = dummy_change();
      let transform = DynamicTransform::new("bump-message", |ctx| {
         ctx.set_message("replaced");
         ctx.success()
      });

      let mut ctx = TransformContext { checkout: &mut checkout, change: &mut change };
      let result = transform.apply(&mut ctx).unwrap();
      assert_eq!(result, TransformResult::Success);
      assert_eq!(change.message, "replaced");
   }

   #[test]
   fn dynamic_transform_noop_reports_noop_without_failing() {
      let mut checkout = Checkout::new();
      let mut change = dummy_change();
      let transform = DynamicTransform::new("nothing-to-do", |ctx| ctx.noop("nothing matched"));

      let mut ctx = TransformContext { checkout: &mut checkout, change: &mut change };
      assert_eq!(transform.apply(&mut ctx).unwrap(), TransformResult::NoOp);
   }

   #[test]
   fn set_executable_on_missing_path_is_config_error() {
      let mut checkout = Checkout::new();
      let mut change = dummy_change();
      let mut ctx = ActionContext::new(&mut checkout, &mut change);
      assert!(ctx.set_executable("missing.txt", true).is_err());
   }
}
