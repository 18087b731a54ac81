use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{MigrationError, Result};

/// Ambient engine configuration: timeouts, retries, worker pool sizing,
/// and on-disk layout. This is distinct from a migration's own
/// `WorkflowConfig` (see `workflow_config.rs`), which describes *what* to
/// migrate rather than *how hard* the engine should work at it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
   /// Root directory for `<run_id>/workdir`, `<run_id>/scratch/git/<h>`, and
   /// console logs. Defaults to `~/copybara/out`.
   pub output_root: Option<PathBuf>,

   /// Network request timeout in seconds (HTTP endpoints, fetches).
   pub request_timeout_secs: u64,

   /// Connection timeout in seconds.
   pub connect_timeout_secs: u64,

   /// Per-repository timeout bounding exponential-backoff retries of
   /// transient fetch/network errors.
   pub repo_timeout_secs: u64,

   /// Maximum retry attempts for transient network errors.
   pub max_retries: u32,

   /// Initial backoff before the first retry.
   pub initial_backoff_ms: u64,

   /// Per-action timeout bounding user-defined transformation/action
   /// runtime (`--commands-timeout`).
   pub commands_timeout_secs: u64,

   /// Thread count for the worker pool used by per-file parallel
   /// transformations. `0` means "use available parallelism".
   pub worker_threads: usize,

   /// Keep the output_root contents after the process exits
   /// (`--nocleanup`).
   #[serde(default)]
   pub nocleanup: bool,

   /// `GIT_TERMINAL_PROMPT` is forced to `0` for spawned git subprocesses
   /// unless this is set.
   #[serde(default)]
   pub allow_git_prompt: bool,

   /// Host allow-list consulted by the action host before any endpoint
   /// HTTP call is permitted.
   #[serde(default)]
   pub allowed_hosts: Vec<String>,
}

impl Default for Config {
   fn default() -> Self {
      Self {
         output_root:          None,
         request_timeout_secs: 120,
         connect_timeout_secs: 30,
         repo_timeout_secs:    600,
         max_retries:          3,
         initial_backoff_ms:   1000,
         commands_timeout_secs: 300,
         worker_threads:       0,
         nocleanup:            false,
         allow_git_prompt:     false,
         allowed_hosts:        Vec::new(),
      }
   }
}

impl Config {
   /// Load config from `COPYBARA_CONFIG` env var path, or
   /// `~/.config/copyhaul/config.toml`, falling back to `Default` if
   /// neither exists. Environment variables override file values:
   /// - `COPYBARA_OUTPUT_ROOT` overrides `output_root`
   /// - `COPYBARA_WORKER_THREADS` overrides `worker_threads`
   pub fn load() -> Result<Self> {
      let config_path = if let Ok(custom_path) = std::env::var("COPYBARA_CONFIG") {
         PathBuf::from(custom_path)
      } else {
         Self::default_config_path().unwrap_or_default()
      };

      let mut config = if config_path.exists() {
         Self::from_file(&config_path)?
      } else {
         Self::default()
      };

      Self::apply_env_overrides(&mut config);
      Ok(config)
   }

   /// Load config from a specific file.
   pub fn from_file(path: &Path) -> Result<Self> {
      let contents = std::fs::read_to_string(path)
         .map_err(|e| MigrationError::ConfigError(format!("failed to read config: {e}")))?;
      let mut config: Self = toml::from_str(&contents)
         .map_err(|e| MigrationError::ConfigError(format!("failed to parse config: {e}")))?;

      Self::apply_env_overrides(&mut config);
      Ok(config)
   }

   fn apply_env_overrides(config: &mut Self) {
      if let Ok(root) = std::env::var("COPYBARA_OUTPUT_ROOT") {
         config.output_root = Some(PathBuf::from(root));
      }
      if let Ok(threads) = std::env::var("COPYBARA_WORKER_THREADS")
         && let Ok(n) = threads.parse()
      {
         config.worker_threads = n;
      }
   }

   /// Resolve the effective output root, defaulting to `~/copybara/out`.
   pub fn resolve_output_root(&self) -> Result<PathBuf> {
      if let Some(root) = &self.output_root {
         return Ok(root.clone());
      }
      let home = std::env::var("HOME")
         .or_else(|_| std::env::var("USERPROFILE"))
         .map_err(|_| {
            MigrationError::ConfigError(
               "no home directory found (tried HOME and USERPROFILE)".to_string(),
            )
         })?;
      Ok(PathBuf::from(home).join("copybara").join("out"))
   }

   /// Get default config path (platform-safe).
   pub fn default_config_path() -> Result<PathBuf> {
      if let Ok(home) = std::env::var("HOME") {
         return Ok(PathBuf::from(home).join(".config/copyhaul/config.toml"));
      }
      if let Ok(home) = std::env::var("USERPROFILE") {
         return Ok(PathBuf::from(home).join(".config/copyhaul/config.toml"));
      }
      Err(MigrationError::ConfigError(
         "no home directory found (tried HOME and USERPROFILE)".to_string(),
      ))
   }
}

/// Default label name scanned in destination commit messages to discover
/// `last_rev` for Git origins. Overridable per-workflow via `custom_rev_id`.
pub const DEFAULT_REV_ID_LABEL: &str = "GitOrigin-RevId";

/// Label synthesizing a merge parent / included-files reference
/// (`COPYBARA_INTEGRATE_REVIEW`).
pub const INTEGRATE_REVIEW_LABEL: &str = "COPYBARA_INTEGRATE_REVIEW";
