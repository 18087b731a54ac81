use thiserror::Error;

/// Every error kind named in the engine's error handling design, with its
/// propagation policy documented at the variant.
#[derive(Debug, Error)]
pub enum MigrationError {
   /// Fatal, reported to the user: malformed glob, unreachable label
   /// reference, non-reversible transformation inside a reversible
   /// pipeline, duplicate workflow names.
   #[error("config error: {0}")]
   ConfigError(String),

   /// Fatal: unknown ref, ambiguous tag, version selector returned empty
   /// with `--force` absent.
   #[error("resolution error: {0}")]
   ResolutionError(String),

   /// Fatal unless `--force`: missing required PR label, unapproved review
   /// state, destination state changed since `last_rev`.
   #[error("precondition failed: {0}")]
   PreconditionError(String),

   /// Recoverable per the enclosing group's `noop_behavior`: a
   /// transformation matched no files.
   #[error("transformation '{name}' matched no files")]
   TransformationNoOp { name: String },

   /// Fatal: the reverse-check diverged from the original checkout.
   #[error("reversibility check failed: {0}")]
   ReversibilityError(String),

   /// Fatal unless the integrate strategy ignores errors: referenced
   /// integrate change not fetchable or not mergeable.
   #[error("integration error: {0}")]
   IntegrationError(String),

   /// Retried with bounded backoff, then fatal.
   #[error("transient network error after {attempts} attempts: {source}")]
   TransientNetworkError {
      attempts: u32,
      #[source]
      source:   Box<Self>,
   },

   /// Fatal: a non-fast-forward push without an explicit opt-in.
   #[error("destination conflict: {0}")]
   DestinationConflict(String),

   /// Fatal: a user-defined action called `ctx.error(msg)` or raised.
   #[error("user action error: {0}")]
   UserActionError(String),

   #[error("io error: {0}")]
   IoError(#[from] std::io::Error),

   #[error("json error: {0}")]
   JsonError(#[from] serde_json::Error),

   #[error("toml error: {0}")]
   TomlError(#[from] toml::de::Error),

   #[error("http error: {0}")]
   HttpError(#[from] reqwest::Error),

   #[error("regex error: {0}")]
   RegexError(#[from] regex::Error),

   #[error("{0}")]
   Other(String),
}

impl MigrationError {
   /// Exit code per `spec.md` §6: 0 success, 1 user/config error, 2 no-op,
   /// 3 usage error, 4 environment/permission error, >=5 internal error.
   pub fn exit_code(&self) -> i32 {
      match self {
         Self::ConfigError(_) | Self::ResolutionError(_) | Self::PreconditionError(_) =>
            1,
         Self::TransformationNoOp { .. } => 2,
         Self::ReversibilityError(_)
         | Self::IntegrationError(_)
         | Self::DestinationConflict(_)
         | Self::UserActionError(_) => 1,
         Self::TransientNetworkError { .. } => 4,
         Self::IoError(_) => 4,
         Self::JsonError(_) | Self::TomlError(_) | Self::RegexError(_) => 1,
         Self::HttpError(_) => 4,
         Self::Other(_) => 5,
      }
   }
}

pub type Result<T> = std::result::Result<T, MigrationError>;
