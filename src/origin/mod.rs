//! Origin reader (C2).
//!
//! The read side of a migration: resolves a revision, enumerates and
//! fetches changes, materializes a checkout, and exposes per-change
//! metadata. Concrete origins are a tagged union (per the REDESIGN FLAGS
//! guidance against runtime plug-in loading) implementing one shared
//! capability trait.

pub mod folder;
pub mod gerrit;
pub mod git;
pub mod github;

use crate::{
   change::Change,
   checkout::{Checkout, SymlinkPolicy},
   error::Result,
   glob::Glob,
   revision::Revision,
};

/// How deeply submodules are fetched during checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmoduleStrategy {
   #[default]
   No,
   Yes,
   Recursive,
}

/// Predicates a change-request origin enforces before a PR/change is
/// eligible to migrate (`4.2`), all bypassable with `--force`.
#[derive(Debug, Clone, Default)]
pub struct EligibilityPredicates {
   pub required_labels:        Vec<String>,
   pub required_status_contexts: Vec<String>,
   pub required_check_runs:    Vec<String>,
   pub allowed_review_states:  Vec<String>,
}

/// The baseline an origin supplies for CHANGE_REQUEST mode: the
/// divergence point between PR head and PR base (or the base tip, in
/// merge-mode).
#[derive(Debug, Clone)]
pub struct Baseline {
   pub revision: Revision,
   pub is_merge_mode: bool,
}

/// Labels produced by an optional `describe_version` call (`4.2`).
#[derive(Debug, Clone, Default)]
pub struct VersionLabels {
   pub change_version:     Option<String>,
   pub requested_version:  Option<String>,
   pub first_parent:       Option<String>,
   pub sequential_number:  Option<String>,
}

/// Shared capability trait every origin variant implements. Methods map
/// 1:1 onto the contract in `4.1`/`4.2`.
pub trait OriginReader {
   /// Resolve a user-supplied reference string to a concrete revision,
   /// with origin-specific labels populated (e.g. `GITHUB_PR_TITLE`).
   fn resolve(&self, user_ref: &str) -> Result<Revision>;

   /// Enumerate changes in commit order (oldest first) in `(last_rev,
   /// head]`. When `last_rev` is `None`, a first-parent-only traversal
   /// from `head` is used unless the origin is configured otherwise.
   fn changes(&self, last_rev: Option<&Revision>, head: &Revision) -> Result<Vec<Change>>;

   /// Materialize `revision`'s tree into `workdir`, restricted to `files`.
   fn checkout(
      &self,
      revision: &Revision,
      workdir: &std::path::Path,
      files: &Glob,
      submodules: SubmoduleStrategy,
      symlinks: SymlinkPolicy,
   ) -> Result<Checkout>;

   /// Optional version-description labels; origins without a notion of
   /// "describe" return `Ok(VersionLabels::default())`.
   fn describe_version(&self, _revision: &Revision) -> Result<VersionLabels> {
      Ok(VersionLabels::default())
   }

   /// Change-request origins override this to report unmet predicates;
   /// plain branch/folder origins are always eligible.
   fn check_eligibility(
      &self,
      _revision: &Revision,
      _predicates: &EligibilityPredicates,
   ) -> Result<Vec<String>> {
      Ok(Vec::new())
   }

   /// CHANGE_REQUEST baseline; only meaningful for change-request origins.
   fn baseline(&self, _revision: &Revision) -> Result<Option<Baseline>> {
      Ok(None)
   }

   /// Default revision-id label name this origin expects destinations to
   /// scan for, absent a `custom_rev_id` override.
   fn default_rev_id_label(&self) -> &str {
      crate::config::DEFAULT_REV_ID_LABEL
   }
}

/// Tagged union over the concrete origin kinds this engine ships. Adding
/// a new origin means adding a variant here and an `OriginReader` impl —
/// never a runtime-loaded plug-in.
pub enum Origin {
   GitBranch(git::GitBranchOrigin),
   GitHubPr(github::GitHubPrOrigin),
   Gerrit(gerrit::GerritOrigin),
   Folder(folder::FolderOrigin),
   /// Mercurial client integration is an external collaborator out of
   /// scope for this engine (`spec.md` §1). The variant is enumerated
   /// rather than omitted so the tagged union stays exhaustive; every
   /// method fails with a `ConfigError` explaining the build doesn't
   /// carry a Mercurial client.
   Hg,
}

impl OriginReader for Origin {
   fn resolve(&self, user_ref: &str) -> Result<Revision> {
      match self {
         Self::GitBranch(o) => o.resolve(user_ref),
         Self::GitHubPr(o) => o.resolve(user_ref),
         Self::Gerrit(o) => o.resolve(user_ref),
         Self::Folder(o) => o.resolve(user_ref),
         Self::Hg => Err(hg_unavailable()),
      }
   }

   fn changes(&self, last_rev: Option<&Revision>, head: &Revision) -> Result<Vec<Change>> {
      match self {
         Self::GitBranch(o) => o.changes(last_rev, head),
         Self::GitHubPr(o) => o.changes(last_rev, head),
         Self::Gerrit(o) => o.changes(last_rev, head),
         Self::Folder(o) => o.changes(last_rev, head),
         Self::Hg => Err(hg_unavailable()),
      }
   }

   fn checkout(
      &self,
      revision: &Revision,
      workdir: &std::path::Path,
      files: &Glob,
      submodules: SubmoduleStrategy,
      symlinks: SymlinkPolicy,
   ) -> Result<Checkout> {
      match self {
         Self::GitBranch(o) => o.checkout(revision, workdir, files, submodules, symlinks),
         Self::GitHubPr(o) => o.checkout(revision, workdir, files, submodules, symlinks),
         Self::Gerrit(o) => o.checkout(revision, workdir, files, submodules, symlinks),
         Self::Folder(o) => o.checkout(revision, workdir, files, submodules, symlinks),
         Self::Hg => Err(hg_unavailable()),
      }
   }

   fn describe_version(&self, revision: &Revision) -> Result<VersionLabels> {
      match self {
         Self::GitBranch(o) => o.describe_version(revision),
         Self::GitHubPr(o) => o.describe_version(revision),
         Self::Gerrit(o) => o.describe_version(revision),
         Self::Folder(o) => o.describe_version(revision),
         Self::Hg => Err(hg_unavailable()),
      }
   }

   fn check_eligibility(
      &self,
      revision: &Revision,
      predicates: &EligibilityPredicates,
   ) -> Result<Vec<String>> {
      match self {
         Self::GitBranch(o) => o.check_eligibility(revision, predicates),
         Self::GitHubPr(o) => o.check_eligibility(revision, predicates),
         Self::Gerrit(o) => o.check_eligibility(revision, predicates),
         Self::Folder(o) => o.check_eligibility(revision, predicates),
         Self::Hg => Err(hg_unavailable()),
      }
   }

   fn baseline(&self, revision: &Revision) -> Result<Option<Baseline>> {
      match self {
         Self::GitBranch(o) => o.baseline(revision),
         Self::GitHubPr(o) => o.baseline(revision),
         Self::Gerrit(o) => o.baseline(revision),
         Self::Folder(o) => o.baseline(revision),
         Self::Hg => Err(hg_unavailable()),
      }
   }

   fn default_rev_id_label(&self) -> &str {
      match self {
         Self::GitBranch(o) => o.default_rev_id_label(),
         Self::GitHubPr(o) => o.default_rev_id_label(),
         Self::Gerrit(o) => o.default_rev_id_label(),
         Self::Folder(o) => o.default_rev_id_label(),
         Self::Hg => crate::config::DEFAULT_REV_ID_LABEL,
      }
   }
}

fn hg_unavailable() -> crate::error::MigrationError {
   crate::error::MigrationError::ConfigError(
      "mercurial origin not available in this build".to_string(),
   )
}
