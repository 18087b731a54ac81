//! Workflow configuration loading.
//!
//! A migration is declared as TOML rather than arbitrary script: one
//! `[origin]`/`[destination]` pair, file globs, and an ordered
//! `[[transforms]]` list, each tagged by a fixed `type` name drawn from
//! the transformation vocabulary in `pipeline/`. This plays the role the
//! teacher's `CommitConfig` plays for the commit-message generator —
//! a single deserializable root loaded once per run — generalized from
//! "how commit messages are generated" to "how a migration is shaped".
//! The fixed vocabulary (rather than an embedded scripting language) is
//! recorded as an Open Question resolution in `DESIGN.md`.

use std::{collections::BTreeMap, path::Path};

use serde::Deserialize;

use crate::{
   change::Author,
   config::DEFAULT_REV_ID_LABEL,
   destination::{Destination, folder::FolderDestination, gerrit::GerritDestination, git::GitBranchDestination, github::GitHubPrDestination},
   error::{MigrationError, Result},
   glob::Glob,
   origin::{Origin, folder::FolderOrigin, gerrit::GerritOrigin, git::GitBranchOrigin, github::GitHubPrOrigin},
   pipeline::{
      Pipeline, NoopBehavior, Transformation, TransformGroup,
      filter_replace::{FilterReplace, ReplaceMapper},
      metadata, path_ops, replace::Replace, verify::VerifyMatch,
   },
};

/// Which of the four migration modes in `4.6` a workflow runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
   #[default]
   Squash,
   Iterative,
   ChangeRequest,
   ChangeRequestFromSot,
}

/// A plain include/exclude pattern pair, deserialized straight from a TOML
/// array-of-strings pair and compiled to a [`Glob`] on demand.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GlobSpec {
   pub include: Vec<String>,
   pub exclude: Vec<String>,
}

impl Default for GlobSpec {
   fn default() -> Self {
      Self { include: vec!["**".to_string()], exclude: Vec::new() }
   }
}

impl GlobSpec {
   pub fn compile(&self) -> Result<Glob> {
      Glob::with_exclude(self.include.clone(), self.exclude.clone())
   }
}

fn default_separator() -> String {
   "=".to_string()
}

fn parse_author(spec: &str) -> Result<Author> {
   let (name, email) = spec
      .split_once('<')
      .map(|(n, rest)| (n.trim(), rest.trim_end_matches('>').trim()))
      .ok_or_else(|| MigrationError::ConfigError(format!("author spec '{spec}' is not 'Name <email>'")))?;
   Ok(Author::new(name, email))
}

/// One `[[transforms]]` table, tagged by `type`. The vocabulary is fixed
/// and covers every transformation under `pipeline/`; a workflow that
/// needs something outside this set composes `core.group` or reaches for
/// the action host's `DynamicTransform` instead (`src/action.rs`).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum RawTransform {
   #[serde(rename = "core.move")]
   Move {
      before:               String,
      #[serde(default)]
      after:                String,
      #[serde(default)]
      paths:                GlobSpec,
      #[serde(default)]
      overwrite:            bool,
   },
   #[serde(rename = "core.copy")]
   Copy {
      before:    String,
      #[serde(default)]
      after:     String,
      #[serde(default)]
      paths:     GlobSpec,
      #[serde(default)]
      overwrite: bool,
   },
   #[serde(rename = "core.remove")]
   Remove {
      #[serde(default)]
      paths: GlobSpec,
   },
   #[serde(rename = "core.rename")]
   Rename {
      before: String,
      after:  String,
      suffix: Option<String>,
      #[serde(default)]
      paths:  GlobSpec,
   },
   #[serde(rename = "core.replace")]
   Replace {
      before:          String,
      after:           String,
      #[serde(default)]
      regex_groups:    BTreeMap<String, String>,
      #[serde(default)]
      paths:           GlobSpec,
      #[serde(default)]
      first_only:      bool,
      #[serde(default)]
      multiline:       bool,
      #[serde(default)]
      repeated_groups: bool,
      #[serde(default)]
      ignore:          Vec<String>,
   },
   #[serde(rename = "core.filter_replace")]
   FilterReplace {
      regex:   String,
      mapping: BTreeMap<String, String>,
      group:   Option<usize>,
      #[serde(default)]
      paths:   GlobSpec,
      reverse: Option<String>,
   },
   #[serde(rename = "core.verify_match")]
   VerifyMatch {
      regex:             String,
      #[serde(default)]
      paths:             GlobSpec,
      #[serde(default)]
      verify_no_match:   bool,
      #[serde(default)]
      also_on_reversal:  bool,
      failure_message:   Option<String>,
   },
   #[serde(rename = "metadata.add_header")]
   AddHeader {
      header_template: String,
      #[serde(default)]
      ignore_labels:   bool,
   },
   #[serde(rename = "metadata.replace_message")]
   ReplaceMessage { template: String },
   #[serde(rename = "metadata.scrubber")]
   Scrubber { regex: String },
   #[serde(rename = "metadata.squash_notes")]
   SquashNotes {
      #[serde(default)]
      prefix: String,
      max:    Option<usize>,
   },
   #[serde(rename = "metadata.expose_label")]
   ExposeLabel {
      name:     String,
      new_name: Option<String>,
      #[serde(default = "default_separator")]
      separator: String,
   },
   #[serde(rename = "metadata.remove_label")]
   RemoveLabel { name: String },
   #[serde(rename = "metadata.save_author")]
   SaveAuthor {},
   #[serde(rename = "metadata.restore_author")]
   RestoreAuthor {},
   #[serde(rename = "metadata.map_author")]
   MapAuthor {
      mapping: BTreeMap<String, String>,
      #[serde(default)]
      reversible: bool,
   },
   #[serde(rename = "metadata.map_references")]
   MapReferences { regex: String, replacement: String },
   #[serde(rename = "core.group")]
   Group {
      name:     String,
      children: Vec<RawTransform>,
      #[serde(default)]
      noop_behavior: NoopBehaviorSpec,
      #[serde(default)]
      reversed: bool,
   },
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoopBehaviorSpec {
   #[default]
   NoopIfAnyNoop,
   IgnoreNoop,
   NoopIfAllNoop,
}

impl From<NoopBehaviorSpec> for NoopBehavior {
   fn from(spec: NoopBehaviorSpec) -> Self {
      match spec {
         NoopBehaviorSpec::NoopIfAnyNoop => Self::NoopIfAnyNoop,
         NoopBehaviorSpec::IgnoreNoop => Self::IgnoreNoop,
         NoopBehaviorSpec::NoopIfAllNoop => Self::NoopIfAllNoop,
      }
   }
}

impl RawTransform {
   fn build(&self, worker_threads: usize) -> Result<Box<dyn Transformation>> {
      Ok(match self {
         Self::Move { before, after, paths, overwrite } => Box::new(path_ops::Move {
            before: before.clone(),
            after: after.clone(),
            paths: paths.compile()?,
            overwrite: *overwrite,
         }),
         Self::Copy { before, after, paths, overwrite } => Box::new(path_ops::Copy {
            before: before.clone(),
            after: after.clone(),
            paths: paths.compile()?,
            overwrite: *overwrite,
         }),
         Self::Remove { paths } => Box::new(path_ops::Remove { paths: paths.compile()? }),
         Self::Rename { before, after, suffix, paths } => Box::new(path_ops::Rename {
            before: regex::Regex::new(before)?,
            after: after.clone(),
            suffix: suffix.clone(),
            paths: paths.compile()?,
         }),
         Self::Replace { before, after, regex_groups, paths, first_only, multiline, repeated_groups, ignore } => {
            let ignore = ignore.iter().map(|p| regex::Regex::new(p)).collect::<std::result::Result<Vec<_>, _>>()?;
            Box::new(Replace {
               before: before.clone(),
               after: after.clone(),
               regex_groups: regex_groups.clone(),
               paths: paths.compile()?,
               first_only: *first_only,
               multiline: *multiline,
               repeated_groups: *repeated_groups,
               ignore,
               worker_threads,
            })
         },
         Self::FilterReplace { regex, mapping, group, paths, reverse } => Box::new(FilterReplace {
            regex: regex::Regex::new(regex)?,
            mapping: ReplaceMapper::Dictionary(mapping.clone()),
            group: *group,
            paths: paths.compile()?,
            reverse: reverse.as_deref().map(regex::Regex::new).transpose()?,
         }),
         Self::VerifyMatch { regex, paths, verify_no_match, also_on_reversal, failure_message } => Box::new(VerifyMatch {
            regex: regex::Regex::new(regex)?,
            paths: paths.compile()?,
            verify_no_match: *verify_no_match,
            also_on_reversal: *also_on_reversal,
            failure_message: failure_message.clone(),
         }),
         Self::AddHeader { header_template, ignore_labels } =>
            Box::new(metadata::AddHeader { header_template: header_template.clone(), ignore_labels: *ignore_labels }),
         Self::ReplaceMessage { template } => Box::new(metadata::ReplaceMessage { template: template.clone() }),
         Self::Scrubber { regex } => Box::new(metadata::Scrubber { regex: regex::Regex::new(regex)? }),
         Self::SquashNotes { prefix, max } =>
            Box::new(metadata::SquashNotes { prefix: prefix.clone(), max: *max, change_summaries: Vec::new() }),
         Self::ExposeLabel { name, new_name, separator } =>
            Box::new(metadata::ExposeLabel { name: name.clone(), new_name: new_name.clone(), separator: separator.clone() }),
         Self::RemoveLabel { name } => Box::new(metadata::RemoveLabel { name: name.clone() }),
         Self::SaveAuthor {} => Box::new(metadata::SaveAuthor),
         Self::RestoreAuthor {} => Box::new(metadata::RestoreAuthor),
         Self::MapAuthor { mapping, reversible } => {
            let mapping = mapping
               .iter()
               .map(|(email, author_spec)| Ok((email.clone(), parse_author(author_spec)?)))
               .collect::<Result<BTreeMap<_, _>>>()?;
            Box::new(metadata::MapAuthor { mapping, reversible: *reversible })
         },
         Self::MapReferences { regex, replacement } =>
            Box::new(metadata::MapReferences { regex: regex::Regex::new(regex)?, replacement: replacement.clone() }),
         Self::Group { name, children, noop_behavior, reversed } => {
            let built = children.iter().map(|c| c.build(worker_threads)).collect::<Result<Vec<_>>>()?;
            let group = TransformGroup::new(name.clone(), built).with_noop_behavior((*noop_behavior).into());
            if *reversed { Box::new(group.reversed()) } else { Box::new(group) }
         },
      })
   }
}

/// Origin declaration: `kind` selects the concrete variant, the rest of
/// the fields are interpreted per-kind (unused fields for a given kind
/// are ignored rather than rejected, matching the teacher's permissive
/// `#[serde(default)]` config style).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OriginSpec {
   pub kind:          String,
   pub url:           String,
   pub repo:          String,
   pub host:          String,
   pub local_clone:   String,
   pub custom_rev_id: Option<String>,
   pub merge_mode:    bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DestinationSpec {
   pub kind:        String,
   pub url:         String,
   pub branch:      String,
   pub force_push:  bool,
   pub repo:        String,
   pub base_branch: String,
   pub host:        String,
}

/// Change-request eligibility knobs, mirroring
/// [`crate::origin::EligibilityPredicates`] field-for-field in TOML form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EligibilitySpec {
   pub required_labels:         Vec<String>,
   pub required_status_contexts: Vec<String>,
   pub required_check_runs:     Vec<String>,
   pub allowed_review_states:   Vec<String>,
}

/// `autopatch_config` (`4.8`): where and how to write the post-pipeline
/// diff between transformed origin content and pre-existing destination
/// content.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AutopatchSpec {
   pub directory_prefix:   String,
   pub directory:          String,
   pub suffix:             String,
   pub header:             Option<String>,
   pub strip_line_numbers: bool,
}

impl Default for AutopatchSpec {
   fn default() -> Self {
      let defaults = crate::merge::AutopatchOptions::default();
      Self {
         directory_prefix:   defaults.directory_prefix.to_string_lossy().into_owned(),
         directory:          defaults.directory,
         suffix:             defaults.suffix,
         header:             defaults.header,
         strip_line_numbers: defaults.strip_line_numbers,
      }
   }
}

impl AutopatchSpec {
   pub fn to_options(&self) -> crate::merge::AutopatchOptions {
      crate::merge::AutopatchOptions {
         directory_prefix:   std::path::PathBuf::from(&self.directory_prefix),
         directory:          self.directory.clone(),
         suffix:             self.suffix.clone(),
         header:             self.header.clone(),
         strip_line_numbers: self.strip_line_numbers,
      }
   }
}

fn default_identity_template() -> String {
   "${copybara_config_path}:${copybara_workflow_name}:${copybara_reference}".to_string()
}

/// The root of one workflow's TOML declaration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
   pub name:                     String,
   pub mode:                     Mode,
   pub origin:                   OriginSpec,
   pub destination:              DestinationSpec,
   pub origin_files:             GlobSpec,
   pub destination_files:        GlobSpec,
   #[serde(default = "default_identity_template")]
   pub change_identity_template: String,
   pub custom_rev_id:            Option<String>,
   pub reversible_check:         bool,
   pub reversible_check_ignore:  GlobSpec,
   pub transforms:                Vec<RawTransform>,
   pub eligibility:               EligibilitySpec,
   pub migrate_noop_changes:      bool,
   pub ignore_noop:               Option<bool>,
   pub noop_behavior:             Option<NoopBehaviorSpec>,
   pub use_last_change_message:   bool,
   pub use_last_change_author:    bool,
   /// `package_path` glob merge-import runs over (`4.8`). Empty means
   /// `destination_files`.
   pub merge_import:              bool,
   pub merge_import_paths:        Option<GlobSpec>,
   pub autopatch:                 Option<AutopatchSpec>,
   /// Bound on how many origin parents `CHANGE_REQUEST_FROM_SOT` walks
   /// looking for a destination-labeled baseline (`4.6`).
   #[serde(default = "default_change_request_from_sot_limit")]
   pub change_request_from_sot_limit: usize,
}

fn default_change_request_from_sot_limit() -> usize {
   100
}

impl Default for WorkflowConfig {
   fn default() -> Self {
      Self {
         name:                     "default".to_string(),
         mode:                     Mode::default(),
         origin:                   OriginSpec::default(),
         destination:              DestinationSpec::default(),
         origin_files:             GlobSpec::default(),
         destination_files:        GlobSpec::default(),
         change_identity_template: default_identity_template(),
         custom_rev_id:            None,
         reversible_check:         false,
         reversible_check_ignore:  GlobSpec { include: Vec::new(), exclude: Vec::new() },
         transforms:                Vec::new(),
         eligibility:               EligibilitySpec::default(),
         migrate_noop_changes:      false,
         ignore_noop:               None,
         noop_behavior:             None,
         use_last_change_message:   false,
         use_last_change_author:    false,
         merge_import:              false,
         merge_import_paths:        None,
         autopatch:                 None,
         change_request_from_sot_limit: default_change_request_from_sot_limit(),
      }
   }
}

impl WorkflowConfig {
   /// Load a workflow declaration from a TOML file.
   pub fn load(path: &Path) -> Result<Self> {
      let contents = std::fs::read_to_string(path)
         .map_err(|e| MigrationError::ConfigError(format!("failed to read workflow config {}: {e}", path.display())))?;
      Self::from_str(&contents)
   }

   pub fn from_str(contents: &str) -> Result<Self> {
      toml::from_str(contents).map_err(|e| MigrationError::ConfigError(format!("failed to parse workflow config: {e}")))
   }

   /// Effective group-level no-op policy for the whole pipeline,
   /// resolving the deprecated `ignore_noop` alias per the Open Question
   /// recorded in `DESIGN.md`.
   pub fn effective_noop_behavior(&self) -> NoopBehavior {
      if let Some(explicit) = self.noop_behavior {
         return explicit.into();
      }
      match self.ignore_noop {
         Some(true) => NoopBehavior::IgnoreNoop,
         _ => NoopBehavior::NoopIfAnyNoop,
      }
   }

   pub fn origin_glob(&self) -> Result<Glob> {
      self.origin_files.compile()
   }

   pub fn destination_glob(&self) -> Result<Glob> {
      self.destination_files.compile()
   }

   /// Merge-import's `package_path` glob, defaulting to the same scope as
   /// `destination_files` when left unset.
   pub fn merge_import_glob(&self) -> Result<Glob> {
      match &self.merge_import_paths {
         Some(spec) => spec.compile(),
         None => self.destination_glob(),
      }
   }

   /// Resolve the revision-id label name this workflow uses for cursor
   /// discovery, honoring a workflow-level override over the origin's own
   /// default.
   pub fn rev_id_label(&self) -> &str {
      self.custom_rev_id.as_deref().unwrap_or(DEFAULT_REV_ID_LABEL)
   }

   pub fn build_origin(&self) -> Result<Origin> {
      Ok(match self.origin.kind.as_str() {
         "git" | "git_branch" => Origin::GitBranch(GitBranchOrigin {
            url_or_path:   self.origin.url.clone(),
            custom_rev_id: self.origin.custom_rev_id.clone().or_else(|| self.custom_rev_id.clone()),
         }),
         "github_pr" | "github" => {
            let mut origin = GitHubPrOrigin::new(self.origin.repo.clone(), self.origin.local_clone.clone());
            origin.merge_mode = self.origin.merge_mode;
            Origin::GitHubPr(origin)
         },
         "gerrit" => Origin::Gerrit(GerritOrigin::new(self.origin.host.clone(), self.origin.local_clone.clone())),
         "folder" => Origin::Folder(FolderOrigin::new(self.origin.url.clone())),
         "hg" | "mercurial" => Origin::Hg,
         other => {
            return Err(MigrationError::ConfigError(format!("unknown origin kind '{other}'")));
         },
      })
   }

   pub fn build_destination(&self) -> Result<Destination> {
      Ok(match self.destination.kind.as_str() {
         "git" | "git_branch" => {
            let mut dest = GitBranchDestination::new(self.destination.url.clone(), self.destination.branch.clone());
            dest.force_push = self.destination.force_push;
            Destination::GitBranch(dest)
         },
         "github_pr" | "github" =>
            Destination::GitHubPr(GitHubPrDestination::new(
               self.destination.repo.clone(),
               self.destination.base_branch.clone(),
               self.destination.url.clone(),
            )),
         "gerrit" =>
            Destination::Gerrit(GerritDestination::new(
               self.destination.host.clone(),
               self.destination.branch.clone(),
               self.destination.url.clone(),
            )),
         "folder" => Destination::Folder(FolderDestination::new(self.destination.url.clone())),
         other => {
            return Err(MigrationError::ConfigError(format!("unknown destination kind '{other}'")));
         },
      })
   }

   /// Build a fresh pipeline from the declared `[[transforms]]` list.
   /// `squash_summaries` supplies the accumulated per-commit summary lines
   /// for `metadata.squash_notes` when running in SQUASH mode; `last`
   /// supplies the final origin commit's message/author for
   /// `use_last_change_message`/`use_last_change_author`.
   pub fn build_pipeline(
      &self,
      worker_threads: usize,
      squash_summaries: &[String],
      last: Option<(&str, &Author)>,
   ) -> Result<Pipeline> {
      let mut transformations = Vec::with_capacity(self.transforms.len() + 1);
      for raw in &self.transforms {
         let built = if let RawTransform::SquashNotes { prefix, max } = raw {
            Box::new(metadata::SquashNotes { prefix: prefix.clone(), max: *max, change_summaries: squash_summaries.to_vec() })
               as Box<dyn Transformation>
         } else {
            raw.build(worker_threads)?
         };
         transformations.push(built);
      }

      if self.use_last_change_message || self.use_last_change_author {
         let (message, author) = last.ok_or_else(|| {
            MigrationError::ConfigError("use_last_change_* requires a last origin change (SQUASH mode only)".to_string())
         })?;
         transformations.push(Box::new(metadata::UseLastChange {
            use_message: self.use_last_change_message,
            use_author:  self.use_last_change_author,
            last_message: message.to_string(),
            last_author:  author.clone(),
         }));
      }

      Ok(Pipeline {
         transformations,
         reversible_check: self.reversible_check,
         reversible_check_ignore: self.reversible_check_ignore.compile()?,
      })
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn loads_minimal_git_to_git_workflow() {
      let toml = r#"
         name = "default"
         mode = "squash"

         [origin]
         kind = "git"
         url = "/tmp/origin"

         [destination]
         kind = "git"
         url = "/tmp/dest"
         branch = "main"

         [[transforms]]
         type = "core.move"
         before = "src"
         after = ""
      "#;
      let config = WorkflowConfig::from_str(toml).unwrap();
      assert_eq!(config.name, "default");
      assert_eq!(config.mode, Mode::Squash);
      assert_eq!(config.transforms.len(), 1);
      assert!(config.build_origin().is_ok());
      assert!(config.build_destination().is_ok());
   }

   #[test]
   fn unknown_origin_kind_is_config_error() {
      let toml = r#"
         [origin]
         kind = "svn"
         [destination]
         kind = "git"
      "#;
      let config = WorkflowConfig::from_str(toml).unwrap();
      assert!(config.build_origin().is_err());
   }

   #[test]
   fn effective_noop_behavior_prefers_explicit_field_over_deprecated_alias() {
      let mut config = WorkflowConfig::default();
      config.ignore_noop = Some(true);
      config.noop_behavior = Some(NoopBehaviorSpec::NoopIfAllNoop);
      assert_eq!(config.effective_noop_behavior(), NoopBehavior::NoopIfAllNoop);
   }

   #[test]
   fn deprecated_ignore_noop_alias_maps_when_noop_behavior_absent() {
      let mut config = WorkflowConfig::default();
      config.ignore_noop = Some(true);
      assert_eq!(config.effective_noop_behavior(), NoopBehavior::IgnoreNoop);
   }

   #[test]
   fn pipeline_builds_group_transform_recursively() {
      let toml = r#"
         [origin]
         kind = "folder"
         url = "/tmp/in"
         [destination]
         kind = "folder"
         url = "/tmp/out"

         [[transforms]]
         type = "core.group"
         name = "cleanup"
         noop_behavior = "ignore_noop"

         [[transforms.children]]
         type = "core.remove"
         paths = { include = ["**/*.tmp"] }
      "#;
      let config = WorkflowConfig::from_str(toml).unwrap();
      let pipeline = config.build_pipeline(1, &[], None).unwrap();
      assert_eq!(pipeline.transformations.len(), 1);
   }
}
