//! Workflow runner (C6).
//!
//! The top-level state machine: resolve the requested origin revision,
//! discover the resumption cursor, plan one or more change groups per the
//! declared [`crate::workflow_config::Mode`], and drive each group through
//! checkout → merge-import → transformation pipeline → destination write
//! → effect recording, per the state diagram in `spec.md` §4.6.

use std::{
   path::{Path, PathBuf},
   sync::{
      Arc,
      atomic::{AtomicBool, AtomicU64, Ordering},
   },
};

use indexmap::IndexMap;

use crate::{
   change::{Author, Change},
   checkout::{Checkout, SymlinkPolicy},
   config::Config,
   destination::{Destination, DestinationWriter, WriteMetadata, WriteResult, WriteStatus},
   effect::{EffectRecorder, MigrationEffect},
   error::{MigrationError, Result},
   glob::Glob,
   identity::{self, IdentityContext},
   origin::{EligibilityPredicates, Origin, OriginReader, SubmoduleStrategy},
   pipeline::{NoopBehavior, Pipeline, TransformGroup},
   revision::Revision,
   workflow_config::{AutopatchSpec, Mode, WorkflowConfig},
};

/// CLI-level knobs that bend runner behavior without changing the
/// workflow's own declaration (`spec.md` §6).
#[derive(Clone)]
pub struct RunFlags {
   pub last_rev_override: Option<String>,
   pub force:             bool,
   pub init_history:      bool,
   pub dry_run:           bool,
   pub iterative_limit_changes: Option<usize>,
   pub ignore_noop:       bool,
   pub disable_reversible_check: bool,
   /// `--labels k:v,…`, exposed to `${label:FLAG_K}` as `FLAG_K=V`.
   pub labels:            std::collections::BTreeMap<String, String>,
   pub skip_transforms:   Vec<String>,
   pub invoking_user:     String,
   pub nocleanup:         bool,
   pub cancel:            Arc<AtomicBool>,
}

impl Default for RunFlags {
   fn default() -> Self {
      Self {
         last_rev_override: None,
         force:             false,
         init_history:      false,
         dry_run:           false,
         iterative_limit_changes: None,
         ignore_noop:       false,
         disable_reversible_check: false,
         labels:            std::collections::BTreeMap::new(),
         skip_transforms:   Vec::new(),
         invoking_user:     whoami(),
         nocleanup:         false,
         cancel:            Arc::new(AtomicBool::new(false)),
      }
   }
}

fn whoami() -> String {
   std::env::var("USER").or_else(|_| std::env::var("USERNAME")).unwrap_or_else(|_| "unknown".to_string())
}

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Drives one migration invocation for a single [`WorkflowConfig`].
pub struct WorkflowRunner<'a> {
   workflow:      &'a WorkflowConfig,
   config_path:   String,
   engine_config: &'a Config,
}

impl<'a> WorkflowRunner<'a> {
   pub fn new(workflow: &'a WorkflowConfig, config_path: impl Into<String>, engine_config: &'a Config) -> Self {
      Self { workflow, config_path: config_path.into(), engine_config }
   }

   /// Run the migration to completion. On success, returns the
   /// append-only effect list (`4.10`); on failure, a final `ERROR`
   /// effect has already been appended before the error is returned.
   pub fn run(&self, source_ref: Option<&str>, flags: &RunFlags) -> Result<EffectRecorder> {
      let mut recorder = EffectRecorder::new();

      if flags.cancel.load(Ordering::Relaxed) {
         return Err(MigrationError::Other("migration cancelled before start".to_string()));
      }

      let origin = self.workflow.build_origin()?;
      let destination = self.workflow.build_destination()?;
      let origin_glob = self.workflow.origin_glob()?;

      let reference = source_ref.unwrap_or("HEAD");
      let head = origin.resolve(reference)?;
      crate::console::status(&format!("resolved '{reference}' to {}", head.id()));

      let last_rev = self.discover_last_rev(&destination, flags)?;

      let outcome = match self.workflow.mode {
         Mode::Squash =>
            self.run_squash(&origin, &destination, &origin_glob, &head, last_rev.as_ref(), flags, &mut recorder),
         Mode::Iterative =>
            self.run_iterative(&origin, &destination, &origin_glob, &head, last_rev.as_ref(), flags, &mut recorder),
         Mode::ChangeRequest =>
            self.run_change_request(&origin, &destination, &origin_glob, &head, false, flags, &mut recorder),
         Mode::ChangeRequestFromSot =>
            self.run_change_request(&origin, &destination, &origin_glob, &head, true, flags, &mut recorder),
      };

      if let Err(e) = outcome {
         recorder.record(MigrationEffect::error(vec![head.id().to_string()], "migration failed", vec![e.to_string()]));
         return Err(e);
      }

      Ok(recorder)
   }

   /// `last_rev` discovery (`4.7`): an explicit `--last-rev` or
   /// `--init-history` short-circuits destination scanning entirely.
   /// `ITERATIVE`/`CHANGE_REQUEST_FROM_SOT` genuinely need a cursor to
   /// resume from; absent one, they fail unless `--force` is given.
   /// `SQUASH`/`CHANGE_REQUEST` tolerate a missing cursor (first import,
   /// or a PR whose baseline the origin itself supplies).
   fn discover_last_rev(&self, destination: &Destination, flags: &RunFlags) -> Result<Option<Revision>> {
      if let Some(explicit) = &flags.last_rev_override {
         return Ok(Some(Revision::new(explicit.clone())));
      }
      if flags.init_history {
         return Ok(None);
      }

      let label = self.workflow.rev_id_label();
      let found = destination.previous_ref(label)?;

      if found.is_none() && matches!(self.workflow.mode, Mode::Iterative | Mode::ChangeRequestFromSot) && !flags.force {
         return Err(MigrationError::PreconditionError(format!(
            "no previous migration found for workflow '{}' scanning label '{label}'; pass --force or --init-history",
            self.workflow.name
         )));
      }
      Ok(found)
   }

   fn check_eligibility(&self, origin: &Origin, revision: &Revision, flags: &RunFlags) -> Result<()> {
      let predicates = EligibilityPredicates {
         required_labels:           self.workflow.eligibility.required_labels.clone(),
         required_status_contexts:  self.workflow.eligibility.required_status_contexts.clone(),
         required_check_runs:       self.workflow.eligibility.required_check_runs.clone(),
         allowed_review_states:     self.workflow.eligibility.allowed_review_states.clone(),
      };
      let unmet = origin.check_eligibility(revision, &predicates)?;
      if !unmet.is_empty() && !flags.force {
         return Err(MigrationError::PreconditionError(format!(
            "change is not eligible to migrate: {}",
            unmet.join("; ")
         )));
      }
      Ok(())
   }

   fn fresh_workdir(&self) -> Result<PathBuf> {
      let run_id = format!("{}-{}", std::process::id(), RUN_COUNTER.fetch_add(1, Ordering::Relaxed));
      let workdir = self.engine_config.resolve_output_root()?.join(run_id).join("workdir");
      std::fs::create_dir_all(&workdir)?;
      Ok(workdir)
   }

   fn cleanup_workdir(&self, workdir: &Path, flags: &RunFlags) {
      if flags.nocleanup || self.engine_config.nocleanup {
         return;
      }
      if let Some(root) = workdir.parent() {
         let _ = std::fs::remove_dir_all(root);
      }
   }

   /// Wrap the declared `[[transforms]]` list in one [`TransformGroup`] so
   /// `noop_behavior`/`--ignore-noop` govern the whole pipeline (a bare
   /// top-level no-op transformation would otherwise propagate as a hard
   /// `TransformationNoOp` error), apply `--skip-transforms`, and honor
   /// `--disable-reversible-check`.
   fn finalize_pipeline(&self, mut pipeline: Pipeline, flags: &RunFlags) -> Pipeline {
      if flags.disable_reversible_check {
         pipeline.reversible_check = false;
      }
      if !flags.skip_transforms.is_empty() {
         pipeline.transformations.retain(|t| !flags.skip_transforms.iter().any(|s| s == t.name()));
      }
      let behavior =
         if flags.ignore_noop { NoopBehavior::IgnoreNoop } else { self.workflow.effective_noop_behavior() };
      let grouped = TransformGroup::new("pipeline", std::mem::take(&mut pipeline.transformations))
         .with_noop_behavior(behavior);
      pipeline.transformations = vec![Box::new(grouped)];
      pipeline
   }

   fn run_pipeline(&self, raw: Pipeline, checkout: &mut Checkout, change: &mut Change, flags: &RunFlags) -> Result<()> {
      self.finalize_pipeline(raw, flags).run(checkout, change)
   }

   /// Merge-import (`4.8`): reconciles destination-only divergence into
   /// the freshly checked-out-and-about-to-be-transformed origin tree.
   /// `baseline` is the prior origin revision — `None` for a first import,
   /// in which case [`crate::merge::merge_import`] is itself a no-op.
   fn apply_merge_import(
      &self,
      origin: &Origin,
      destination: &Destination,
      checkout: &mut Checkout,
      baseline_revision: Option<&Revision>,
      origin_glob: &Glob,
      workdir: &Path,
      label: &str,
   ) -> Result<()> {
      let merge_glob = self.workflow.merge_import_glob()?;
      let mut dest_snapshot = Checkout::new();
      destination.copy_files(&merge_glob, &mut dest_snapshot)?;

      let baseline_checkout = baseline_revision
         .map(|rev| {
            origin.checkout(
               rev,
               &workdir.join(format!("baseline-{label}")),
               origin_glob,
               SubmoduleStrategy::default(),
               SymlinkPolicy::default(),
            )
         })
         .transpose()?;

      if self.workflow.merge_import {
         let report = crate::merge::merge_import(checkout, baseline_checkout.as_ref(), &dest_snapshot)?;
         for warning in &report.warnings {
            crate::console::warning(warning);
         }
      }

      if let Some(spec) = &self.workflow.autopatch {
         self.apply_autopatch(checkout, &dest_snapshot, spec)?;
      }

      Ok(())
   }

   /// Writes autopatch output to a scratch directory via
   /// [`crate::merge::write_autopatches`], then stages the produced patch
   /// files back into `checkout` so they land in the destination alongside
   /// the code (`4.8`: "these patches are written into the staged tree").
   fn apply_autopatch(&self, checkout: &mut Checkout, destination_snapshot: &Checkout, spec: &AutopatchSpec) -> Result<()> {
      let scratch =
         std::env::temp_dir().join(format!("copyhaul-autopatch-{}-{}", std::process::id(), RUN_COUNTER.fetch_add(1, Ordering::Relaxed)));
      let opts = crate::merge::AutopatchOptions { directory_prefix: scratch.clone(), ..spec.to_options() };
      let written = crate::merge::write_autopatches(checkout, destination_snapshot, &opts)?;

      for path in &written {
         let relative = path.strip_prefix(&scratch).unwrap_or(path);
         let rel_str = relative.to_string_lossy().replace('\\', "/");
         let content = std::fs::read(path)?;
         checkout.insert(rel_str, content, false);
      }
      let _ = std::fs::remove_dir_all(&scratch);
      Ok(())
   }

   fn compute_identity(&self, reference: &Revision, change: &Change, flags: &RunFlags) -> String {
      let mut extra_labels: Vec<(String, String)> = Vec::new();
      for (name, values) in reference.labels() {
         if let Some(v) = values.first() {
            extra_labels.push((name.clone(), v.clone()));
         }
      }
      for (name, values) in change.all_labels() {
         if let Some(v) = values.first() {
            extra_labels.push((name.clone(), v.clone()));
         }
      }
      for (key, value) in &flags.labels {
         extra_labels.push((format!("FLAG_{key}"), value.clone()));
      }

      let ctx = IdentityContext {
         config_path:   &self.config_path,
         workflow_name: &self.workflow.name,
         reference:     reference.id(),
         extra_labels:  &extra_labels,
         invoking_user: &flags.invoking_user,
      };
      let rendered = identity::render_identity_template(&self.workflow.change_identity_template, &ctx);
      identity::compute_identity(&rendered, &ctx)
   }

   fn write_change(
      &self,
      destination: &Destination,
      checkout: &Checkout,
      change: &Change,
      identity: &str,
      parent_ref: Option<&Revision>,
      flags: &RunFlags,
   ) -> Result<WriteResult> {
      if flags.dry_run {
         crate::console::status("--dry-run: skipping destination write");
         return Ok(WriteResult { status: WriteStatus::NoOp, destination_ref: None });
      }

      let message = change.render_message();
      let metadata = WriteMetadata {
         message: &message,
         author: &change.author,
         identity,
         parent_ref,
         allow_empty_diff: false,
      };
      destination.write(checkout, &metadata)
   }

   // ---- SQUASH -----------------------------------------------------

   fn run_squash(
      &self,
      origin: &Origin,
      destination: &Destination,
      origin_glob: &Glob,
      head: &Revision,
      last_rev: Option<&Revision>,
      flags: &RunFlags,
      recorder: &mut EffectRecorder,
   ) -> Result<()> {
      let changes = origin.changes(last_rev, head)?;
      if changes.is_empty() && !self.workflow.migrate_noop_changes {
         recorder.record(MigrationEffect::from_write(
            vec![head.id().to_string()],
            WriteStatus::NoOp,
            None,
            "nothing to migrate",
         ));
         return Ok(());
      }

      let workdir = self.fresh_workdir()?;
      let mut checkout =
         origin.checkout(head, &workdir.join("head"), origin_glob, SubmoduleStrategy::default(), SymlinkPolicy::default())?;

      if self.workflow.merge_import || self.workflow.autopatch.is_some() {
         self.apply_merge_import(origin, destination, &mut checkout, last_rev, origin_glob, &workdir, "squash")?;
      }

      let mut change = squash_change(head, &changes);
      let summaries: Vec<String> = changes.iter().map(summarize_change).collect();
      let last_meta = changes.last().map(|c| (c.message.as_str(), &c.author));
      let pipeline = self.workflow.build_pipeline(self.engine_config.worker_threads, &summaries, last_meta)?;
      self.run_pipeline(pipeline, &mut checkout, &mut change, flags)?;

      change.add_or_replace_label(self.workflow.rev_id_label(), head.id());
      let identity = self.compute_identity(head, &change, flags);

      let result = self.write_change(destination, &checkout, &change, &identity, None, flags)?;
      recorder.record(MigrationEffect::from_write(
         vec![head.id().to_string()],
         result.status.clone(),
         result.destination_ref.as_ref(),
         format!("squashed {} change(s) up to {}", changes.len(), head.id()),
      ));

      self.cleanup_workdir(&workdir, flags);
      Ok(())
   }

   // ---- ITERATIVE ----------------------------------------------------

   fn run_iterative(
      &self,
      origin: &Origin,
      destination: &Destination,
      origin_glob: &Glob,
      head: &Revision,
      last_rev: Option<&Revision>,
      flags: &RunFlags,
      recorder: &mut EffectRecorder,
   ) -> Result<()> {
      let mut changes = origin.changes(last_rev, head)?;
      if let Some(limit) = flags.iterative_limit_changes {
         changes.truncate(limit);
      }

      if changes.is_empty() {
         recorder.record(MigrationEffect::from_write(
            vec![head.id().to_string()],
            WriteStatus::NoOp,
            None,
            "nothing to migrate",
         ));
         return Ok(());
      }

      let workdir = self.fresh_workdir()?;
      let mut previous_revision: Option<Revision> = last_rev.cloned();

      for (index, origin_change) in changes.iter().enumerate() {
         if flags.cancel.load(Ordering::Relaxed) {
            return Err(MigrationError::Other(format!(
               "migration cancelled before change {}/{}",
               index + 1,
               changes.len()
            )));
         }

         let mut checkout = origin.checkout(
            &origin_change.revision,
            &workdir.join(format!("change-{index}")),
            origin_glob,
            SubmoduleStrategy::default(),
            SymlinkPolicy::default(),
         )?;

         if self.workflow.merge_import || self.workflow.autopatch.is_some() {
            self.apply_merge_import(
               origin,
               destination,
               &mut checkout,
               previous_revision.as_ref(),
               origin_glob,
               &workdir,
               &format!("change-{index}"),
            )?;
         }

         let mut change = origin_change.clone();
         let pipeline = self.workflow.build_pipeline(self.engine_config.worker_threads, &[], None)?;
         self.run_pipeline(pipeline, &mut checkout, &mut change, flags)?;

         change.add_or_replace_label(self.workflow.rev_id_label(), origin_change.revision.id());
         let identity = self.compute_identity(&origin_change.revision, &change, flags);

         let result = self.write_change(destination, &checkout, &change, &identity, None, flags)?;
         recorder.record(MigrationEffect::from_write(
            vec![origin_change.revision.id().to_string()],
            result.status.clone(),
            result.destination_ref.as_ref(),
            format!("iterative change {}/{} ({})", index + 1, changes.len(), origin_change.revision.id()),
         ));

         previous_revision = Some(origin_change.revision.clone());
      }

      self.cleanup_workdir(&workdir, flags);
      Ok(())
   }

   // ---- CHANGE_REQUEST / CHANGE_REQUEST_FROM_SOT ----------------------

   fn run_change_request(
      &self,
      origin: &Origin,
      destination: &Destination,
      origin_glob: &Glob,
      head: &Revision,
      from_sot: bool,
      flags: &RunFlags,
      recorder: &mut EffectRecorder,
   ) -> Result<()> {
      self.check_eligibility(origin, head, flags)?;

      let baseline_revision = if from_sot {
         self.resolve_sot_baseline(origin, destination, head, self.workflow.change_request_from_sot_limit)?
      } else {
         origin
            .baseline(head)?
            .ok_or_else(|| MigrationError::ConfigError("origin does not supply a CHANGE_REQUEST baseline".to_string()))?
            .revision
      };

      let parent_ref = self.find_destination_parent(destination, baseline_revision.id())?;

      let workdir = self.fresh_workdir()?;
      let mut checkout =
         origin.checkout(head, &workdir.join("head"), origin_glob, SubmoduleStrategy::default(), SymlinkPolicy::default())?;

      let changes_in_pr = origin.changes(Some(&baseline_revision), head)?;

      if self.workflow.merge_import || self.workflow.autopatch.is_some() {
         self.apply_merge_import(
            origin,
            destination,
            &mut checkout,
            Some(&baseline_revision),
            origin_glob,
            &workdir,
            "change-request",
         )?;
      }

      let mut change = changes_in_pr.last().cloned().unwrap_or_else(|| synthetic_change(head));
      let summaries: Vec<String> = changes_in_pr.iter().map(summarize_change).collect();
      let last_meta = changes_in_pr.last().map(|c| (c.message.as_str(), &c.author));
      let pipeline = self.workflow.build_pipeline(self.engine_config.worker_threads, &summaries, last_meta)?;
      self.run_pipeline(pipeline, &mut checkout, &mut change, flags)?;

      change.add_or_replace_label(self.workflow.rev_id_label(), head.id());
      let identity = self.compute_identity(head, &change, flags);

      let result = self.write_change(destination, &checkout, &change, &identity, parent_ref.as_ref(), flags)?;
      recorder.record(MigrationEffect::from_write(
         vec![head.id().to_string()],
         result.status.clone(),
         result.destination_ref.as_ref(),
         format!("landed change request at {} (baseline {})", head.id(), baseline_revision.id()),
      ));

      self.cleanup_workdir(&workdir, flags);
      Ok(())
   }

   /// Find the destination commit whose revision-id label matches
   /// `baseline_id`, used as the new commit's parent (`4.6`).
   fn find_destination_parent(&self, destination: &Destination, baseline_id: &str) -> Result<Option<Revision>> {
      let label = self.workflow.rev_id_label();
      let history = destination.history_newest_first()?;
      Ok(history.into_iter().find(|c| c.label(label) == Some(baseline_id)).map(|c| c.revision))
   }

   /// `CHANGE_REQUEST_FROM_SOT` baseline lookup: walk the origin's
   /// first-parent ancestry back from `head`, newest first, up to `limit`
   /// entries, looking for one the destination has already recorded under
   /// `rev_id_label` (`4.6`).
   fn resolve_sot_baseline(&self, origin: &Origin, destination: &Destination, head: &Revision, limit: usize) -> Result<Revision> {
      let label = self.workflow.rev_id_label();
      let history = destination.history_newest_first()?;
      let known: std::collections::HashSet<&str> = history.iter().filter_map(|c| c.label(label)).collect();

      let ancestry = origin.changes(None, head)?;
      for change in ancestry.iter().rev().take(limit) {
         if known.contains(change.revision.id()) {
            return Ok(change.revision.clone());
         }
      }

      Err(MigrationError::PreconditionError(format!(
         "CHANGE_REQUEST_FROM_SOT: no destination-labeled baseline found within {limit} origin parents"
      )))
   }
}

/// One summary line per squashed origin commit: subject line plus a
/// short revision prefix, oldest first, for `metadata.squash_notes`.
fn summarize_change(change: &Change) -> String {
   let subject = change.message.lines().next().unwrap_or_default();
   let id = change.revision.id();
   let short = &id[..id.len().min(7)];
   format!("{subject} ({short})")
}

/// Synthesize the aggregate [`Change`] a SQUASH group (or a
/// commit-less CHANGE_REQUEST fallback) presents to the pipeline:
/// authored as the last constituent commit unless `metadata.use_last_change`
/// or `metadata.map_author` override it downstream.
fn squash_change(head: &Revision, changes: &[Change]) -> Change {
   let last = changes.last();
   let author = last.map(|c| c.author.clone()).unwrap_or_else(|| Author::new("copyhaul", "copyhaul@localhost"));
   let timestamp = last.map(|c| c.timestamp).unwrap_or_else(|| chrono::Local::now().fixed_offset());
   let message = last.map(|c| c.message.clone()).unwrap_or_default();
   Change {
      revision: head.clone(),
      author: author.clone(),
      original_author: author,
      timestamp,
      message,
      parents: Vec::new(),
      is_merge: false,
      labels: IndexMap::new(),
   }
}

fn synthetic_change(head: &Revision) -> Change {
   let author = Author::new("copyhaul", "copyhaul@localhost");
   Change {
      revision: head.clone(),
      author: author.clone(),
      original_author: author,
      timestamp: chrono::Local::now().fixed_offset(),
      message: String::new(),
      parents: Vec::new(),
      is_merge: false,
      labels: IndexMap::new(),
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::{
      destination::folder::FolderDestination,
      origin::folder::FolderOrigin,
      workflow_config::WorkflowConfig,
   };

   fn dummy_config(path: &std::path::Path) -> WorkflowConfig {
      let mut config = WorkflowConfig::default();
      config.mode = Mode::Squash;
      config.origin.kind = "folder".to_string();
      config.origin.url = path.to_string_lossy().into_owned();
      config.destination.kind = "folder".to_string();
      config.destination.url = path.join("out").to_string_lossy().into_owned();
      config
   }

   #[test]
   fn squash_first_import_against_a_folder_pair_creates_destination() {
      let dir = std::env::temp_dir().join(format!("copyhaul-workflow-test-{}", std::process::id()));
      std::fs::create_dir_all(&dir).unwrap();
      std::fs::write(dir.join("a.txt"), "X\n").unwrap();

      let workflow = dummy_config(&dir);
      let engine_config = Config::default();
      let runner = WorkflowRunner::new(&workflow, "test.toml", &engine_config);
      let mut flags = RunFlags::default();
      flags.nocleanup = false;

      let recorder = runner.run(None, &flags).unwrap();
      assert!(!recorder.effects().is_empty());
      assert!(!recorder.has_errors());

      let written = std::fs::read_to_string(dir.join("out").join("a.txt")).unwrap();
      assert_eq!(written, "X\n");

      std::fs::remove_dir_all(&dir).ok();
   }

   #[test]
   fn discover_last_rev_honors_explicit_override() {
      let dir = std::env::temp_dir().join(format!("copyhaul-workflow-test2-{}", std::process::id()));
      std::fs::create_dir_all(&dir).unwrap();
      let workflow = dummy_config(&dir);
      let engine_config = Config::default();
      let runner = WorkflowRunner::new(&workflow, "test.toml", &engine_config);

      let destination = Destination::Folder(FolderDestination::new(dir.join("out")));
      let flags = RunFlags { last_rev_override: Some("abc123".to_string()), ..RunFlags::default() };
      let found = runner.discover_last_rev(&destination, &flags).unwrap();
      assert_eq!(found.unwrap().id(), "abc123");

      std::fs::remove_dir_all(&dir).ok();
   }

   #[test]
   fn iterative_without_last_rev_and_without_force_fails() {
      let dir = std::env::temp_dir().join(format!("copyhaul-workflow-test3-{}", std::process::id()));
      std::fs::create_dir_all(&dir).unwrap();
      let mut workflow = dummy_config(&dir);
      workflow.mode = Mode::Iterative;
      let engine_config = Config::default();
      let runner = WorkflowRunner::new(&workflow, "test.toml", &engine_config);

      let destination = Destination::Folder(FolderDestination::new(dir.join("out")));
      let flags = RunFlags::default();
      assert!(runner.discover_last_rev(&destination, &flags).is_err());

      std::fs::remove_dir_all(&dir).ok();
   }

   #[test]
   fn unreferenced_origin_import() {
      let dir = std::env::temp_dir().join(format!("copyhaul-workflow-test4-{}", std::process::id()));
      std::fs::create_dir_all(&dir).unwrap();
      let origin = FolderOrigin::new(dir.clone());
      let revision = origin.resolve("ignored").unwrap();
      assert_eq!(revision.id(), dir.to_string_lossy());
      std::fs::remove_dir_all(&dir).ok();
   }
}
