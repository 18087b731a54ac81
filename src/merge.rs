//! Merge-import and autopatch (C8).
//!
//! Reconciles destination-only edits with freshly transformed origin
//! content via an external three-way merge tool, and records the
//! remaining difference between transformed origin and pre-existing
//! destination content as a patch file for manual follow-up. Both
//! operations generalize the teacher's `patch.rs` subprocess-diffing
//! machinery: the teacher shells out to `git diff`/`git apply --cached`
//! against a single working tree, here the same `Command::new(..).output()`
//! pattern drives `diff3`/`diff` against two independent in-memory
//! [`Checkout`]s that need not be git repositories at all (e.g. a folder
//! destination).

use std::{
   path::{Path, PathBuf},
   process::Command,
   sync::atomic::{AtomicU64, Ordering},
};

use crate::{
   checkout::Checkout,
   error::{MigrationError, Result},
};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn scratch_dir() -> Result<PathBuf> {
   let dir = std::env::temp_dir()
      .join(format!("copyhaul-merge-{}-{}", std::process::id(), TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)));
   std::fs::create_dir_all(&dir)?;
   Ok(dir)
}

fn write_scratch(dir: &Path, name: &str, content: &[u8]) -> Result<PathBuf> {
   let path = dir.join(name);
   std::fs::write(&path, content)?;
   Ok(path)
}

/// Outcome of one [`merge_import`] run, reported to the user as warnings
/// rather than failing the migration outright (per `4.8`, a conflicted
/// file still lands with markers for the user to resolve by hand).
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
   pub merged:               Vec<String>,
   pub conflicted:           Vec<String>,
   pub destination_only_kept: Vec<String>,
   pub warnings:             Vec<String>,
}

/// Three-way-merge `destination`'s edits (made since `baseline`) into
/// `origin` in place. Files the destination added or changed with no
/// corresponding origin entry at all are kept verbatim rather than merged
/// (`4.8`'s "destination-only file propagation"). Returns early with an
/// empty report if there is no `baseline` to diff against — merge-import
/// only makes sense once a prior migration has established one.
pub fn merge_import(origin: &mut Checkout, baseline: Option<&Checkout>, destination: &Checkout) -> Result<MergeReport> {
   let mut report = MergeReport::default();
   let Some(baseline) = baseline else {
      return Ok(report);
   };

   for path in destination.paths().map(str::to_string).collect::<Vec<_>>() {
      let d_file = destination.get(&path).expect("path came from destination.paths()");
      let b_content = baseline.get(&path).map(|f| f.content.as_slice());
      let Some(o_file) = origin.get(&path) else {
         // Transformed origin dropped or never had this file: the
         // destination's own history wins outright.
         origin.insert(path.clone(), d_file.content.clone(), d_file.executable);
         report.destination_only_kept.push(path);
         continue;
      };

      if Some(d_file.content.as_slice()) == b_content || d_file.content == o_file.content {
         // Destination never touched this file since baseline, or already
         // matches the new origin content: nothing to merge.
         continue;
      }

      let merged = diff3_merge(b_content.unwrap_or(&[]), &o_file.content, &d_file.content, &path, &mut report)?;
      let executable = o_file.executable;
      origin.insert(path.clone(), merged, executable);
      report.merged.push(path);
   }

   Ok(report)
}

/// Run `diff3 -m` over three versions of one file: `destination_cur` is
/// "mine" (what the user already has), `baseline` is the common ancestor,
/// `origin_new` is "theirs" (what the freshly transformed origin wants).
/// A conflicted merge still returns `Ok` with markers embedded in the
/// content, recorded as a warning rather than treated as fatal.
fn diff3_merge(baseline: &[u8], origin_new: &[u8], destination_cur: &[u8], path: &str, report: &mut MergeReport) -> Result<Vec<u8>> {
   let dir = scratch_dir()?;
   let mine = write_scratch(&dir, "mine", destination_cur)?;
   let base = write_scratch(&dir, "base", baseline)?;
   let theirs = write_scratch(&dir, "theirs", origin_new)?;

   let output = Command::new("diff3")
      .arg("-m")
      .arg(&mine)
      .arg(&base)
      .arg(&theirs)
      .output()
      .map_err(|e| MigrationError::IntegrationError(format!("failed to spawn diff3 for '{path}': {e}")))?;

   let _ = std::fs::remove_dir_all(&dir);

   // diff3 -m: 0 = clean merge, 1 = conflicts present (markers written to
   // stdout), >1 = hard failure (missing files, bad invocation).
   match output.status.code() {
      Some(0) => Ok(output.stdout),
      Some(1) => {
         report.conflicted.push(path.to_string());
         report.warnings.push(format!("'{path}' has unresolved merge conflict markers"));
         Ok(output.stdout)
      },
      _ => Err(MigrationError::IntegrationError(format!(
         "diff3 failed for '{path}': {}",
         String::from_utf8_lossy(&output.stderr)
      ))),
   }
}

/// Where and how [`write_autopatches`] should lay out its output, mirroring
/// `4.8`'s `directory_prefix`/`directory`/`suffix`/`header` knobs.
#[derive(Debug, Clone)]
pub struct AutopatchOptions {
   pub directory_prefix: PathBuf,
   pub directory:        String,
   pub suffix:           String,
   pub header:           Option<String>,
   pub strip_line_numbers: bool,
}

impl Default for AutopatchOptions {
   fn default() -> Self {
      Self {
         directory_prefix:   PathBuf::from("."),
         directory:          "PATCHES".to_string(),
         suffix:             ".patch".to_string(),
         header:             None,
         strip_line_numbers: false,
      }
   }
}

/// Unified-diff every file that differs between the post-pipeline origin
/// checkout and the pre-existing destination content, and write one patch
/// file per changed path under `directory_prefix/directory/`. Returns the
/// paths written.
pub fn write_autopatches(origin: &Checkout, destination: &Checkout, opts: &AutopatchOptions) -> Result<Vec<PathBuf>> {
   let mut written = Vec::new();
   let out_dir = opts.directory_prefix.join(&opts.directory);
   std::fs::create_dir_all(&out_dir)?;

   let mut all_paths: Vec<&str> = origin.paths().chain(destination.paths()).collect();
   all_paths.sort_unstable();
   all_paths.dedup();

   for path in all_paths {
      let old = destination.get(path);
      let new = origin.get(path);
      let old_content = old.map(|f| f.content.as_slice()).unwrap_or(&[]);
      let new_content = new.map(|f| f.content.as_slice()).unwrap_or(&[]);
      if old_content == new_content {
         continue;
      }

      let patch = unified_diff(path, old_content, new_content)?;
      let patch = if opts.strip_line_numbers { strip_hunk_line_numbers(&patch) } else { patch };
      let mut full = String::new();
      if let Some(header) = &opts.header {
         full.push_str(header);
         full.push('\n');
      }
      full.push_str(&patch);

      let out_path = out_dir.join(format!("{}{}", path.replace('/', "_"), opts.suffix));
      std::fs::write(&out_path, full)?;
      written.push(out_path);
   }

   Ok(written)
}

fn unified_diff(path: &str, old: &[u8], new: &[u8]) -> Result<String> {
   let dir = scratch_dir()?;
   let old_path = write_scratch(&dir, "old", old)?;
   let new_path = write_scratch(&dir, "new", new)?;

   let output = Command::new("diff")
      .arg("-u")
      .arg("--label")
      .arg(format!("a/{path}"))
      .arg("--label")
      .arg(format!("b/{path}"))
      .arg(&old_path)
      .arg(&new_path)
      .output()
      .map_err(|e| MigrationError::IntegrationError(format!("failed to spawn diff for '{path}': {e}")))?;

   let _ = std::fs::remove_dir_all(&dir);

   // diff exits 0 (no differences), 1 (differences found, this is the
   // expected case here), or 2 (error).
   match output.status.code() {
      Some(0) | Some(1) => Ok(String::from_utf8_lossy(&output.stdout).into_owned()),
      _ => Err(MigrationError::IntegrationError(format!(
         "diff failed for '{path}': {}",
         String::from_utf8_lossy(&output.stderr)
      ))),
   }
}

/// Replace each hunk header's line numbers with `?` so the patch diffs
/// cleanly across unrelated runs, keeping only the context line count.
fn strip_hunk_line_numbers(patch: &str) -> String {
   patch
      .lines()
      .map(|line| {
         if line.starts_with("@@ ") {
            "@@ -?,? +?,? @@".to_string()
         } else {
            line.to_string()
         }
      })
      .collect::<Vec<_>>()
      .join("\n")
      + "\n"
}

#[cfg(test)]
mod tests {
   use super::*;

   fn checkout(files: &[(&str, &str)]) -> Checkout {
      let mut c = Checkout::new();
      for (path, content) in files {
         c.insert(*path, content.as_bytes().to_vec(), false);
      }
      c
   }

   #[test]
   fn merge_import_without_baseline_is_noop() {
      let mut origin = checkout(&[("a.txt", "new")]);
      let destination = checkout(&[("a.txt", "existing")]);
      let report = merge_import(&mut origin, None, &destination).unwrap();
      assert!(report.merged.is_empty());
      assert_eq!(origin.get("a.txt").unwrap().content, b"new");
   }

   #[test]
   fn merge_import_keeps_destination_only_file() {
      let mut origin = checkout(&[]);
      let baseline = checkout(&[]);
      let destination = checkout(&[("notes.txt", "kept by user")]);
      let report = merge_import(&mut origin, Some(&baseline), &destination).unwrap();
      assert_eq!(report.destination_only_kept, vec!["notes.txt".to_string()]);
      assert_eq!(origin.get("notes.txt").unwrap().content, b"kept by user");
   }

   #[test]
   fn merge_import_skips_unchanged_destination_file() {
      let mut origin = checkout(&[("a.txt", "new content\n")]);
      let baseline = checkout(&[("a.txt", "old content\n")]);
      let destination = checkout(&[("a.txt", "old content\n")]);
      let report = merge_import(&mut origin, Some(&baseline), &destination).unwrap();
      assert!(report.merged.is_empty());
      assert_eq!(origin.get("a.txt").unwrap().content, b"new content\n");
   }

   #[test]
   fn write_autopatches_skips_identical_files() {
      let origin = checkout(&[("a.txt", "same")]);
      let destination = checkout(&[("a.txt", "same")]);
      let dir = std::env::temp_dir().join(format!("copyhaul-autopatch-test-{}", std::process::id()));
      let opts = AutopatchOptions { directory_prefix: dir.clone(), ..Default::default() };
      let written = write_autopatches(&origin, &destination, &opts).unwrap();
      assert!(written.is_empty());
      std::fs::remove_dir_all(&dir).ok();
   }
}
