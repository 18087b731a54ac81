//! Command-line surface (`spec.md` §6).
//!
//! One flat [`Args`] struct in the teacher's style (bool flags gating
//! alternate modes, rather than `clap` subcommands) — `--validate` and
//! `--info` play the role the teacher's `--rewrite`/`--compose` flags play.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about = "Cross-repository source migration engine", long_about = None)]
pub struct Args {
   /// Path to the workflow's TOML declaration.
   pub workflow_config: PathBuf,

   /// Reference to migrate (branch, tag, content hash, PR/change URL).
   /// Defaults to the origin's notion of `HEAD`.
   pub source_ref: Option<String>,

   /// Print the resolved origin/destination/transform plan without
   /// contacting either side.
   #[arg(long)]
   pub validate: bool,

   /// Print workflow metadata (mode, origin, destination, last_rev) and
   /// exit without migrating.
   #[arg(long)]
   pub info: bool,

   /// Preview the migration without writing to the destination.
   #[arg(long)]
   pub dry_run: bool,

   /// Override last_rev discovery with an explicit origin revision.
   #[arg(long)]
   pub last_rev: Option<String>,

   /// Bypass eligibility checks and the missing-last_rev precondition.
   #[arg(long)]
   pub force: bool,

   /// Treat this run as a first import: skip destination scanning for a
   /// prior migration entirely.
   #[arg(long)]
   pub init_history: bool,

   /// Cap the number of commits migrated in one ITERATIVE run.
   #[arg(long)]
   pub iterative_limit_changes: Option<usize>,

   /// Downgrade every `TransformationNoOp` to a warning, regardless of the
   /// workflow's declared `noop_behavior`.
   #[arg(long)]
   pub ignore_noop: bool,

   /// Skip the post-pipeline reverse-execution check even if the workflow
   /// declares `reversible_check = true`.
   #[arg(long)]
   pub disable_reversible_check: bool,

   /// `key:value` pairs exposed to `${label:FLAG_KEY}` in the identity
   /// template. May be repeated.
   #[arg(long, value_delimiter = ',')]
   pub labels: Vec<String>,

   /// Named transformations to skip, by their declared `name` (only
   /// meaningful for `core.group` entries and dynamic actions).
   #[arg(long, value_delimiter = ',')]
   pub skip_transforms: Vec<String>,

   /// Keep the run's workdir/scratch directories under `output_root`
   /// after the process exits.
   #[arg(long)]
   pub nocleanup: bool,

   /// Override the engine config's `output_root` for this run.
   #[arg(long)]
   pub output_root: Option<PathBuf>,

   /// Path to the ambient engine config (default:
   /// `~/.config/copyhaul/config.toml`, or `COPYBARA_CONFIG`).
   #[arg(long)]
   pub config: Option<PathBuf>,

   /// Disable colored console output.
   #[arg(long)]
   pub no_color: bool,
}

/// Parse `--labels k:v,k2:v2` into the map [`crate::workflow::RunFlags`]
/// expects. Entries without a `:` are ignored rather than rejected,
/// matching the engine's permissive config parsing style elsewhere.
pub fn parse_labels(raw: &[String]) -> std::collections::BTreeMap<String, String> {
   raw
      .iter()
      .filter_map(|entry| entry.split_once(':'))
      .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
      .collect()
}
