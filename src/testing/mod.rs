//! Fixture-based golden-file testing for migration workflows.
//!
//! A fixture pairs a small origin tree and a workflow TOML declaration
//! with a golden effect list and expected destination tree. Running a
//! fixture replays the migration against a fresh scratch checkout and
//! diffs the result against the golden files, the same "freeze inputs,
//! compare outputs" shape the teacher uses for commit-message fixtures.
//!
//! # Directory Structure
//!
//! ```text
//! tests/fixtures/
//! ├── manifest.toml              # Fixture registry
//! ├── squash-first-import/
//! │   ├── meta.toml               # Fixture metadata
//! │   ├── workflow.toml           # Workflow declaration (with __ORIGIN__/__DESTINATION__)
//! │   ├── origin/                 # Frozen origin tree
//! │   ├── destination/            # Pre-existing destination tree (optional)
//! │   └── golden/
//! │       ├── effects.json        # Expected effect list
//! │       └── destination/        # Expected destination tree after the run
//! └── ...
//! ```

mod compare;
pub mod fixture;
mod report;
mod runner;

use std::path::Path;

pub use compare::{CompareResult, compare_run};
pub use fixture::{Fixture, FixtureEntry, FixtureInput, FixtureMeta, Golden, GoldenEffect, Manifest, discover_fixtures};
pub use report::generate_html_report;
pub use runner::{RunResult, TestRunner, TestSummary};

use crate::error::Result;

/// Default fixtures directory relative to the crate root.
pub const FIXTURES_DIR: &str = "tests/fixtures";

/// Get the fixtures directory path.
pub fn fixtures_dir() -> std::path::PathBuf {
   if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
      return Path::new(&manifest_dir).join(FIXTURES_DIR);
   }
   Path::new(FIXTURES_DIR).to_path_buf()
}

/// List all available fixtures.
pub fn list_fixtures() -> Result<Vec<String>> {
   let manifest = Manifest::load(&fixtures_dir())?;
   Ok(manifest.fixtures.into_keys().collect())
}
