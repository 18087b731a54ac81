//! Test runner for fixture-based testing.

use std::collections::BTreeMap;

use super::{
   compare::{CompareResult, compare_run},
   fixture::{Fixture, GoldenEffect, discover_fixtures},
};
use crate::{
   config::Config,
   effect::EffectRecorder,
   error::{MigrationError, Result},
   workflow::{RunFlags, WorkflowRunner},
   workflow_config::WorkflowConfig,
};

/// Result of running a single fixture.
#[derive(Debug)]
pub struct RunResult {
   pub name: String,
   /// `None` if the fixture has no golden yet.
   pub comparison: Option<CompareResult>,
   pub effects: Vec<GoldenEffect>,
   pub destination_files: BTreeMap<String, String>,
   pub error: Option<String>,
}

/// Test runner configuration.
pub struct TestRunner {
   pub fixtures_dir: std::path::PathBuf,
   pub filter: Option<String>,
}

impl TestRunner {
   pub fn new(fixtures_dir: impl Into<std::path::PathBuf>) -> Self {
      Self { fixtures_dir: fixtures_dir.into(), filter: None }
   }

   pub fn with_filter(mut self, filter: Option<String>) -> Self {
      self.filter = filter;
      self
   }

   /// Run all fixtures and return results.
   pub fn run_all(&self) -> Result<Vec<RunResult>> {
      let fixture_names = discover_fixtures(&self.fixtures_dir)?;
      let mut results = Vec::new();

      for name in fixture_names {
         if let Some(pattern) = &self.filter
            && !name.contains(pattern)
         {
            continue;
         }
         results.push(self.run_fixture(&name));
      }

      Ok(results)
   }

   /// Run a single fixture.
   pub fn run_fixture(&self, name: &str) -> RunResult {
      match self.run_fixture_inner(name) {
         Ok(result) => result,
         Err(e) => RunResult {
            name: name.to_string(),
            comparison: None,
            effects: Vec::new(),
            destination_files: BTreeMap::new(),
            error: Some(e.to_string()),
         },
      }
   }

   fn run_fixture_inner(&self, name: &str) -> Result<RunResult> {
      let fixture = Fixture::load(&self.fixtures_dir, name)?;

      let scratch = std::env::temp_dir().join(format!("copyhaul-fixture-{}-{}", std::process::id(), name));
      std::fs::remove_dir_all(&scratch).ok();
      let origin_dir = scratch.join("origin");
      let destination_dir = scratch.join("destination");
      super::fixture::write_tree(&origin_dir, &fixture.input.origin_files)?;
      super::fixture::write_tree(&destination_dir, &fixture.input.destination_files)?;

      let workflow_toml = fixture
         .input
         .workflow_toml
         .replace("__ORIGIN__", &origin_dir.to_string_lossy())
         .replace("__DESTINATION__", &destination_dir.to_string_lossy());
      let workflow = WorkflowConfig::from_str(&workflow_toml)?;

      let mut engine_config = Config::default();
      engine_config.output_root = Some(scratch.join("out"));

      let runner = WorkflowRunner::new(&workflow, format!("tests/fixtures/{name}/workflow.toml"), &engine_config);
      let recorder: EffectRecorder = runner.run(None, &RunFlags::default())?;

      let effects: Vec<GoldenEffect> = recorder
         .effects()
         .iter()
         .map(|e| {
            let effect_type = serde_json::to_value(e.effect_type).ok().and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default();
            GoldenEffect { effect_type, summary: e.summary.clone() }
         })
         .collect();

      let destination_files = super::fixture::read_tree(&destination_dir)?;

      let comparison = fixture.golden.as_ref().map(|g| compare_run(g, &effects, &destination_files));

      std::fs::remove_dir_all(&scratch).ok();

      Ok(RunResult { name: name.to_string(), comparison, effects, destination_files, error: None })
   }

   /// Update golden files for all fixtures.
   pub fn update_all(&self) -> Result<Vec<String>> {
      let fixture_names = discover_fixtures(&self.fixtures_dir)?;
      let mut updated = Vec::new();

      for name in fixture_names {
         if let Some(pattern) = &self.filter
            && !name.contains(pattern)
         {
            continue;
         }
         self.update_fixture(&name)?;
         updated.push(name);
      }

      Ok(updated)
   }

   /// Update the golden file for a single fixture.
   pub fn update_fixture(&self, name: &str) -> Result<()> {
      let result = self.run_fixture(name);

      if let Some(err) = result.error {
         return Err(MigrationError::Other(format!("failed to run fixture '{name}': {err}")));
      }

      let mut fixture = Fixture::load(&self.fixtures_dir, name)?;
      fixture.update_golden(result.effects, result.destination_files);
      fixture.save(&self.fixtures_dir)?;

      Ok(())
   }
}

/// Summary of a test run.
#[derive(Debug, Default)]
pub struct TestSummary {
   pub total: usize,
   pub passed: usize,
   pub failed: usize,
   pub no_golden: usize,
   pub errors: usize,
}

impl TestSummary {
   pub fn from_results(results: &[RunResult]) -> Self {
      let mut summary = Self { total: results.len(), ..Default::default() };

      for result in results {
         if result.error.is_some() {
            summary.errors += 1;
         } else if let Some(cmp) = &result.comparison {
            if cmp.passed {
               summary.passed += 1;
            } else {
               summary.failed += 1;
            }
         } else {
            summary.no_golden += 1;
         }
      }

      summary
   }

   pub const fn all_passed(&self) -> bool {
      self.failed == 0 && self.errors == 0
   }
}
