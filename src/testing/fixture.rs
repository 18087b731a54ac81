//! Fixture types and I/O operations.

use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{MigrationError, Result};

/// Manifest listing all fixtures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
   /// Map of fixture name to metadata.
   #[serde(default)]
   pub fixtures: BTreeMap<String, FixtureEntry>,
}

/// Entry in the manifest for a single fixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureEntry {
   /// Brief description of what this fixture exercises.
   pub description: String,
   /// Tags for filtering (e.g. "squash", "merge-import", "change-request").
   #[serde(default)]
   pub tags: Vec<String>,
}

impl Manifest {
   /// Load manifest from fixtures directory.
   pub fn load(fixtures_dir: &Path) -> Result<Self> {
      let path = fixtures_dir.join("manifest.toml");
      if !path.exists() {
         return Ok(Self::default());
      }
      let content = fs::read_to_string(&path)?;
      toml::from_str(&content).map_err(|e| MigrationError::ConfigError(format!("failed to parse manifest.toml: {e}")))
   }

   /// Save manifest to fixtures directory.
   pub fn save(&self, fixtures_dir: &Path) -> Result<()> {
      let path = fixtures_dir.join("manifest.toml");
      let content = toml::to_string_pretty(self)
         .map_err(|e| MigrationError::ConfigError(format!("failed to serialize manifest: {e}")))?;
      fs::write(&path, content)?;
      Ok(())
   }

   pub fn add(&mut self, name: String, entry: FixtureEntry) {
      self.fixtures.insert(name, entry);
   }
}

/// Metadata for a fixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureMeta {
   /// Why this fixture is interesting.
   pub description: String,
   /// Tags for categorization.
   #[serde(default)]
   pub tags: Vec<String>,
}

/// Input data for a fixture: an origin tree and the workflow that migrates
/// it. `workflow_toml` may reference the placeholder tokens `__ORIGIN__`
/// and `__DESTINATION__` in `[origin].url`/`[destination].url`, which
/// [`super::runner::TestRunner`] rewrites to the run's scratch directories
/// before parsing — fixtures are declared once and replayed against a
/// fresh checkout every run.
#[derive(Debug, Clone, Default)]
pub struct FixtureInput {
   /// Relative path -> file content, materialized under the origin root.
   pub origin_files: BTreeMap<String, String>,
   /// Relative path -> file content, pre-seeded under the destination root
   /// before the run (empty for a first-import fixture).
   pub destination_files: BTreeMap<String, String>,
   /// The workflow's TOML declaration.
   pub workflow_toml: String,
}

/// One recorded effect, in golden form (the parts of
/// [`crate::effect::MigrationEffect`] that are stable across runs — a
/// destination ref's generated id is not).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenEffect {
   #[serde(rename = "type")]
   pub effect_type: String,
   pub summary: String,
}

/// Golden (expected) output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Golden {
   /// Expected effect list, in order.
   pub effects: Vec<GoldenEffect>,
   /// Expected destination tree after the run, relative path -> content.
   pub destination_files: BTreeMap<String, String>,
}

/// A complete fixture with all data.
#[derive(Debug, Clone)]
pub struct Fixture {
   /// Fixture name (directory name).
   pub name: String,
   pub meta: FixtureMeta,
   pub input: FixtureInput,
   /// `None` if no golden has been captured yet.
   pub golden: Option<Golden>,
}

impl Fixture {
   /// Load a fixture from disk.
   pub fn load(fixtures_dir: &Path, name: &str) -> Result<Self> {
      let fixture_dir = fixtures_dir.join(name);
      if !fixture_dir.exists() {
         return Err(MigrationError::ConfigError(format!("fixture '{name}' not found at {}", fixture_dir.display())));
      }

      let meta_path = fixture_dir.join("meta.toml");
      let meta: FixtureMeta = if meta_path.exists() {
         let content = fs::read_to_string(&meta_path)?;
         toml::from_str(&content)
            .map_err(|e| MigrationError::ConfigError(format!("failed to parse {}: {e}", meta_path.display())))?
      } else {
         return Err(MigrationError::ConfigError(format!("fixture '{name}' missing meta.toml")));
      };

      let workflow_toml = fs::read_to_string(fixture_dir.join("workflow.toml"))
         .map_err(|e| MigrationError::ConfigError(format!("failed to read workflow.toml: {e}")))?;

      let origin_files = read_tree(&fixture_dir.join("origin"))?;
      let destination_files = read_tree(&fixture_dir.join("destination")).unwrap_or_default();

      let golden_dir = fixture_dir.join("golden");
      let golden = if golden_dir.exists() {
         let effects_path = golden_dir.join("effects.json");
         let effects: Vec<GoldenEffect> = if effects_path.exists() {
            serde_json::from_str(&fs::read_to_string(&effects_path)?)?
         } else {
            Vec::new()
         };
         let destination_files = read_tree(&golden_dir.join("destination")).unwrap_or_default();
         Some(Golden { effects, destination_files })
      } else {
         None
      };

      Ok(Self { name: name.to_string(), meta, input: FixtureInput { origin_files, destination_files, workflow_toml }, golden })
   }

   /// Save a fixture to disk.
   pub fn save(&self, fixtures_dir: &Path) -> Result<()> {
      let fixture_dir = fixtures_dir.join(&self.name);
      fs::create_dir_all(&fixture_dir)?;

      let meta_content = toml::to_string_pretty(&self.meta)
         .map_err(|e| MigrationError::ConfigError(format!("failed to serialize meta: {e}")))?;
      fs::write(fixture_dir.join("meta.toml"), meta_content)?;
      fs::write(fixture_dir.join("workflow.toml"), &self.input.workflow_toml)?;

      write_tree(&fixture_dir.join("origin"), &self.input.origin_files)?;
      if !self.input.destination_files.is_empty() {
         write_tree(&fixture_dir.join("destination"), &self.input.destination_files)?;
      }

      if let Some(golden) = &self.golden {
         let golden_dir = fixture_dir.join("golden");
         fs::create_dir_all(&golden_dir)?;
         let effects_json = serde_json::to_string_pretty(&golden.effects)?;
         fs::write(golden_dir.join("effects.json"), effects_json)?;
         write_tree(&golden_dir.join("destination"), &golden.destination_files)?;
      }

      Ok(())
   }

   /// Replace the golden output with a freshly-run result.
   pub fn update_golden(&mut self, effects: Vec<GoldenEffect>, destination_files: BTreeMap<String, String>) {
      self.golden = Some(Golden { effects, destination_files });
   }
}

/// Recursively read a directory into a relative-path -> content map.
/// Missing directories read as empty rather than erroring, since
/// `destination/` is absent for first-import fixtures.
pub(super) fn read_tree(root: &Path) -> Result<BTreeMap<String, String>> {
   let mut out = BTreeMap::new();
   if !root.exists() {
      return Ok(out);
   }
   read_tree_into(root, root, &mut out)?;
   Ok(out)
}

fn read_tree_into(root: &Path, dir: &Path, out: &mut BTreeMap<String, String>) -> Result<()> {
   for entry in fs::read_dir(dir)? {
      let entry = entry?;
      let path = entry.path();
      if path.is_dir() {
         read_tree_into(root, &path, out)?;
      } else {
         let relative = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().replace('\\', "/");
         out.insert(relative, fs::read_to_string(&path)?);
      }
   }
   Ok(())
}

pub(super) fn write_tree(root: &Path, files: &BTreeMap<String, String>) -> Result<()> {
   fs::create_dir_all(root)?;
   for (relative, content) in files {
      let path = root.join(relative);
      if let Some(parent) = path.parent() {
         fs::create_dir_all(parent)?;
      }
      fs::write(path, content)?;
   }
   Ok(())
}

/// Discover all fixtures in a directory.
pub fn discover_fixtures(fixtures_dir: &Path) -> Result<Vec<String>> {
   let mut fixtures = Vec::new();

   if !fixtures_dir.exists() {
      return Ok(fixtures);
   }

   for entry in fs::read_dir(fixtures_dir)? {
      let entry = entry?;
      let path = entry.path();

      if !path.is_dir() {
         continue;
      }

      if path.join("meta.toml").exists()
         && let Some(name) = path.file_name().and_then(|n| n.to_str())
      {
         fixtures.push(name.to_string());
      }
   }

   fixtures.sort();
   Ok(fixtures)
}
