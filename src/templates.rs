//! Embedded commit-message templates for `add_header`/`squash_notes`
//! (`4.5`/`4.9`), rendered with the same Tera + `rust-embed` pairing used
//! for on-disk template overrides plus a compiled-in fallback.

use std::{
   collections::BTreeMap,
   path::PathBuf,
   sync::LazyLock,
};

use parking_lot::Mutex;
use rust_embed::RustEmbed;
use tera::{Context, Tera};

use crate::error::{MigrationError, Result};

#[derive(RustEmbed)]
#[folder = "templates/"]
struct Templates;

static TERA: LazyLock<Mutex<Tera>> = LazyLock::new(|| {
   let mut tera = Tera::default();

   if let Some(user_dir) = user_templates_dir() {
      register_directory_templates(&mut tera, &user_dir);
   }

   for file in Templates::iter() {
      if tera.get_template_names().any(|name| name == file.as_ref()) {
         continue;
      }
      if let Some(embedded) = Templates::get(file.as_ref()) {
         if let Ok(content) = std::str::from_utf8(embedded.data.as_ref()) {
            if let Err(e) = tera.add_raw_template(file.as_ref(), content) {
               eprintln!("warning: failed to register embedded template {}: {e}", file.as_ref());
            }
         }
      }
   }

   tera.autoescape_on(vec![]);
   Mutex::new(tera)
});

fn user_templates_dir() -> Option<PathBuf> {
   std::env::var("HOME")
      .or_else(|_| std::env::var("USERPROFILE"))
      .ok()
      .map(|home| PathBuf::from(home).join(".copyhaul").join("templates"))
}

fn register_directory_templates(tera: &mut Tera, dir: &std::path::Path) {
   if !dir.exists() {
      return;
   }
   let Ok(entries) = std::fs::read_dir(dir) else { return };
   for entry in entries.flatten() {
      let path = entry.path();
      if path.extension().and_then(|s| s.to_str()) != Some("txt") {
         continue;
      }
      let Some(name) = path.file_name().and_then(|s| s.to_str()) else { continue };
      if let Err(e) = tera.add_template_file(&path, Some(name)) {
         eprintln!("warning: failed to load user template {}: {e}", path.display());
      }
   }
}

/// Render a named template (`"commit/add_header.txt"`,
/// `"commit/squash_notes.txt"`) against a flat string-valued variable map.
pub fn render(template_name: &str, vars: &BTreeMap<String, String>) -> Result<String> {
   let mut context = Context::new();
   for (key, value) in vars {
      context.insert(key, value);
   }

   let mut tera = TERA.lock();
   tera
      .render(template_name, &context)
      .map_err(|e| MigrationError::Other(format!("failed to render template '{template_name}': {e}")))
}

/// Render an inline template string (an `add_header`/`replace_message`
/// body supplied directly in the workflow config) without registering it
/// under a name first.
pub fn render_str(template: &str, vars: &BTreeMap<String, String>) -> Result<String> {
   let mut context = Context::new();
   for (key, value) in vars {
      context.insert(key, value);
   }

   Tera::one_off(template, &context, false)
      .map_err(|e| MigrationError::Other(format!("failed to render inline template: {e}")))
}
