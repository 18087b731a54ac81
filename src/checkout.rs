//! Checkout directory model.
//!
//! A mutable file tree materialized per migration, rooted at a workdir
//! path. Paths inside a [`Checkout`] always use forward-slash separators
//! regardless of host, matching `spec.md` §3.

use std::{
   collections::BTreeMap,
   fs,
   path::{Path, PathBuf},
};

use crate::error::{MigrationError, Result};

/// Symlink handling policy for a materialized checkout, matching the
/// per-origin submodule/symlink flag in `4.2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymlinkPolicy {
   /// Intra-tree symlinks are preserved; absolute/out-of-tree symlinks are
   /// rejected.
   #[default]
   PreserveInTree,
   /// Any symlink, intra- or out-of-tree, is materialized as a regular
   /// file containing its target path's content.
   MaterializeAsFiles,
}

/// One file in the checkout tree: content bytes plus the executable bit.
#[derive(Debug, Clone)]
pub struct CheckoutFile {
   pub content:    Vec<u8>,
   pub executable: bool,
}

/// The mutable per-run file tree acted on by transformations. Keys are
/// forward-slash relative paths; the tree never contains a path outside
/// `origin_files ∪ destination_only` at pipeline boundaries — callers
/// enforce that invariant by filtering through a [`crate::glob::Glob`]
/// before inserting.
#[derive(Debug, Clone, Default)]
pub struct Checkout {
   root:  Option<PathBuf>,
   files: BTreeMap<String, CheckoutFile>,
}

impl Checkout {
   pub fn new() -> Self {
      Self::default()
   }

   /// Materialize an in-memory checkout into an on-disk workdir, e.g. to
   /// hand off to an external tool (git, diff3) that only operates on
   /// files.
   pub fn materialize(&self, workdir: &Path) -> Result<()> {
      fs::create_dir_all(workdir)?;
      for (path, file) in &self.files {
         let dest = workdir.join(path);
         if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
         }
         fs::write(&dest, &file.content)?;
         #[cfg(unix)]
         {
            use std::os::unix::fs::PermissionsExt;
            let mode = if file.executable { 0o755 } else { 0o644 };
            fs::set_permissions(&dest, fs::Permissions::from_mode(mode))?;
         }
      }
      Ok(())
   }

   /// Load a tree from disk into memory, restricted to paths matching
   /// `within`.
   pub fn load_from_dir(
      workdir: &Path,
      within: &dyn Fn(&str) -> bool,
      symlinks: SymlinkPolicy,
   ) -> Result<Self> {
      let mut checkout = Self::new();
      checkout.root = Some(workdir.to_path_buf());
      Self::walk_into(workdir, workdir, &mut checkout, within, symlinks)?;
      Ok(checkout)
   }

   fn walk_into(
      base: &Path,
      dir: &Path,
      out: &mut Self,
      within: &dyn Fn(&str) -> bool,
      symlinks: SymlinkPolicy,
   ) -> Result<()> {
      for entry in fs::read_dir(dir)? {
         let entry = entry?;
         let path = entry.path();
         let file_type = entry.file_type()?;

         if file_type.is_dir() {
            Self::walk_into(base, &path, out, within, symlinks)?;
            continue;
         }

         let relative = relative_slash_path(base, &path)?;
         if !within(&relative) {
            continue;
         }

         if file_type.is_symlink() {
            match symlinks {
               SymlinkPolicy::MaterializeAsFiles => {
                  let target = fs::read_link(&path)?;
                  let content = target.to_string_lossy().into_owned().into_bytes();
                  out.files.insert(relative, CheckoutFile { content, executable: false });
               },
               SymlinkPolicy::PreserveInTree => {
                  let target = fs::read_link(&path)?;
                  if target.is_absolute() {
                     return Err(MigrationError::ConfigError(format!(
                        "out-of-tree symlink rejected: {} -> {}",
                        relative,
                        target.display()
                     )));
                  }
               },
            }
            continue;
         }

         let content = fs::read(&path)?;
         let executable = is_executable(&path)?;
         out.files.insert(relative, CheckoutFile { content, executable });
      }
      Ok(())
   }

   pub fn get(&self, path: &str) -> Option<&CheckoutFile> {
      self.files.get(path)
   }

   pub fn exists(&self, path: &str) -> bool {
      self.files.contains_key(path)
   }

   pub fn insert(&mut self, path: impl Into<String>, content: Vec<u8>, executable: bool) {
      self.files.insert(path.into(), CheckoutFile { content, executable });
   }

   pub fn remove(&mut self, path: &str) -> Option<CheckoutFile> {
      self.files.remove(path)
   }

   pub fn rename(&mut self, from: &str, to: &str, overwrite: bool) -> Result<bool> {
      if !overwrite && self.files.contains_key(to) {
         return Err(MigrationError::ConfigError(format!(
            "rename collision: '{to}' already exists (overwrite=false)"
         )));
      }
      if let Some(file) = self.files.remove(from) {
         self.files.insert(to.to_string(), file);
         Ok(true)
      } else {
         Ok(false)
      }
   }

   pub fn paths(&self) -> impl Iterator<Item = &str> {
      self.files.keys().map(String::as_str)
   }

   pub fn iter(&self) -> impl Iterator<Item = (&str, &CheckoutFile)> {
      self.files.iter().map(|(k, v)| (k.as_str(), v))
   }

   pub fn len(&self) -> usize {
      self.files.len()
   }

   pub fn is_empty(&self) -> bool {
      self.files.is_empty()
   }

   /// Byte-equality used by the reverse-check (`4.5`), modulo a set of
   /// ignored paths.
   pub fn byte_equal_modulo(&self, other: &Self, ignore: &dyn Fn(&str) -> bool) -> bool {
      let mut self_paths: Vec<_> = self.paths().filter(|p| !ignore(p)).collect();
      let mut other_paths: Vec<_> = other.paths().filter(|p| !ignore(p)).collect();
      self_paths.sort_unstable();
      other_paths.sort_unstable();
      if self_paths != other_paths {
         return false;
      }
      self_paths.iter().all(|p| {
         self.get(p).map(|f| &f.content) == other.get(p).map(|f| &f.content)
      })
   }
}

fn relative_slash_path(base: &Path, path: &Path) -> Result<String> {
   let relative = path.strip_prefix(base).map_err(|e| {
      MigrationError::Other(format!("path {} is not under {}: {e}", path.display(), base.display()))
   })?;
   Ok(relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/"))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> Result<bool> {
   use std::os::unix::fs::PermissionsExt;
   Ok(fs::metadata(path)?.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> Result<bool> {
   Ok(false)
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn materialize_and_reload_round_trips() {
      let dir = std::env::temp_dir().join(format!("copyhaul-checkout-test-{}", std::process::id()));
      let mut checkout = Checkout::new();
      checkout.insert("a.txt", b"hello".to_vec(), false);
      checkout.insert("sub/b.txt", b"world".to_vec(), false);
      checkout.materialize(&dir).unwrap();

      let reloaded = Checkout::load_from_dir(&dir, &|_| true, SymlinkPolicy::PreserveInTree).unwrap();
      assert_eq!(reloaded.get("a.txt").unwrap().content, b"hello");
      assert_eq!(reloaded.get("sub/b.txt").unwrap().content, b"world");

      fs::remove_dir_all(&dir).ok();
   }

   #[test]
   fn rename_collision_without_overwrite_is_config_error() {
      let mut checkout = Checkout::new();
      checkout.insert("a.txt", b"1".to_vec(), false);
      checkout.insert("b.txt", b"2".to_vec(), false);
      assert!(checkout.rename("a.txt", "b.txt", false).is_err());
   }

   #[test]
   fn byte_equal_modulo_ignores_listed_paths() {
      let mut a = Checkout::new();
      a.insert("a.txt", b"1".to_vec(), false);
      a.insert("ignored.log", b"junk".to_vec(), false);

      let mut b = Checkout::new();
      b.insert("a.txt", b"1".to_vec(), false);
      b.insert("ignored.log", b"other junk".to_vec(), false);

      assert!(a.byte_equal_modulo(&b, &|p| p == "ignored.log"));
      assert!(!a.byte_equal_modulo(&b, &|_| false));
   }
}
