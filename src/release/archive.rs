//! Versioned release archives
//!
//! Build entries drop their artifacts in `<output>/build/<app>/`. When a
//! release passes, those artifacts are copied to
//! `<output>/release/<app>/<version>/` next to a `SHA256SUMS` manifest in the
//! `sha256sum` format (`<hex>  <relative path>`).

use crate::core::error::{RailError, RailResult, ResultExt};
use rayon::prelude::*;
use semver::Version;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const MANIFEST_NAME: &str = "SHA256SUMS";

/// Result of archiving one app's build output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedRelease {
  pub dir: PathBuf,
  pub files: Vec<PathBuf>,
}

/// Directory build entries of an app write into
pub fn build_dir(output_dir: &Path, app_id: &str) -> PathBuf {
  output_dir.join("build").join(app_id)
}

/// Directory a released version is archived into
pub fn release_dir(output_dir: &Path, app_id: &str, version: &Version) -> PathBuf {
  output_dir.join("release").join(app_id).join(version.to_string())
}

/// Copy an app's build output into its versioned release directory
///
/// Returns `Ok(None)` when the app produced no build output.
pub fn archive_release(output_dir: &Path, app_id: &str, version: &Version) -> RailResult<Option<ArchivedRelease>> {
  let source = build_dir(output_dir, app_id);
  if !source.is_dir() {
    debug!(app = app_id, path = %source.display(), "no build output to archive");
    return Ok(None);
  }

  let target = release_dir(output_dir, app_id, version);
  let mut files = Vec::new();
  collect_files(&source, Path::new(""), &mut files)?;
  files.sort();

  for relative in &files {
    let dest = target.join(relative);
    if let Some(parent) = dest.parent() {
      fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::copy(source.join(relative), &dest).with_context(|| format!("Failed to copy {}", relative.display()))?;
  }
  fs::create_dir_all(&target).with_context(|| format!("Failed to create {}", target.display()))?;

  let sums: Vec<RailResult<String>> = files
    .par_iter()
    .map(|relative| {
      let digest = hash_file(&target.join(relative))?;
      Ok(format!("{}  {}", digest, manifest_path(relative)))
    })
    .collect();

  let mut manifest = String::new();
  for line in sums {
    manifest.push_str(&line?);
    manifest.push('\n');
  }
  fs::write(target.join(MANIFEST_NAME), manifest).context("Failed to write SHA256SUMS")?;

  info!(app = app_id, %version, files = files.len(), path = %target.display(), "archived release");
  Ok(Some(ArchivedRelease { dir: target, files }))
}

fn collect_files(root: &Path, relative: &Path, out: &mut Vec<PathBuf>) -> RailResult<()> {
  let dir = root.join(relative);
  let entries = fs::read_dir(&dir).with_context(|| format!("Failed to read {}", dir.display()))?;
  for entry in entries {
    let entry = entry?;
    let path = relative.join(entry.file_name());
    if entry.file_type()?.is_dir() {
      collect_files(root, &path, out)?;
    } else {
      out.push(path);
    }
  }
  Ok(())
}

fn hash_file(path: &Path) -> RailResult<String> {
  let bytes = fs::read(path).map_err(|e| RailError::message(format!("Failed to read {}: {}", path.display(), e)))?;
  let mut hasher = Sha256::new();
  hasher.update(&bytes);
  Ok(format!("{:x}", hasher.finalize()))
}

/// Manifest paths always use `/`
fn manifest_path(relative: &Path) -> String {
  relative
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}
