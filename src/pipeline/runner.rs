//! Executing matrix entries
//!
//! A runner reports a vendor-style result string; the coordinator normalizes
//! it. CI jobs use their own runner and pass results back through
//! `pipeline post-setup`, while local runs use [`ShellRunner`].

use crate::pipeline::matrix::{MatrixEntry, Stage};
use crate::pipeline::output::PreSetupOutput;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

/// Runs one matrix entry and reports its result spelling
pub trait StageRunner: Sync {
  fn run(&self, stage: Stage, entry: &MatrixEntry, output: &PreSetupOutput) -> String;
}

/// Runs the entry's command with `sh -c` in the repository root
///
/// The command sees `RAIL_STAGE`, `RAIL_ENTRY`, `RAIL_BUILD_ID`,
/// `RAIL_ENVIRONMENT`, `RAIL_APP_IDS`, `RAIL_OUTPUT_DIR` and, when the entry
/// covers a single releasing app, `RAIL_VERSION`.
#[derive(Debug, Clone)]
pub struct ShellRunner {
  work_dir: PathBuf,
  output_dir: PathBuf,
}

impl ShellRunner {
  pub fn new(work_dir: &Path, output_dir: &Path) -> Self {
    Self {
      work_dir: work_dir.to_path_buf(),
      output_dir: output_dir.to_path_buf(),
    }
  }

  fn command(&self, stage: Stage, entry: &MatrixEntry, output: &PreSetupOutput) -> Command {
    let mut cmd = Command::new("sh");
    cmd
      .current_dir(&self.work_dir)
      .arg("-c")
      .arg(&entry.run)
      .env("RAIL_STAGE", stage.to_string())
      .env("RAIL_ENTRY", &entry.id)
      .env("RAIL_BUILD_ID", output.build_id.to_string())
      .env("RAIL_ENVIRONMENT", output.environment.key())
      .env("RAIL_APP_IDS", entry.app_ids.join(","))
      .env("RAIL_OUTPUT_DIR", &self.output_dir);

    if let [app_id] = entry.app_ids.as_slice()
      && let Some(release) = output.release(app_id)
    {
      cmd.env("RAIL_VERSION", release.version.to_string());
    }
    cmd
  }
}

impl StageRunner for ShellRunner {
  fn run(&self, stage: Stage, entry: &MatrixEntry, output: &PreSetupOutput) -> String {
    info!(%stage, entry = %entry.id, run = %entry.run, "running entry");
    match self.command(stage, entry, output).status() {
      Ok(status) if status.success() => "success".to_string(),
      Ok(status) => {
        warn!(%stage, entry = %entry.id, code = ?status.code(), "entry failed");
        "failure".to_string()
      }
      Err(e) => {
        warn!(%stage, entry = %entry.id, error = %e, "failed to start entry");
        "failure".to_string()
      }
    }
  }
}
