//! Test helpers for integration tests

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// CI variables that would otherwise leak the host's trigger into a run
const CI_VARS: [&str; 8] = [
  "GITHUB_REF",
  "GITHUB_REF_NAME",
  "GITHUB_REF_TYPE",
  "GITHUB_EVENT_NAME",
  "GITHUB_BASE_REF",
  "GITHUB_HEAD_REF",
  "BUILD_SOURCEBRANCH",
  "BUILD_REASON",
];

/// A working clone on `main` with a bare `origin` remote
pub struct TestRepo {
  _root: TempDir,
  pub path: PathBuf,
}

impl TestRepo {
  pub fn new() -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().join("work");
    let remote = root.path().join("origin.git");
    std::fs::create_dir_all(&path)?;

    git(root.path(), &["init", "--bare", "--initial-branch=main", "origin.git"])?;
    git(&path, &["init", "--initial-branch=main"])?;
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;
    git(&path, &["remote", "add", "origin", &remote.to_string_lossy()])?;

    std::fs::write(path.join("README.md"), "# test repo\n")?;
    std::fs::write(path.join(".gitignore"), ".rail/\n")?;
    git(&path, &["add", "."])?;
    git(&path, &["commit", "-m", "chore: initial commit"])?;
    git(&path, &["push", "origin", "main"])?;

    Ok(Self { _root: root, path })
  }

  /// Write rail.toml and commit it
  pub fn write_config(&self, content: &str) -> Result<()> {
    std::fs::write(self.path.join("rail.toml"), content)?;
    self.commit("chore: add rail.toml")?;
    Ok(())
  }

  /// Write a file, commit it and push main
  pub fn commit_file(&self, file: &str, content: &str, message: &str) -> Result<String> {
    std::fs::write(self.path.join(file), content)?;
    let sha = self.commit(message)?;
    git(&self.path, &["push", "origin", "main"])?;
    Ok(sha)
  }

  pub fn commit(&self, message: &str) -> Result<String> {
    git(&self.path, &["add", "."])?;
    git(&self.path, &["commit", "-m", message])?;
    self.head()
  }

  pub fn head(&self) -> Result<String> {
    let output = git(&self.path, &["rev-parse", "HEAD"])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Tag names on the remote, sorted
  pub fn remote_tags(&self) -> Result<Vec<String>> {
    let output = git(&self.path, &["ls-remote", "--tags", "origin"])?;
    let mut tags: Vec<String> = String::from_utf8_lossy(&output.stdout)
      .lines()
      .filter_map(|line| line.split_whitespace().nth(1))
      .filter_map(|r| r.strip_prefix("refs/tags/"))
      .filter(|r| !r.ends_with("^{}"))
      .map(String::from)
      .collect();
    tags.sort();
    Ok(tags)
  }

  /// Push an extra tag straight to the remote (seeding history)
  pub fn push_tag(&self, name: &str) -> Result<()> {
    git(&self.path, &["tag", "--force", name])?;
    git(&self.path, &["push", "--force", "origin", &format!("refs/tags/{0}:refs/tags/{0}", name)])?;
    Ok(())
  }
}

/// Run git command in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("Git command failed: git {}\n{}", args.join(" "), stderr);
  }

  Ok(output)
}

/// Run tag-rail without checking the exit status
pub fn run_tag_rail_unchecked(cwd: &Path, args: &[&str], envs: &[(&str, &str)]) -> Result<Output> {
  let bin = env!("CARGO_BIN_EXE_tag-rail");

  let mut cmd = Command::new(bin);
  cmd.current_dir(cwd).args(args).env("RAIL_LOG", "tag_rail=warn");
  for var in CI_VARS.iter().chain(["RAIL_BRANCH", "RAIL_TRIGGER"].iter()) {
    cmd.env_remove(var);
  }
  for (key, value) in envs {
    cmd.env(key, value);
  }

  cmd.output().context("Failed to run tag-rail")
}

/// Run tag-rail and fail unless it exits successfully
pub fn run_tag_rail(cwd: &Path, args: &[&str], envs: &[(&str, &str)]) -> Result<Output> {
  let output = run_tag_rail_unchecked(cwd, args, envs)?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    anyhow::bail!(
      "tag-rail command failed: tag-rail {}\nstdout: {}\nstderr: {}",
      args.join(" "),
      stdout,
      stderr
    );
  }

  Ok(output)
}

/// Environment of a tag-push run on main
pub const TAG_PUSH_MAIN: [(&str, &str); 2] = [("RAIL_BRANCH", "main"), ("RAIL_TRIGGER", "tag")];
