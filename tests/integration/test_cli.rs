//! Tests for the version, bump, release and entry commands

use crate::helpers::{TestRepo, run_tag_rail, run_tag_rail_unchecked};
use anyhow::Result;

const CONFIG: &str = r#"
[repository]
environments = ["beta"]

[[apps]]
id = "core"
main_release = true

[[apps]]
id = "web"
name = "Web"

[[tests]]
id = "smoke"
apps = ["web"]
run = "test \"$RAIL_STAGE\" = test"
"#;

fn repo() -> Result<TestRepo> {
  let repo = TestRepo::new()?;
  repo.write_config(CONFIG)?;
  repo.commit_file("app.txt", "x\n", "feat: app")?;
  Ok(repo)
}

fn states(repo: &TestRepo) -> Result<Vec<serde_json::Value>> {
  let output = run_tag_rail(&repo.path, &["version", "--json"], &[])?;
  let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  Ok(value.as_array().cloned().unwrap_or_default())
}

#[test]
fn test_version_json_lists_configured_environments() -> Result<()> {
  let repo = repo()?;
  let states = states(&repo)?;

  let core: Vec<&serde_json::Value> = states.iter().filter(|s| s["app_id"] == "core").collect();
  assert!(core.iter().any(|s| s["environment"] == ""));
  assert!(core.iter().any(|s| s["environment"] == "beta"));
  assert!(core.iter().all(|s| s["published"].is_null()));
  let main = core.iter().find(|s| s["environment"] == "").cloned().cloned().unwrap_or_default();
  assert_eq!(main["bumped"], "0.0.0", "an untagged app sits at its baseline");
  Ok(())
}

#[test]
fn test_bump_pushes_bump_tag() -> Result<()> {
  let repo = repo()?;

  run_tag_rail(&repo.path, &["bump", "--args", "version=v2.0.0"], &[])?;
  run_tag_rail(&repo.path, &["bump", "--args", "app=web;version=0.3.0-beta.1"], &[])?;

  let tags = repo.remote_tags()?;
  assert!(tags.contains(&"v2.0.0-bump".to_string()), "{:?}", tags);
  assert!(tags.contains(&"web/v0.3.0-beta.1-bump".to_string()), "{:?}", tags);

  let states = states(&repo)?;
  let web_beta = states
    .iter()
    .find(|s| s["app_id"] == "web" && s["environment"] == "beta")
    .cloned()
    .unwrap_or_default();
  assert_eq!(web_beta["bumped"], "0.3.0-beta.1");
  Ok(())
}

#[test]
fn test_prerelease_bump_increments_counter() -> Result<()> {
  let repo = repo()?;
  run_tag_rail(&repo.path, &["bump", "--args", "app=web;version=0.3.0-beta.1"], &[])?;
  run_tag_rail(&repo.path, &["bump", "--args", "app=web;env=beta;bump=prerelease"], &[])?;

  assert!(repo.remote_tags()?.contains(&"web/v0.3.0-beta.2-bump".to_string()));
  Ok(())
}

#[test]
fn test_out_of_order_bump_rejected() -> Result<()> {
  let repo = repo()?;
  run_tag_rail(&repo.path, &["bump", "--args", "version=1.2.0"], &[])?;
  let before = repo.remote_tags()?;

  let output = run_tag_rail_unchecked(&repo.path, &["bump", "--args", "version=1.1.0"], &[])?;
  assert!(!output.status.success());
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("1.2.0"), "stderr: {}", stderr);

  assert_eq!(repo.remote_tags()?, before);
  Ok(())
}

#[test]
fn test_bump_dry_run_writes_nothing() -> Result<()> {
  let repo = repo()?;
  let output = run_tag_rail(&repo.path, &["bump", "--args", "bump=major;dry-run"], &[])?;
  assert!(String::from_utf8_lossy(&output.stdout).contains("v1.0.0-bump"));
  assert!(repo.remote_tags()?.is_empty());
  Ok(())
}

#[test]
fn test_release_queues_pending_apps() -> Result<()> {
  let repo = repo()?;

  let output = run_tag_rail_unchecked(&repo.path, &["release", "--args", "app=ghost"], &[])?;
  assert!(!output.status.success(), "unknown apps are rejected");
  assert!(repo.remote_tags()?.is_empty());

  run_tag_rail(&repo.path, &["bump", "--args", "version=1.0.0"], &[])?;
  run_tag_rail(&repo.path, &["release", "--args", "app=core"], &[])?;
  assert!(repo.remote_tags()?.contains(&"v1.0.0-queue".to_string()));

  // Never-released apps queue their baseline
  run_tag_rail(&repo.path, &["release"], &[])?;
  assert!(repo.remote_tags()?.contains(&"web/v0.0.0-queue".to_string()));
  Ok(())
}

#[test]
fn test_local_entries_run_without_tagging() -> Result<()> {
  let repo = repo()?;
  run_tag_rail(&repo.path, &["test", "--args", "app=web"], &[])?;

  let output = run_tag_rail_unchecked(&repo.path, &["test", "--args", "entry=missing"], &[])?;
  assert!(!output.status.success());

  assert!(repo.remote_tags()?.is_empty());
  Ok(())
}
