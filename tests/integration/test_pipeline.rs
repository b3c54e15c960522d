//! End-to-end pipeline runs against a real clone and bare remote

use crate::helpers::{TAG_PUSH_MAIN, TestRepo, run_tag_rail, run_tag_rail_unchecked};
use anyhow::Result;

const SINGLE_APP: &str = r#"
[repository]
main_branch = "main"

[[apps]]
id = "core"
name = "Core"
main_release = true

[[tests]]
id = "unit"
apps = ["core"]
policy = "always"
run = "true"

[[builds]]
id = "core-dist"
app = "core"
run = "mkdir -p \"$RAIL_OUTPUT_DIR/build/core\" && echo \"$RAIL_VERSION\" > \"$RAIL_OUTPUT_DIR/build/core/VERSION\""

[[publishes]]
id = "core-publish"
app = "core"
run = "true"
"#;

fn release_ready(config: &str) -> Result<TestRepo> {
  let repo = TestRepo::new()?;
  repo.write_config(config)?;
  repo.commit_file("lib.txt", "one\n", "feat: first feature")?;
  run_tag_rail(&repo.path, &["bump", "--args", "version=1.0.0"], &[])?;
  Ok(repo)
}

#[test]
fn test_successful_release_records_version_and_latest() -> Result<()> {
  let repo = release_ready(SINGLE_APP)?;

  let output = run_tag_rail(&repo.path, &["pipeline", "run"], &TAG_PUSH_MAIN)?;
  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("released"), "stdout: {}", stdout);

  let tags = repo.remote_tags()?;
  for expected in ["v1.0.0-bump", "build.1", "build.1-main", "build.1-main-passed", "v1.0.0", "latest"] {
    assert!(tags.contains(&expected.to_string()), "missing {} in {:?}", expected, tags);
  }

  let archived = repo.path.join(".rail/output/release/core/1.0.0");
  assert_eq!(std::fs::read_to_string(archived.join("VERSION"))?.trim(), "1.0.0");
  let sums = std::fs::read_to_string(archived.join("SHA256SUMS"))?;
  assert!(sums.contains("  VERSION"), "manifest: {}", sums);

  Ok(())
}

#[test]
fn test_failed_publish_marks_build_failed_only() -> Result<()> {
  let config = SINGLE_APP.replace(
    "id = \"core-publish\"\napp = \"core\"\nrun = \"true\"",
    "id = \"core-publish\"\napp = \"core\"\nrun = \"exit 3\"",
  );
  let repo = release_ready(&config)?;

  let output = run_tag_rail_unchecked(&repo.path, &["pipeline", "run"], &TAG_PUSH_MAIN)?;
  assert!(!output.status.success());

  let tags = repo.remote_tags()?;
  assert!(tags.contains(&"build.1-main-failed".to_string()), "{:?}", tags);
  assert!(!tags.contains(&"build.1-main-passed".to_string()));
  assert!(!tags.contains(&"v1.0.0".to_string()));
  assert!(!tags.contains(&"latest".to_string()));

  // The release is still pending, so the next tag push retries it
  let output = run_tag_rail(&repo.path, &["version", "--json"], &[])?;
  let states: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  let main = states
    .as_array()
    .and_then(|s| s.iter().find(|s| s["environment"] == ""))
    .cloned()
    .unwrap_or_default();
  assert_eq!(main["bumped"], "1.0.0");
  assert!(main["published"].is_null());

  Ok(())
}

#[test]
fn test_commit_trigger_records_build_only() -> Result<()> {
  let repo = release_ready(SINGLE_APP)?;
  let before = repo.remote_tags()?;

  let output = run_tag_rail(&repo.path, &["pipeline", "run"], &[("RAIL_BRANCH", "main")])?;
  let stdout = String::from_utf8_lossy(&output.stdout);
  assert!(stdout.contains("build.1 passed"), "stdout: {}", stdout);

  let added: Vec<String> = repo
    .remote_tags()?
    .into_iter()
    .filter(|t| !before.contains(t))
    .collect();
  assert_eq!(added, vec!["build.1", "build.1-main", "build.1-main-passed"]);

  // The next run claims a fresh id
  run_tag_rail(&repo.path, &["pipeline", "run"], &[("RAIL_BRANCH", "main")])?;
  let tags = repo.remote_tags()?;
  assert!(tags.contains(&"build.2-main-passed".to_string()), "{:?}", tags);
  assert!(!tags.iter().any(|t| t == "latest" || t == "v1.0.0"), "{:?}", tags);
  Ok(())
}

#[test]
fn test_failing_commit_run_marks_build_failed() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.write_config(
    r#"
[[apps]]
id = "core"
main_release = true

[[tests]]
id = "unit"
apps = ["core"]
policy = "always"
run = "false"
"#,
  )?;
  repo.commit_file("lib.txt", "one\n", "feat: first feature")?;

  let output = run_tag_rail_unchecked(&repo.path, &["pipeline", "run"], &[("RAIL_BRANCH", "main")])?;
  assert!(!output.status.success());
  assert_eq!(repo.remote_tags()?, vec!["build.1", "build.1-main", "build.1-main-failed"]);
  Ok(())
}

#[test]
fn test_two_main_release_apps_abort_before_tagging() -> Result<()> {
  let repo = TestRepo::new()?;
  repo.write_config(
    r#"
[[apps]]
id = "core"
main_release = true

[[apps]]
id = "web"
main_release = true
"#,
  )?;
  repo.push_tag("v1.0.0-bump")?;
  let before = repo.remote_tags()?;

  let output = run_tag_rail_unchecked(&repo.path, &["pipeline", "run"], &TAG_PUSH_MAIN)?;
  assert!(!output.status.success());
  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains("core") && stderr.contains("web"), "stderr: {}", stderr);

  assert_eq!(repo.remote_tags()?, before);
  Ok(())
}

#[test]
fn test_split_stages_share_the_pre_setup_output() -> Result<()> {
  let repo = release_ready(SINGLE_APP)?;
  let output_file = repo.path.join(".rail/pre-setup.json");
  let output_arg = output_file.to_string_lossy().to_string();

  run_tag_rail(&repo.path, &["pipeline", "pre-setup", "--output", &output_arg], &TAG_PUSH_MAIN)?;
  let payload: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output_file)?)?;
  assert_eq!(payload["has_release"], true);
  assert_eq!(payload["build_id"], 1);
  assert_eq!(payload["is_first_release"], true);
  assert_eq!(payload["trigger_type"], "tag");
  assert_eq!(payload["releases"]["core"]["version"], "1.0.0");
  assert!(payload["release_notes"].as_str().unwrap_or_default().contains("first feature"));

  let matrix = run_tag_rail(
    &repo.path,
    &["pipeline", "matrix", "--stage", "build", "--input", &output_arg],
    &[],
  )?;
  let entries: serde_json::Value = serde_json::from_slice(&matrix.stdout)?;
  assert_eq!(entries[0]["id"], "core-dist");

  for stage in ["test", "build", "publish"] {
    run_tag_rail(&repo.path, &["pipeline", stage, "--input", &output_arg], &[])?;
  }
  run_tag_rail(
    &repo.path,
    &[
      "pipeline",
      "post-setup",
      "--input",
      &output_arg,
      "--test-result",
      "success",
      "--build-result",
      "Succeeded",
      "--publish-result",
      "success",
    ],
    &[],
  )?;

  let tags = repo.remote_tags()?;
  assert!(tags.contains(&"build.1-main-passed".to_string()), "{:?}", tags);
  assert!(tags.contains(&"latest".to_string()));
  Ok(())
}

#[test]
fn test_second_release_compares_against_previous_build() -> Result<()> {
  let repo = release_ready(SINGLE_APP)?;
  run_tag_rail(&repo.path, &["pipeline", "run"], &TAG_PUSH_MAIN)?;

  repo.commit_file("lib.txt", "two\n", "fix(core): handle empty input")?;
  run_tag_rail(&repo.path, &["bump", "--args", "bump=minor"], &[])?;

  let output = run_tag_rail(&repo.path, &["pipeline", "pre-setup"], &TAG_PUSH_MAIN)?;
  let payload: serde_json::Value = serde_json::from_slice(&output.stdout)?;
  assert_eq!(payload["build_id"], 2);
  assert_eq!(payload["last_build_id"], 1);
  assert_eq!(payload["is_first_release"], false);
  assert_eq!(payload["releases"]["core"]["version"], "1.1.0");

  let notes = payload["release_notes"].as_str().unwrap_or_default();
  assert!(notes.contains("handle empty input"), "notes: {}", notes);
  assert!(!notes.contains("first feature"), "notes: {}", notes);
  Ok(())
}
