//! `tag-rail version` - bumped and published versions per app and environment

use crate::commands::{load_ledger, selected_apps};
use crate::core::args::ArgMap;
use crate::core::context::RepoContext;
use crate::core::error::RailResult;
use crate::ledger::VersionResolver;
use crate::release::{AppState, app_state};

/// Run the version command
pub fn run_version(ctx: &RepoContext, args: &ArgMap, json: bool) -> RailResult<()> {
  let tags = ctx.tags()?;
  let ledger = load_ledger(&tags, &ctx.config)?;
  let resolver = VersionResolver::new(&ledger);

  let mut states = Vec::new();
  for app in selected_apps(&ctx.config, args)? {
    for env in resolver.environments(&app.id, &ctx.config.environments) {
      states.push(app_state(&ledger, &app.id, &env));
    }
  }

  if json {
    println!("{}", serde_json::to_string_pretty(&states)?);
  } else {
    print_version_table(&states);
  }
  Ok(())
}

fn print_version_table(states: &[AppState]) {
  println!("\n📦 Versions\n");
  println!("{:<20} {:<12} {:<24} {:<24} {:<8} PENDING", "APP", "ENV", "BUMPED", "PUBLISHED", "BUILD");
  println!("{:-<100}", "");

  for state in states {
    let bumped = state.bumped.as_ref().map_or_else(|| "-".to_string(), ToString::to_string);
    let (published, build) = match &state.published {
      Some(p) => (
        p.version.to_string(),
        p.build_id.map_or_else(|| "-".to_string(), |id| id.to_string()),
      ),
      None => ("-".to_string(), "-".to_string()),
    };
    let pending = if state.is_pending() { "yes" } else { "no" };
    println!(
      "{:<20} {:<12} {:<24} {:<24} {:<8} {}",
      state.app_id,
      state.environment.to_string(),
      bumped,
      published,
      build,
      pending
    );
  }

  println!();
}
