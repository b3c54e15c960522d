//! `tag-rail release` - queue pending releases
//!
//! `--args "app=core"` queues one app; without `app` every enabled app with a
//! pending version in the environment is queued.

use crate::commands::{load_ledger, target_environment};
use crate::core::args::ArgMap;
use crate::core::context::RepoContext;
use crate::core::error::{RailError, RailResult, ValidationError};
use crate::release::{app_state, queue_release};

/// Run the release command
pub fn run_release(ctx: &RepoContext, args: &ArgMap) -> RailResult<()> {
  let env = target_environment(ctx, args)?;
  let tags = ctx.tags()?;
  let ledger = load_ledger(&tags, &ctx.config)?;
  let scope = ctx.config.scope();

  let requested = args.list("app");
  let app_ids: Vec<String> = if requested.is_empty() {
    ctx
      .config
      .enabled_apps()
      .filter(|app| app_state(&ledger, &app.id, &env).is_pending())
      .map(|app| app.id.clone())
      .collect()
  } else {
    for id in &requested {
      ctx.config.require_app(id)?;
    }
    requested
  };

  if app_ids.is_empty() {
    return Err(RailError::Validation(ValidationError::NothingToRelease {
      app: "any app".to_string(),
      env: env.key().to_string(),
    }));
  }

  for app_id in &app_ids {
    let name = queue_release(&tags, &ledger, &scope, app_id, &env)?;
    println!("🚀 Queued {} ({})", name, env);
  }
  Ok(())
}
