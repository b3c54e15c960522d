//! Re-queueing a pending release
//!
//! A failed pipeline never advances `latest`, so its version stays pending.
//! Queueing tags HEAD with `[app/]v<version>-queue`, which gives CI a fresh
//! tag trigger for the same version.

use crate::core::error::{RailError, RailResult, ValidationError};
use crate::ledger::tag::version_tag;
use crate::ledger::{Environment, LedgerScope, Marker, VersionLedger};
use crate::release::decision::app_state;
use crate::tags::TagStore;
use tracing::info;

/// Tag the pending version of an app for another release attempt
pub fn queue_release(
  tags: &dyn TagStore,
  ledger: &VersionLedger,
  scope: &LedgerScope,
  app_id: &str,
  env: &Environment,
) -> RailResult<String> {
  let state = app_state(ledger, app_id, env);
  let version = match (state.is_pending(), state.bumped) {
    (true, Some(version)) => version,
    _ => {
      return Err(RailError::Validation(ValidationError::NothingToRelease {
        app: app_id.to_string(),
        env: env.key().to_string(),
      }));
    }
  };

  let name = version_tag(scope, app_id, &version, Some(Marker::Queue));
  let head = tags.head_commit()?;
  tags.force_tag(&name, &head)?;
  tags.push_tags(std::slice::from_ref(&name))?;
  info!(tag = %name, commit = %head, "queued release");
  Ok(name)
}
