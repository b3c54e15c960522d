//! Error types for tag-rail with contextual messages and exit codes
//!
//! This module provides a unified error type that categorizes errors and provides
//! contextual help messages to users. Configuration errors are always raised
//! before any tag is written, so a failed run leaves the tag namespace untouched.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for tag-rail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, missing files)
  User = 1,
  /// System error (git, network, I/O)
  System = 2,
  /// Validation failure (bump ordering, pipeline state)
  Validation = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for tag-rail
#[derive(Debug)]
pub enum RailError {
  /// Configuration errors
  Config(ConfigError),

  /// Git operation errors
  Git(GitError),

  /// Validation errors (versions, environments, bumps)
  Validation(ValidationError),

  /// Pipeline state machine errors
  Pipeline(PipelineError),

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl RailError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    RailError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    RailError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      RailError::Message { message, context, help } => RailError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      _ => self,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      RailError::Config(_) => ExitCode::User,
      RailError::Git(_) => ExitCode::System,
      RailError::Validation(_) => ExitCode::Validation,
      RailError::Pipeline(_) => ExitCode::Validation,
      RailError::Io(_) => ExitCode::System,
      RailError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      RailError::Config(e) => e.help_message(),
      RailError::Git(e) => e.help_message(),
      RailError::Validation(e) => e.help_message(),
      RailError::Pipeline(e) => e.help_message(),
      RailError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

impl fmt::Display for RailError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RailError::Config(e) => write!(f, "{}", e),
      RailError::Git(e) => write!(f, "{}", e),
      RailError::Validation(e) => write!(f, "{}", e),
      RailError::Pipeline(e) => write!(f, "{}", e),
      RailError::Io(e) => write!(f, "I/O error: {}", e),
      RailError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for RailError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      RailError::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for RailError {
  fn from(err: io::Error) -> Self {
    RailError::Io(err)
  }
}

impl From<String> for RailError {
  fn from(msg: String) -> Self {
    RailError::message(msg)
  }
}

impl From<&str> for RailError {
  fn from(msg: &str) -> Self {
    RailError::message(msg)
  }
}

impl From<ConfigError> for RailError {
  fn from(err: ConfigError) -> Self {
    RailError::Config(err)
  }
}

impl From<GitError> for RailError {
  fn from(err: GitError) -> Self {
    RailError::Git(err)
  }
}

impl From<ValidationError> for RailError {
  fn from(err: ValidationError) -> Self {
    RailError::Validation(err)
  }
}

impl From<PipelineError> for RailError {
  fn from(err: PipelineError) -> Self {
    RailError::Pipeline(err)
  }
}

impl From<semver::Error> for RailError {
  fn from(err: semver::Error) -> Self {
    RailError::message(format!("Version parse error: {}", err))
  }
}

impl From<std::num::ParseIntError> for RailError {
  fn from(err: std::num::ParseIntError) -> Self {
    RailError::message(format!("Parse error: {}", err))
  }
}

impl From<toml_edit::de::Error> for RailError {
  fn from(err: toml_edit::de::Error) -> Self {
    RailError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<serde_json::Error> for RailError {
  fn from(err: serde_json::Error) -> Self {
    RailError::message(format!("JSON error: {}", err))
  }
}

impl From<std::path::StripPrefixError> for RailError {
  fn from(err: std::path::StripPrefixError) -> Self {
    RailError::message(format!("Path strip prefix error: {}", err))
  }
}

/// Configuration-related errors
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
  /// rail.toml not found
  NotFound { workspace_root: PathBuf },

  /// Missing required field
  MissingField { field: String },

  /// More than one app entry carries `main_release = true`
  MultipleMainRelease { app_ids: Vec<String> },

  /// An app entry has an empty id
  EmptyAppId { index: usize },

  /// Two app entries share an id
  DuplicateAppId { id: String },

  /// App id collides with the tag grammar (`/`, `build`, `latest`)
  ReservedAppId { id: String },

  /// A test/build/publish entry references an app id that does not exist
  UnknownAppReference { entry: String, app_id: String },

  /// Two entries of the same stage share an id
  DuplicateEntryId { stage: String, id: String },

  /// Configured environment key is not a usable prerelease identifier
  InvalidEnvironment { key: String },

  /// App not found in configuration
  AppNotFound { id: String },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotFound { .. } => {
        Some("Create a rail.toml with [repository] and [[apps]] sections at the repository root.".to_string())
      }
      ConfigError::MultipleMainRelease { .. } => {
        Some("Only one [[apps]] entry may set `main_release = true`; its tags carry no app prefix.".to_string())
      }
      ConfigError::ReservedAppId { .. } => {
        Some("App ids must not contain '/' and must not be `build` or `latest`.".to_string())
      }
      ConfigError::UnknownAppReference { .. } | ConfigError::AppNotFound { .. } => {
        Some("Run `tag-rail version` to list the configured app ids.".to_string())
      }
      ConfigError::InvalidEnvironment { .. } => {
        Some("Environment keys may only contain ASCII letters, digits and '-'.".to_string())
      }
      _ => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { workspace_root } => {
        write!(
          f,
          "No tag-rail configuration found.\nExpected file: {}/rail.toml",
          workspace_root.display()
        )
      }
      ConfigError::MissingField { field } => {
        write!(f, "Missing required field in config: {}", field)
      }
      ConfigError::MultipleMainRelease { app_ids } => {
        write!(f, "Multiple apps flagged as main release: {}", app_ids.join(", "))
      }
      ConfigError::EmptyAppId { index } => {
        write!(f, "App entry #{} has an empty id", index + 1)
      }
      ConfigError::DuplicateAppId { id } => {
        write!(f, "Duplicate app id '{}'", id)
      }
      ConfigError::ReservedAppId { id } => {
        write!(f, "App id '{}' is not allowed", id)
      }
      ConfigError::UnknownAppReference { entry, app_id } => {
        write!(f, "Entry '{}' references unknown app '{}'", entry, app_id)
      }
      ConfigError::DuplicateEntryId { stage, id } => {
        write!(f, "Duplicate {} entry id '{}'", stage, id)
      }
      ConfigError::InvalidEnvironment { key } => {
        write!(f, "Invalid environment key '{}'", key)
      }
      ConfigError::AppNotFound { id } => {
        write!(f, "App '{}' not found in configuration", id)
      }
    }
  }
}

/// Git operation errors
#[derive(Debug)]
pub enum GitError {
  /// Git command failed
  CommandFailed { command: String, stderr: String },

  /// Repository not found
  RepoNotFound { path: PathBuf },

  /// Push failed
  PushFailed { remote: String, reason: String },
}

impl GitError {
  fn help_message(&self) -> Option<String> {
    match self {
      GitError::PushFailed { reason, .. } => {
        if reason.contains("permission denied") || reason.contains("403") {
          Some("Check that the CI token is allowed to push tags to the remote.".to_string())
        } else {
          None
        }
      }
      GitError::RepoNotFound { path } => Some(format!(
        "Initialize the repository first or check the path: {}",
        path.display()
      )),
      _ => None,
    }
  }
}

impl fmt::Display for GitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GitError::CommandFailed { command, stderr } => {
        write!(f, "Git command failed: {}\n{}", command, stderr)
      }
      GitError::RepoNotFound { path } => {
        write!(f, "Git repository not found at: {}", path.display())
      }
      GitError::PushFailed { remote, reason } => {
        write!(f, "Push of tags to {} failed: {}", remote, reason)
      }
    }
  }
}

/// Validation errors
#[derive(Debug, PartialEq, Eq)]
pub enum ValidationError {
  /// Requested version does not strictly exceed the current bumped version
  OutOfOrderBump {
    app: String,
    env: String,
    requested: String,
    current: String,
  },

  /// Requested version does not belong to the environment
  InvalidVersion { version: String, reason: String },

  /// Nothing is pending for the app in this environment
  NothingToRelease { app: String, env: String },
}

impl ValidationError {
  fn help_message(&self) -> Option<String> {
    match self {
      ValidationError::OutOfOrderBump { current, .. } => Some(format!(
        "Pick a version greater than {}. Run `tag-rail version` to see the current state.",
        current
      )),
      ValidationError::NothingToRelease { .. } => {
        Some("Run `tag-rail bump` first to record a new version.".to_string())
      }
      ValidationError::InvalidVersion { .. } => None,
    }
  }
}

impl fmt::Display for ValidationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ValidationError::OutOfOrderBump {
        app,
        env,
        requested,
        current,
      } => write!(
        f,
        "Version {} for '{}' ({}) must be greater than the current version {}",
        requested,
        app,
        display_env(env),
        current
      ),
      ValidationError::InvalidVersion { version, reason } => {
        write!(f, "Invalid version '{}': {}", version, reason)
      }
      ValidationError::NothingToRelease { app, env } => {
        write!(f, "Nothing to release for '{}' ({})", app, display_env(env))
      }
    }
  }
}

/// Pipeline state machine errors
#[derive(Debug, PartialEq, Eq)]
pub enum PipelineError {
  /// A stage was entered from a state that does not lead to it
  InvalidTransition { from: String, to: String },

  /// The pre-setup payload could not be read
  MissingPreSetupOutput { path: PathBuf },

  /// Entry id not part of this stage's matrix
  UnknownMatrixEntry { stage: String, id: String },

  /// The highest observed build id has no successor
  BuildIdExhausted { max: u64 },
}

impl PipelineError {
  fn help_message(&self) -> Option<String> {
    match self {
      PipelineError::MissingPreSetupOutput { .. } => {
        Some("Run `tag-rail pipeline pre-setup --output <file>` first and pass the file on.".to_string())
      }
      PipelineError::UnknownMatrixEntry { stage, .. } => Some(format!(
        "Run `tag-rail pipeline matrix --stage {}` to list the entries of this run.",
        stage
      )),
      PipelineError::BuildIdExhausted { .. } => {
        Some("Delete the stray build.<id> tag from the remote; ids are allocated above the highest one.".to_string())
      }
      PipelineError::InvalidTransition { .. } => None,
    }
  }
}

impl fmt::Display for PipelineError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PipelineError::InvalidTransition { from, to } => {
        write!(f, "Invalid pipeline transition: {} -> {}", from, to)
      }
      PipelineError::MissingPreSetupOutput { path } => {
        write!(f, "Pre-setup output not found at {}", path.display())
      }
      PipelineError::UnknownMatrixEntry { stage, id } => {
        write!(f, "Entry '{}' is not part of the {} matrix", id, stage)
      }
      PipelineError::BuildIdExhausted { max } => {
        write!(f, "No build id left above build.{}", max)
      }
    }
  }
}

fn display_env(env: &str) -> &str {
  if env.is_empty() { "main" } else { env }
}

/// Result type alias for tag-rail
pub type RailResult<T> = Result<T, RailError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> RailResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> RailResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<RailError>,
{
  fn context(self, ctx: impl Into<String>) -> RailResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> RailResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &RailError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}

/// Convert anyhow::Error to RailError
impl From<anyhow::Error> for RailError {
  fn from(err: anyhow::Error) -> Self {
    RailError::message(err.to_string())
  }
}
