use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tag_rail::commands;
use tag_rail::core::args::ArgMap;
use tag_rail::core::context::RepoContext;
use tag_rail::core::error::{RailError, print_error};
use tag_rail::pipeline::Stage;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Release orchestration driven by the repository's tag namespace
#[derive(Parser)]
#[command(name = "tag-rail")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  // ============================================================================
  // Versions
  // ============================================================================
  /// Show bumped and published versions per app and environment
  Version {
    /// Semicolon-separated options, e.g. "app=core,web"
    #[arg(long, default_value = "")]
    args: String,
    /// Output in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Record the next version of an app ("app=core;version=1.2.0" or "bump=minor")
  Bump {
    #[arg(long, default_value = "")]
    args: String,
  },

  /// Re-queue pending releases ("app=core")
  Release {
    #[arg(long, default_value = "")]
    args: String,
  },

  // ============================================================================
  // Local entries
  // ============================================================================
  /// Run test entries locally
  Test {
    #[arg(long, default_value = "")]
    args: String,
  },

  /// Run build entries locally
  Build {
    #[arg(long, default_value = "")]
    args: String,
  },

  /// Run publish entries locally
  Publish {
    #[arg(long, default_value = "")]
    args: String,
  },

  // ============================================================================
  // Pipeline (invoked by generated CI definitions)
  // ============================================================================
  #[command(subcommand)]
  Pipeline(PipelineCommands),
}

#[derive(Subcommand)]
enum PipelineCommands {
  /// Decide the run, claim a build id and write the pre-setup output
  PreSetup {
    /// Write the output here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
  },

  /// Print a stage's matrix as JSON
  Matrix {
    #[arg(long, value_parser = parse_stage)]
    stage: Stage,
    /// Pre-setup output file
    #[arg(long)]
    input: PathBuf,
  },

  /// Run the test matrix
  Test {
    #[arg(long)]
    input: PathBuf,
    /// Only run this entry
    #[arg(long)]
    entry: Option<String>,
  },

  /// Run the build matrix
  Build {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    entry: Option<String>,
  },

  /// Run the publish matrix
  Publish {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    entry: Option<String>,
  },

  /// Record the run's outcome from the stage results reported by CI
  PostSetup {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    test_result: String,
    #[arg(long)]
    build_result: String,
    #[arg(long)]
    publish_result: String,
  },

  /// Run the whole pipeline locally
  Run,
}

fn parse_stage(raw: &str) -> Result<Stage, String> {
  Stage::parse(raw).ok_or_else(|| format!("unknown stage '{}' (expected test, build or publish)", raw))
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

/// Diagnostics go to stderr so stdout stays clean for JSON payloads
fn init_tracing() {
  let filter = tracing_subscriber::EnvFilter::new(std::env::var("RAIL_LOG").unwrap_or_else(|_| "tag_rail=info".into()));
  tracing_subscriber::registry()
    .with(filter)
    .with(
      tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr),
    )
    .init();
}

fn main() {
  let cli = Cli::parse();
  init_tracing();

  let current_dir = match std::env::current_dir() {
    Ok(dir) => dir,
    Err(e) => {
      eprintln!("Error: Failed to get current directory: {}", e);
      std::process::exit(1);
    }
  };

  // Resolving the config up front means a bad rail.toml never reaches a tag write
  let ctx = match RepoContext::build(&current_dir) {
    Ok(ctx) => ctx,
    Err(e) => handle_error(e),
  };

  let result = match cli.command {
    Commands::Version { args, json } => commands::run_version(&ctx, &ArgMap::parse(&args), json),
    Commands::Bump { args } => commands::run_bump(&ctx, &ArgMap::parse(&args)),
    Commands::Release { args } => commands::run_release(&ctx, &ArgMap::parse(&args)),
    Commands::Test { args } => commands::run_entries(&ctx, Stage::Test, &ArgMap::parse(&args)),
    Commands::Build { args } => commands::run_entries(&ctx, Stage::Build, &ArgMap::parse(&args)),
    Commands::Publish { args } => commands::run_entries(&ctx, Stage::Publish, &ArgMap::parse(&args)),

    Commands::Pipeline(pipeline_cmd) => match pipeline_cmd {
      PipelineCommands::PreSetup { output } => commands::run_pre_setup(&ctx, output.as_deref()),
      PipelineCommands::Matrix { stage, input } => commands::run_matrix(&ctx, stage, &input),
      PipelineCommands::Test { input, entry } => commands::run_stage(&ctx, Stage::Test, &input, entry.as_deref()),
      PipelineCommands::Build { input, entry } => commands::run_stage(&ctx, Stage::Build, &input, entry.as_deref()),
      PipelineCommands::Publish { input, entry } => {
        commands::run_stage(&ctx, Stage::Publish, &input, entry.as_deref())
      }
      PipelineCommands::PostSetup {
        input,
        test_result,
        build_result,
        publish_result,
      } => commands::run_post_setup(&ctx, &input, &test_result, &build_result, &publish_result),
      PipelineCommands::Run => commands::run_local(&ctx),
    },
  };

  if let Err(err) = result {
    handle_error(err);
  }
}

fn handle_error(err: RailError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
