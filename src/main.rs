use clap::{Args, Parser, Subcommand};
use envtool::hook::{HookInstaller, InstallOptions, Shell};
use envtool::parse;
use envtool::reconcile::{self, MANAGED_VARS_KEY, ManagedSet};
use std::path::{Path, PathBuf};

const DEFAULT_ENV_FILE: &str = ".env";

#[derive(Parser)]
#[command(
  name = "envtool",
  about = "Keep your shell environment in sync with a .env file",
  version,
  author
)]
struct Cli {
  /// Path to the .env file
  #[arg(long, env = "ENVTOOL_ENV_FILE", default_value = DEFAULT_ENV_FILE, global = true)]
  env_file: PathBuf,

  /// Verbose output (-v for verbose, -vv for very verbose)
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Print shell directives that sync the environment with the .env file
  ///
  /// The output is meant to be evaluated by the shell, e.g.
  /// `eval "$(envtool env bash)"`.
  Env {
    /// Shell to generate directives for
    #[arg(default_value = "bash")]
    shell: String,
  },

  /// Install the prompt hook into shell rc files
  Init(InitArgs),
}

#[derive(Args)]
struct InitArgs {
  /// Path to the bash rc file
  #[arg(long)]
  bashrc: Option<PathBuf>,

  /// Path to the zsh rc file
  #[arg(long)]
  zshrc: Option<PathBuf>,

  /// Modify the user's rc files instead of the system-wide ones
  #[arg(long)]
  user: bool,

  /// Only update the bash configuration
  #[arg(long)]
  bash: bool,

  /// Only update the zsh configuration
  #[arg(long)]
  zsh: bool,

  /// Rc file path and optional env file path; requires exactly one of
  /// --bash or --zsh
  #[arg(num_args = 0..=2)]
  paths: Vec<PathBuf>,
}

fn setup_tracing(verbose: u8) {
  use tracing_subscriber::fmt;
  use tracing_subscriber::prelude::*;

  let log_level = match verbose {
    1 => "debug",
    2 => "trace",
    _ => "info",
  };

  tracing_subscriber::registry()
    .with(fmt::layer())
    .with(tracing_subscriber::EnvFilter::new(
      std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
    ))
    .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  let cli = Cli::parse();

  setup_tracing(cli.verbose);

  match cli.command {
    Commands::Env { shell } => run_env(&shell, &cli.env_file),
    Commands::Init(args) => run_init(&cli.env_file, args),
  }
}

fn run_env(shell: &str, env_file: &Path) -> Result<(), Box<dyn std::error::Error>> {
  Shell::try_from(shell)?;

  // Missing or unreadable env files fail open to an empty mapping so that
  // stale managed variables still get unset.
  let desired = parse::load(env_file).unwrap_or_default();

  let previous_raw = std::env::var(MANAGED_VARS_KEY).unwrap_or_default();
  let previous = ManagedSet::from(previous_raw.as_str());

  print!("{}", reconcile::reconcile(&previous, &desired));

  Ok(())
}

fn run_init(env_file: &Path, args: InitArgs) -> Result<(), Box<dyn std::error::Error>> {
  let InitArgs {
    mut bashrc,
    mut zshrc,
    user,
    bash,
    zsh,
    paths,
  } = args;

  let (update_bash, update_zsh) = match (bash, zsh) {
    (true, false) => (true, false),
    (false, true) => (false, true),
    _ => (true, true),
  };

  if !paths.is_empty() && update_bash && update_zsh {
    return Err(
      "positional rc/env paths are supported only when selecting exactly one shell with --bash or --zsh"
        .into(),
    );
  }

  let mut env_from_args: Option<PathBuf> = None;
  if let Some(rc_path) = paths.first() {
    if update_bash {
      bashrc = Some(rc_path.clone());
    } else {
      zshrc = Some(rc_path.clone());
    }
    env_from_args = paths.get(1).cloned();
  }

  // Only a non-default env file path is worth embedding in the hook.
  let env_for_hook = env_from_args
    .or_else(|| (env_file != Path::new(DEFAULT_ENV_FILE)).then(|| env_file.to_path_buf()))
    .map(|path| path.display().to_string());

  let mut shells = Vec::new();
  if update_bash {
    shells.push(Shell::Bash);
  }
  if update_zsh {
    shells.push(Shell::Zsh);
  }

  let report = HookInstaller::install_with_options(InstallOptions {
    shells,
    bashrc,
    zshrc,
    user,
    env_file: env_for_hook,
  });

  if !report.installed.is_empty() {
    println!("Shell configurations updated:");
    for outcome in &report.installed {
      println!("- {}: {}", outcome.shell, outcome.rc_path.display());
    }
  }
  for (shell, err) in &report.failures {
    eprintln!("- {}: {}", shell, err);
  }

  if report.has_failures() {
    return Err("failed to update one or more shell configurations".into());
  }

  Ok(())
}
