use clap::{CommandFactory, Parser, Subcommand};
use lifeline::config::{AppConfig, ListingSource};
use lifeline::daemon_handler::run_as_daemon;
use lifeline::guard::{GuardOutcome, LifelineGuard};
use lifeline::job::{lead_process_group, registry_from_config, run_program};
use lifeline::snapshot::lister_for;
use lifeline::{core_logic, logger};
use std::env;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Command line options for lifeline
#[derive(Debug, Parser)]
#[command(author, version, about = "Single-instance guard for scheduled jobs", long_about = None)]
struct Cli {
    /// Path to configuration file (YAML). If not provided, search order applies.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print the path that was selected for configuration and exit
    #[arg(long)]
    print_config_path: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the tasks defined by the configuration
    List,
    /// Invoke a task by name, e.g. `backup:lifeline`
    RunTask { name: String },
    /// Run a program unless this exact command line is already running
    Exec {
        /// Where the process table is read from
        #[arg(long, value_enum, default_value = "ps")]
        listing: ListingSource,
        /// Program and arguments
        #[arg(trailing_var_arg = true, required = true, allow_hyphen_values = true)]
        program: Vec<String>,
    },
    /// Launch `<ns>:lifeline` for every job with a schedule
    Schedule {
        /// Detach and log to files. LIFELINE_NO_DAEMON=1 keeps it in the foreground.
        #[arg(long)]
        daemon: bool,
    },
}

fn candidate_config_paths() -> Vec<PathBuf> {
    let mut cands = Vec::new();
    cands.push(PathBuf::from("./lifeline.yaml"));
    cands.push(PathBuf::from("/etc/lifeline/lifeline.yaml"));
    if let Ok(home) = env::var("XDG_CONFIG_HOME") {
        cands.push(PathBuf::from(home).join("lifeline/lifeline.yaml"));
    }
    if let Some(home_dir) = dirs_next::home_dir() {
        cands.push(home_dir.join(".config/lifeline/lifeline.yaml"));
    }
    cands
}

fn resolve_config_path(cli: &Cli) -> PathBuf {
    if let Some(explicit) = &cli.config {
        return explicit.clone();
    }
    if let Ok(env_path) = env::var("LIFELINE_CONFIG") {
        return PathBuf::from(env_path);
    }
    candidate_config_paths()
        .into_iter()
        .find(|cand| cand.exists())
        .unwrap_or_else(|| PathBuf::from("lifeline.yaml"))
}

fn load_config(raw_config_path: &Path) -> anyhow::Result<(AppConfig, PathBuf)> {
    let absolute = std::fs::canonicalize(raw_config_path).map_err(|e| {
        anyhow::anyhow!("cannot access config {}: {}", raw_config_path.display(), e)
    })?;
    let config = AppConfig::load_from_file(&absolute)?;
    Ok((config, absolute))
}

fn env_flag(name: &str) -> bool {
    matches!(
        env::var(name)
            .unwrap_or_else(|_| "0".into())
            .to_ascii_lowercase()
            .as_str(),
        "1" | "true" | "yes"
    )
}

fn exit_code_of(status: std::process::ExitStatus) -> ExitCode {
    match (status.code(), status.signal()) {
        (Some(code), _) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        (None, Some(sig)) => ExitCode::from(u8::try_from(128 + sig).unwrap_or(1)),
        (None, None) => ExitCode::FAILURE,
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let raw_config_path = resolve_config_path(&cli);
    if cli.print_config_path {
        println!("{}", raw_config_path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(ExitCode::from(2));
    };

    match command {
        Commands::Exec { listing, program } => {
            logger::init_foreground_logging(None)?;
            lead_process_group();
            let guard = LifelineGuard::for_current_process(lister_for(listing));
            let outcome = guard.guard(Some(|| run_program(&program[0], &program[1..], None, None)))?;
            Ok(match outcome {
                GuardOutcome::Executed(status) => exit_code_of(status),
                GuardOutcome::SkippedDuplicate { .. } => ExitCode::SUCCESS,
            })
        }
        Commands::List => {
            let (config, _) = load_config(&raw_config_path)?;
            logger::init_foreground_logging(config.log_level.as_deref())?;
            let (registry, _) = registry_from_config(&config)?;
            for task in registry.tasks() {
                if task.prerequisites.is_empty() {
                    println!("{:<32} # {}", task.name, task.description);
                } else {
                    println!(
                        "{:<32} # {} (after {})",
                        task.name,
                        task.description,
                        task.prerequisites.join(", ")
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::RunTask { name } => {
            let (config, _) = load_config(&raw_config_path)?;
            logger::init_foreground_logging(config.log_level.as_deref())?;
            let (registry, _) = registry_from_config(&config)?;
            lead_process_group();
            registry.invoke(&name)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Schedule { daemon } => {
            let (config, absolute_config_path) = load_config(&raw_config_path)?;
            let log_level = config.log_level.clone();
            let shared_config = Arc::new(RwLock::new(config));

            if !daemon || env_flag("LIFELINE_NO_DAEMON") {
                logger::init_foreground_logging(log_level.as_deref())?;
                core_logic::async_runtime(shared_config, absolute_config_path)?;
                return Ok(ExitCode::SUCCESS);
            }

            let config_for_closure = Arc::clone(&shared_config);
            run_as_daemon(shared_config, move || {
                if let Err(e) = core_logic::async_runtime(config_for_closure, absolute_config_path) {
                    tracing::error!(target: "lifeline_sched", error = %e, "scheduler exited with error");
                }
            })?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "lifeline failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
