//! Entry point for the `opsgate` command-line tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use opsgate::config::{Config, Options};
use opsgate::orchestrator::Orchestrator;
use opsgate::resources::ResourceSet;
use opsgate::sandbox::Sandbox;
use opsgate::scratch::Scratch;
use opsgate::server::Handler;
use opsgate::tasks::TaskStore;

#[derive(Parser)]
#[command(name = "opsgate")]
#[command(about = "Declarative shell-command and resource gateway", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve requests on stdin/stdout until EOF
    Serve {
        /// Path to the gateway config file
        #[arg(long, short = 'c')]
        config: PathBuf,

        /// Scratch directory for file operations (overrides config)
        #[arg(long)]
        scratch_dir: Option<PathBuf>,

        /// Enable debug logging (overrides config)
        #[arg(long)]
        verbose: bool,

        /// Maximum tracked async tasks (overrides config)
        #[arg(long)]
        max_async_tasks: Option<usize>,
    },

    /// Validate a config file and print a summary
    Verify {
        /// Path to the gateway config file
        #[arg(long, short = 'c')]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            scratch_dir,
            verbose,
            max_async_tasks,
        } => {
            run_serve(config, scratch_dir, verbose, max_async_tasks);
        }
        Commands::Verify { config } => {
            run_verify(config);
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "opsgate=debug" } else { "opsgate=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    // Logs go to stderr; stdout carries the response stream.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_serve(
    config_path: PathBuf,
    scratch_dir: Option<PathBuf>,
    verbose: bool,
    max_async_tasks: Option<usize>,
) {
    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    // A bare --verbose flag means "explicitly on"; absence defers to config.
    let cli_verbose = if verbose { Some(true) } else { None };
    let options = Options::resolve(&config, scratch_dir, cli_verbose, max_async_tasks);
    init_logging(options.verbose);

    let scratch = match options.scratch_dir.as_deref() {
        Some(dir) => match Sandbox::new(dir) {
            Ok(sandbox) => Some(Scratch::new(sandbox)),
            Err(e) => {
                eprintln!("Scratch directory error: {}", e);
                process::exit(1);
            }
        },
        None => None,
    };

    let resources =
        ResourceSet::new(config.resources.clone()).with_workdir(options.scratch_dir.clone());
    let store = TaskStore::with_capacity(options.max_async_tasks);
    let orchestrator = Orchestrator::new(config.tools, store, options.scratch_dir.clone());

    tracing::info!(
        name = %config.name,
        max_async_tasks = options.max_async_tasks,
        scratch = scratch.is_some(),
        "gateway starting"
    );

    let handler = Handler::new(orchestrator, resources, scratch);
    if let Err(e) = handler.run() {
        eprintln!("Server error: {}", e);
        process::exit(1);
    }
}

fn run_verify(config_path: PathBuf) {
    match Config::load(&config_path) {
        Ok(config) => {
            println!("Configuration valid: {}", config_path.display());
            println!();
            println!("  Name: {}", config.name);
            println!("  Tools: {}", config.tools.len());
            for tool in &config.tools {
                let mode = if tool.is_async { "async" } else { "sync" };
                println!(
                    "    {} ({}, timeout {}s)",
                    tool.name,
                    mode,
                    tool.timeout.as_secs()
                );
            }
            println!("  Resources: {}", config.resources.len());
            if let Some(ref dir) = config.scratch_dir {
                println!("  Scratch dir: {}", dir.display());
            }
            if let Some(max) = config.max_async_tasks {
                println!("  Max async tasks: {}", max);
            }
        }
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    }
}
