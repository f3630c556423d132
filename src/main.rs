//! # gluegen
//!
//! CLI tool for generating C initialization/dispatch/serialization glue
//! from annotated source files.
//!
//! ## Usage
//!
//! ```bash
//! # Generate glue for explicitly listed sources
//! gluegen generate src/autojump.c src/demrec.c
//!
//! # Discover annotated sources under a directory
//! gluegen generate --input src
//!
//! # Watch mode for development
//! gluegen generate --input src --watch
//!
//! # Dry run to preview artifacts
//! gluegen generate --input src --dry-run
//!
//! # Initialize configuration
//! gluegen init
//! ```

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

use gluegen::{
    config::{CliArgs, Config, ConfigManager},
    driver,
    error::CliError,
    scanner::SourceScanner,
    watcher::FileWatcher,
    writer::{FileWriter, WriteResult},
};

#[derive(Parser)]
#[command(name = "gluegen")]
#[command(author, version, about = "Generate C glue code from annotated sources", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate glue headers from annotated source files
    Generate {
        /// Input source files; discovered from --input when empty
        inputs: Vec<PathBuf>,

        /// Directory to discover annotated sources in
        #[arg(short, long, default_value = ".")]
        input: PathBuf,

        /// Output directory for generated headers
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Watch for file changes and regenerate
        #[arg(short, long)]
        watch: bool,

        /// Preview artifacts without writing files
        #[arg(long)]
        dry_run: bool,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Filter discovered files by path pattern (glob)
        #[arg(long)]
        filter: Option<String>,
    },

    /// Initialize a new gluegen configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = gluegen::config::CONFIG_FILENAME)]
        output: PathBuf,

        /// Overwrite existing configuration file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            // metadata inconsistencies get their own exit code so build
            // systems can tell them apart from environmental failures
            if e.is_metadata_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Generate {
            inputs,
            input,
            out_dir,
            watch,
            dry_run,
            config,
            filter,
        } => {
            let config = ConfigManager::load(config.as_deref())?;
            let config = ConfigManager::merge_cli_args(config, &CliArgs { out_dir });

            if watch {
                run_watch_mode(&inputs, &input, &config, filter.as_deref(), dry_run)
            } else {
                run_generate(&inputs, &input, &config, filter.as_deref(), dry_run)
            }
        }

        Commands::Init { output, force } => cmd_init(output, force),
    }
}

/// Resolve the input file list: explicit paths win, otherwise discover
/// annotated sources under the input directory.
fn resolve_inputs(
    inputs: &[PathBuf],
    input_dir: &PathBuf,
    config: &Config,
    filter: Option<&str>,
) -> Result<Vec<PathBuf>, CliError> {
    if !inputs.is_empty() {
        return Ok(inputs.to_vec());
    }

    let mut scanner = SourceScanner::new(input_dir, &config.input.extension);
    if let Some(pattern) = filter {
        scanner = scanner.with_filter(pattern)?;
    }
    scanner.scan()
}

/// Run glue generation once.
fn run_generate(
    inputs: &[PathBuf],
    input_dir: &PathBuf,
    config: &Config,
    filter: Option<&str>,
    dry_run: bool,
) -> Result<(), CliError> {
    println!("{}", "Collecting annotated sources...".cyan());

    let files = resolve_inputs(inputs, input_dir, config, filter)?;
    println!("  Found {} source file(s)", files.len().to_string().green());

    println!("{}", "Generating glue headers...".cyan());

    let writer = FileWriter::new(dry_run);
    let results = driver::run(&files, config, &writer)?;

    for result in &results {
        match result {
            WriteResult::Written { path, bytes } => {
                println!(
                    "{} Written {} bytes to {}",
                    "✓".green(),
                    bytes,
                    path.display()
                );
            }
            WriteResult::DryRun { content, path } => {
                println!(
                    "{} Would write to {}:",
                    "[dry-run]".yellow(),
                    path.display()
                );
                println!("{}", "─".repeat(60).dimmed());
                println!("{}", content);
                println!("{}", "─".repeat(60).dimmed());
            }
        }
    }

    Ok(())
}

/// Run in watch mode.
fn run_watch_mode(
    inputs: &[PathBuf],
    input_dir: &PathBuf,
    config: &Config,
    filter: Option<&str>,
    dry_run: bool,
) -> Result<(), CliError> {
    println!("{}", "Starting watch mode...".cyan());
    println!("  Watching: {}", input_dir.display());
    println!("  Press Ctrl+C to stop\n");

    // Initial generation
    if let Err(e) = run_generate(inputs, input_dir, config, filter, dry_run) {
        println!("{} {}", "Generation error:".red(), e);
    }

    let watcher = FileWatcher::new(input_dir, &config.input.extension);
    let (_debouncer, rx) = watcher.watch()?;

    println!("\n{}", "Watching for changes...".cyan());

    while let Ok(event) = rx.recv() {
        if event.is_error() {
            println!(
                "{} {}",
                "Watch error:".red(),
                event.error_message().unwrap_or("Unknown error")
            );
            continue;
        }

        if let Some(path) = event.path() {
            println!("\n{} {}", "File changed:".cyan(), path.display());
        }

        if let Err(e) = run_generate(inputs, input_dir, config, filter, dry_run) {
            println!("{} {}", "Generation error:".red(), e);
        }

        println!("\n{}", "Watching for changes...".cyan());
    }

    Ok(())
}

/// Init command implementation.
fn cmd_init(output: PathBuf, force: bool) -> Result<(), CliError> {
    if output.exists() && !force {
        println!(
            "{} Configuration file already exists: {}",
            "Error:".red(),
            output.display()
        );
        println!("  Use --force to overwrite");
        return Err(CliError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "configuration file already exists",
        )));
    }

    let content = ConfigManager::default_config_content();
    std::fs::write(&output, content)?;

    println!(
        "{} Created configuration file: {}",
        "✓".green(),
        output.display()
    );

    Ok(())
}

/// Print an error with formatting.
fn print_error(error: &CliError) {
    eprintln!("{} {}", "Error:".red().bold(), error);
}
