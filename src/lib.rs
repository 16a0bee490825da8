//! Pavewatch - road defect detection CLI tool.
//!
//! This crate turns detector output over camera frames into a geotagged
//! defect ledger, archives repairs and plans repair routes.

#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod geo;
pub mod locking;
pub mod planner;
pub mod store;
pub mod stream;

use clap::Parser;
use cli::{Cli, Command, GlobalArgs, records};
use config::{
    Config, init_config_file, load_config, render_config, resolve_config_path, validate_config,
};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

pub use error::{Error, Result};

/// Main entry point for pavewatch CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.global.verbose, cli.global.quiet);

    // A running stream stops between frames on the first Ctrl+C; anything
    // else cleans up lock files and exits.
    let stop = Arc::new(AtomicBool::new(false));
    let streaming = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        let streaming = Arc::clone(&streaming);
        if let Err(e) = ctrlc::set_handler(move || {
            if streaming.load(Ordering::SeqCst) && !stop.swap(true, Ordering::SeqCst) {
                return;
            }
            locking::cleanup_all_locks();
            std::process::exit(130); // 128 + SIGINT(2)
        }) {
            warn!("Failed to install Ctrl+C handler: {e}");
        }
    }

    // Config commands must work even when the file does not validate.
    if let Command::Config { action } = &cli.command {
        return handle_config_command(*action, &cli.global);
    }

    // Load configuration
    let config = load_config(cli.global.config.as_deref())?;
    validate_config(&config)?;

    if let Command::Stream(args) = &cli.command {
        let store_dir = resolve_store_dir(&cli.global, &config)?;
        streaming.store(true, Ordering::SeqCst);
        let show_progress = !cli.global.quiet && std::io::stderr().is_terminal();
        let result = cli::stream::stream(args, &config, &store_dir, stop, show_progress);
        streaming.store(false, Ordering::SeqCst);
        return result;
    }

    handle_command(cli.command, &cli.global, &config)
}

fn init_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    // Build filter string based on verbosity level.
    // HTTP client internals stay quiet unless tracing everything.
    let filter_str = if quiet {
        "warn".to_string()
    } else {
        match verbose {
            0 => "info,reqwest=warn,hyper_util=warn".to_string(),
            1 => "debug,reqwest=info,hyper_util=info".to_string(),
            _ => "trace".to_string(),
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Store directory from the command line, the config, or the platform data dir.
fn resolve_store_dir(global: &GlobalArgs, config: &Config) -> Result<PathBuf> {
    let dir = match &global.store_dir {
        Some(dir) => dir.clone(),
        None => config.store.resolve_dir()?,
    };
    debug!("Using record store at {}", dir.display());
    Ok(dir)
}

fn handle_command(command: Command, global: &GlobalArgs, config: &Config) -> Result<()> {
    match command {
        Command::Locate { json } => cli::stream::locate(json, config),
        Command::Unlock { force, stale_after } => {
            records::unlock(&resolve_store_dir(global, config)?, force, stale_after)
        }
        command => {
            let store = records::open_store(config, &resolve_store_dir(global, config)?)?;
            match command {
                Command::Submit(args) => cli::stream::submit(&args, config, &store),
                Command::Add(args) => records::add(&args, &store),
                Command::List(args) => records::list(&args, &store),
                Command::Show { id, json } => records::show(id, json, &store),
                Command::Fix {
                    id,
                    technician,
                    notes,
                } => records::fix(id, &technician, &notes, &store),
                Command::Stats { json } => records::stats(json, &store),
                Command::Route(args) => records::route(&args, config, &store),
                Command::Report { output } => records::report(output, &store),
                Command::Stream(_)
                | Command::Config { .. }
                | Command::Locate { .. }
                | Command::Unlock { .. } => Err(Error::Internal {
                    message: "command dispatched to the wrong handler".to_string(),
                }),
            }
        }
    }
}

fn handle_config_command(action: cli::ConfigAction, global: &GlobalArgs) -> Result<()> {
    let path = resolve_config_path(global.config.as_deref())?;
    match action {
        cli::ConfigAction::Init => {
            if init_config_file(&path)? {
                println!("Created configuration file: {}", path.display());
            } else {
                println!("Configuration file already exists: {}", path.display());
            }
        }
        cli::ConfigAction::Show => {
            println!("{}", render_config(&load_config(Some(&path))?)?);
        }
        cli::ConfigAction::Path => println!("{}", path.display()),
    }
    Ok(())
}
