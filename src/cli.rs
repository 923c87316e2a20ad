//! Command-line driver.
//!
//! `aimlbot run` learns AIML files and drops into an interactive loop;
//! `aimlbot check` validates files and reports parse errors with their
//! source location.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::kernel::{Kernel, GLOBAL_SESSION};
use crate::parser;

#[derive(Parser)]
#[command(name = "aimlbot")]
#[command(about = "An AIML 1.0.1 chat bot interpreter", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Learn AIML files and start an interactive chat loop
    Run {
        /// AIML files or glob patterns to learn
        files: Vec<String>,

        /// Load a previously saved brain before learning
        #[arg(long)]
        brain: Option<PathBuf>,

        /// Save the brain after learning and exit
        #[arg(long)]
        save_brain: Option<PathBuf>,

        /// Substitution file (Windows-INI format)
        #[arg(long)]
        subs: Option<PathBuf>,

        /// The bot's name
        #[arg(long, default_value = "Nameless")]
        name: String,

        /// Keep sessions on disk, one file per session
        #[arg(long)]
        persistent_sessions: bool,

        /// Directory for persistent session files
        #[arg(long, default_value = "sessions")]
        sessions_dir: PathBuf,
    },
    /// Validate AIML files without learning them
    Check {
        /// AIML files to validate
        files: Vec<String>,
    },
}

/// Entry point for the CLI
pub fn run_cli() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "aimlbot=debug" } else { "aimlbot=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            files,
            brain,
            save_brain,
            subs,
            name,
            persistent_sessions,
            sessions_dir,
        } => cmd_run(files, brain, save_brain, subs, name, persistent_sessions, sessions_dir),
        Commands::Check { files } => cmd_check(files),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    files: Vec<String>,
    brain: Option<PathBuf>,
    save_brain: Option<PathBuf>,
    subs: Option<PathBuf>,
    name: String,
    persistent_sessions: bool,
    sessions_dir: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let kernel = Kernel::new();
    kernel.set_bot_predicate("name", &name);
    if persistent_sessions {
        kernel.persistent_sessions(true, Some(&sessions_dir))?;
    }
    if let Some(path) = &subs {
        kernel.load_subs(path)?;
    }

    kernel.bootstrap(brain.as_deref(), &files, &[])?;

    if let Some(path) = &save_brain {
        kernel.save_brain(path)?;
        return Ok(());
    }

    println!(
        "{} ready ({} categories). Type your input; ctrl-d exits.",
        kernel.version(),
        kernel.num_categories()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        print!("> ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        println!("{}", kernel.respond(input, GLOBAL_SESSION));
    }

    Ok(())
}

fn cmd_check(files: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut checked = 0usize;
    let mut failures = 0usize;

    for pattern in &files {
        for entry in glob::glob(pattern)? {
            let path = entry?;
            checked += 1;
            let source = fs::read_to_string(&path)?;
            match parser::parse(&source) {
                Ok(categories) => {
                    println!("{}: {} categories", path.display(), categories.len());
                }
                Err(e) => {
                    failures += 1;
                    eprintln!("{}:\n{}", path.display(), e.display_with_source(&source));
                }
            }
        }
    }

    if checked == 0 {
        return Err("no files matched".into());
    }
    if failures > 0 {
        return Err(format!("{} of {} file(s) failed validation", failures, checked).into());
    }
    println!("{} file(s) passed validation", checked);
    Ok(())
}
