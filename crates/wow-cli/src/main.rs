//! Words of Wisdom CLI - save short sentences and practice them from the terminal
//!
//! Works offline against guest storage on this device, or against a Supabase
//! project once signed in.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;

#[cfg(test)]
mod tests;

use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::open_context;
use crate::commands::config::run_config;
use crate::commands::migrate::run_migrate;
use crate::commands::notes::run_notes;
use crate::commands::sentences::run_sentences;
use crate::commands::transfer::{run_export, run_import};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wow=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        Cli::command().print_help().map_err(CliError::Io)?;
        println!();
        return Ok(());
    };

    if let Commands::Config { command } = command {
        return run_config(command, cli.profile.as_deref(), cli.guest_dir);
    }

    let context = open_context(cli.guest_dir, cli.profile.as_deref()).await?;
    let notebook = &context.notebook;
    if !notebook.local().is_available() {
        tracing::warn!(
            "Guest storage at {} is unavailable; guest notes cannot be saved",
            context.guest_dir.display()
        );
    }

    match command {
        Commands::Notes { command } => run_notes(notebook, command).await?,
        Commands::Sentences { command } => run_sentences(notebook, command).await?,
        Commands::Import { path } => run_import(notebook, &path)?,
        Commands::Export {
            note,
            output,
            stdout,
        } => run_export(notebook, &note, output.as_deref(), stdout).await?,
        Commands::Auth { command } => run_auth(&context, command).await?,
        Commands::Migrate => run_migrate(notebook).await?,
        Commands::Config { .. } => {}
    }

    Ok(())
}
