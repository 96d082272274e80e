use clap::{CommandFactory, Parser, Subcommand};
use curconv::cli::{error_message, setup, ui};
use curconv::core::config::Backend;
use curconv::core::log::init_logging;
use curconv::{AppCommand, Overrides};
use std::process::ExitCode;

/// Convert amounts between currencies, e.g. `conv 10 usd to eur`
#[derive(Parser)]
#[command(version, about, args_conflicts_with_subcommands = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    /// Cache backend, overrides the config file
    #[arg(long, global = true, value_enum)]
    backend: Option<Backend>,

    /// Seconds a cached rate stays fresh, overrides the config file
    #[arg(long, global = true, value_name = "SECONDS", value_parser = clap::value_parser!(u64).range(1..))]
    ttl: Option<u64>,

    /// Currency to convert to when the expression names only one
    #[arg(long, value_name = "CODE")]
    to: Option<String>,

    /// Amount and currencies, e.g. `10 usd to eur` or `5.25 gbp`
    #[arg(allow_negative_numbers = true)]
    expression: Vec<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Convert one expression per line of a file (`-` for stdin)
    Batch { file: String },
    /// Drop cached rates from the selected backend
    ClearCache,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let overrides = Overrides {
        backend: cli.backend,
        ttl_secs: cli.ttl,
    };
    let command = match cli.command {
        Some(Commands::Setup) => None,
        Some(Commands::Batch { file }) => Some(AppCommand::Batch { path: file }),
        Some(Commands::ClearCache) => Some(AppCommand::ClearCache),
        None if cli.expression.is_empty() => {
            return match Cli::command().print_help() {
                Ok(()) => ExitCode::SUCCESS,
                Err(_) => ExitCode::FAILURE,
            };
        }
        None => Some(AppCommand::Convert {
            expression: cli.expression.join(" "),
            to: cli.to,
        }),
    };

    let result = match command {
        Some(command) => {
            curconv::run_command(command, cli.config_path.as_deref(), &overrides).await
        }
        None => setup::setup(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Application failed");
            eprintln!(
                "{} {}",
                ui::style_text("error:", ui::StyleType::Error),
                error_message(&e)
            );
            ExitCode::FAILURE
        }
    }
}
