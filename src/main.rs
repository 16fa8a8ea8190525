//! Busy Bee TODO tracker CLI entry point.

use bbt::cli::commands;
use bbt::cli::{Cli, Commands};
use bbt::config::Settings;
use bbt::error::Error;
use bbt::model::TodoStatus;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: --json OR non-TTY stdout
    let json = cli.json || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,reqwest=info,hyper_util=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    // Completions need no workspace.
    if let Commands::Completions { shell } = &cli.command {
        return commands::completions::execute(shell);
    }

    let settings = Settings::resolve(
        cli.workspace.as_deref(),
        cli.backend_url.as_deref(),
        cli.offline,
    )?;

    match &cli.command {
        Commands::Status => commands::status::execute(&settings, json),
        Commands::Scan { file } => commands::scan::execute(&settings, file.as_deref(), json),
        Commands::List(args) => commands::list::execute(&settings, args, json),

        // Item mutations
        Commands::Add(args) => commands::item::execute_add(&settings, args, json),
        Commands::Resolve { id } => {
            commands::item::execute_status(&settings, id, TodoStatus::Resolved, json)
        }
        Commands::Start { id } => {
            commands::item::execute_status(&settings, id, TodoStatus::InProgress, json)
        }
        Commands::Reopen { id } => {
            commands::item::execute_status(&settings, id, TodoStatus::Open, json)
        }
        Commands::Edit(args) => commands::item::execute_edit(&settings, args, json),

        // Remote
        Commands::Sync(args) => commands::sync::execute(&settings, args, json),
        Commands::Projects => commands::sync::execute_projects(&settings, json),
        Commands::Binding { command } => {
            commands::sync::execute_binding(&settings, *command, json)
        }

        Commands::Remind(args) => commands::remind::execute(&settings, args, json),
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
