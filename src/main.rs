use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::{Generator, generate};
use colored::Colorize;
use std::io;
use std::process;
use tracing_subscriber::EnvFilter;
use vigil::cli::{Cli, Commands};
use vigil::{VigilContext, commands, output};

/// Environment variable holding a `tracing` filter directive
const LOG_ENV: &str = "VIGIL_LOG";

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e:#}", "Error:".red().bold());
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    output::set_verbosity(output::verbosity_from_flags(cli.quiet, cli.verbose));
    init_tracing(cli.verbose);

    if let Commands::Completion { shell } = cli.command {
        print_completions(shell, &mut Cli::command());
        return Ok(());
    }

    let mut ctx = VigilContext::new()?;

    match cli.command {
        Commands::Run { engine } => commands::run::execute(&ctx, engine.into())?,
        Commands::Add {
            engine,
            paths,
            force,
        } => commands::add::execute(&ctx, engine.into(), &paths, force)?,
        Commands::Rm { engine, ids } => commands::rm::execute(&ctx, engine.into(), &ids)?,
        Commands::List { engine } => commands::list::execute(&ctx, engine.into())?,
        Commands::Log { id, limit } => commands::log::execute(&ctx, id, limit)?,
        Commands::Enable { engine } => commands::autostart::execute(&mut ctx, engine.into(), true)?,
        Commands::Disable { engine } => {
            commands::autostart::execute(&mut ctx, engine.into(), false)?;
        }
        Commands::Config { key, value, list } => {
            commands::config::execute(&mut ctx, key.as_deref(), value, list)?;
        }
        Commands::Completion { .. } => {}
    }

    Ok(())
}

/// Log to stderr, filtered by `VIGIL_LOG` (default `info`, `debug` with `-v`)
fn init_tracing(verbose: bool) {
    let default = if verbose { "vigil=debug" } else { "vigil=info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn print_completions<G: Generator>(g: G, cmd: &mut clap::Command) {
    generate(g, cmd, cmd.get_name().to_string(), &mut io::stdout());
}
