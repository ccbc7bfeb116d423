mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use lightpath_core::Controller;

use crate::cli::{Cli, Command};
use crate::error::CliError;

fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli) {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "lightpath", &mut std::io::stdout());
            Ok(())
        }

        // Config commands don't need a facility
        Command::Config(args) => {
            let cfg = config::load(&cli.global)?;
            let settings = config::resolve(&cli.global, &cfg)?;
            commands::config_cmd::handle(&args, &cli.global, &cfg, &settings)
        }

        // All other commands load the facility first
        cmd => {
            let cfg = config::load(&cli.global)?;
            let settings = config::resolve(&cli.global, &cfg)?;
            let catalog = config::load_catalog(&cli.global, &cfg)?;
            commands::simulate(&catalog, &cli.global, settings.timeout)?;

            let controller = Controller::new(&catalog, cfg.to_beamline_config()?, None)?;

            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &controller, &settings)
        }
    }
}
