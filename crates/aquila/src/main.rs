mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use aquila_core::{CredentialStore, FileBackend, Hub};

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
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

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a hub
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "aquila", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let cfg = aquila_config::load_config_or_default();
            let resolved = config::resolve(&cli.global, &cfg)?;
            tracing::debug!(
                profile = %resolved.profile_name,
                hub = %resolved.hub.url,
                session = %resolved.session_file.display(),
                "resolved hub"
            );

            let store = CredentialStore::open(FileBackend::new(&resolved.session_file))?;
            let hub = Hub::new(resolved.hub, store)?;

            tracing::debug!(command = ?cmd, "dispatching command");
            commands::dispatch(cmd, &hub, &resolved.profile_name, &cli.global).await
        }
    }
}
