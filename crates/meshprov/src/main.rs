mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use meshprov_core::ProvisionerHandle;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose, cli.global.quiet);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, quiet: bool) {
    let filter = match (quiet, verbosity) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(mut cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't touch settings storage
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "meshprov", &mut std::io::stdout());
            Ok(())
        }

        // Slot administration works on closed slots, outside any session
        Command::Settings(args) => {
            let cfg = config::load(&cli.global)?;
            cli.global.output = Some(config::output_format(&cli.global, &cfg));
            let provisioner = config::build_provisioner(&cli.global, &cfg)?;
            let handle = ProvisionerHandle::spawn(provisioner);
            let result = commands::settings::handle(&handle, args, &cli.global).await;
            handle.shutdown().await;
            result
        }

        // Everything else runs inside the selected settings session
        cmd => {
            let cfg = config::load(&cli.global)?;
            cli.global.output = Some(config::output_format(&cli.global, &cfg));
            let provisioner = config::build_provisioner(&cli.global, &cfg)?;
            let session = config::session_id(&cli.global, &cfg);

            tracing::debug!(command = ?cmd, %session, "dispatching command");
            let global = &cli.global;
            ProvisionerHandle::oneshot(provisioner, session, |handle| async move {
                commands::dispatch(cmd, &handle, global).await
            })
            .await
        }
    }
}
