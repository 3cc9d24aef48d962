//! Command handlers. Each module owns one top-level subcommand; the
//! session helper in `util` gives every mutating command the same
//! load → mutate → save shape.

pub mod config_cmd;
pub mod detect;
pub mod import_cmd;
pub mod proxy;
pub mod sites;
pub mod sync_cmd;
pub mod util;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn dispatch(cli: Cli) -> Result<(), CliError> {
    tracing::debug!(command = ?cli.command, "dispatching command");
    match cli.command {
        Command::Sites(args) => sites::handle(args, &cli.global).await,
        Command::Proxy(args) => proxy::handle(args, &cli.global).await,
        Command::Import(args) => import_cmd::handle(args, &cli.global).await,
        Command::Pull => sync_cmd::pull(&cli.global).await,
        Command::Push => sync_cmd::push(&cli.global).await,
        Command::ShowConfig => sync_cmd::show_config(&cli.global).await,
        Command::Detect(args) => detect::handle(args, &cli.global).await,
        Command::Config(args) => config_cmd::handle(args.command, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "frpsite", &mut std::io::stdout());
            Ok(())
        }
    }
}
