mod cli;
mod commands;
mod error;
mod logging;

use crate::cli::{ChangesCommand, Cli, Command, InventoryCommand, RecoverCommand, RetrievalArgs};
use crate::error::{ErrorKind, Result};
use cairn_config::{Config, LogConfig};
use cairn_glacier::{Connection, RetrievalTier};
use clap::Parser;
use std::io::Write;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let loaded = Config::load(cli.config.as_deref());
    let log = log_config(&cli, loaded.as_ref().map(|c| c.log.clone()).unwrap_or_default());
    if let Err(err) = logging::init(&log) {
        eprintln!("{err:?}");
        return ExitCode::FAILURE;
    }
    let config = match loaded {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("{:?}", err.raise(ErrorKind::Config));
            return ExitCode::FAILURE;
        },
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, stopping");
                cancel.cancel();
            }
        }
    });

    // Stdout locks per write, so no lock is held across an await.
    match run(cli.command, &config, cancel, &mut std::io::stdout()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:?}");
            ExitCode::FAILURE
        },
    }
}

/// Command-line flags override the configured logging.
fn log_config(cli: &Cli, mut log: LogConfig) -> LogConfig {
    if let Some(level) = &cli.log_level {
        log.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        log.format = format;
    }
    log
}

fn tier(config: &Config, args: RetrievalArgs) -> RetrievalTier {
    args.tier.unwrap_or(config.retrieval.tier)
}

async fn run(command: Command, config: &Config, cancel: CancellationToken, out: &mut impl Write) -> Result<()> {
    let volume = &config.volume;
    match command {
        Command::Changes(ChangesCommand::Ls(tree)) => commands::changes::ls(&tree.path, volume, out).await,
        Command::Changes(ChangesCommand::Upload(tree)) => {
            commands::changes::upload(&tree.path, volume, &connect(config, cancel)?).await
        },
        Command::Changes(ChangesCommand::Commit { tree, .. }) => commands::changes::commit(&tree.path, volume).await,
        Command::Inventory(InventoryCommand::Retrieve) => commands::inventory::retrieve(&connect(config, cancel)?).await,
        Command::Inventory(InventoryCommand::Print) => {
            commands::inventory::print(&connect(config, cancel)?, out).await
        },
        Command::Inventory(InventoryCommand::Purge {
            i_really_want_to_delete_all_archives_in_vault: confirmation,
        }) => {
            let connection = connect(config, cancel)?;
            let deleted = commands::inventory::purge(&connection, &config.vault.vault_name, &confirmation).await?;
            tracing::info!(deleted, "Done");
            Ok(())
        },
        Command::Recover(RecoverCommand::Index { tree, inventory }) => {
            commands::recover::index(&tree.path, volume, &connect(config, cancel)?, inventory).await?;
            Ok(())
        },
        Command::Recover(RecoverCommand::Data { tree, retrieval }) => {
            let tier = tier(config, retrieval);
            commands::recover::data(&tree.path, volume, &connect(config, cancel)?, tier).await?;
            Ok(())
        },
        Command::Recover(RecoverCommand::All {
            tree,
            inventory,
            retrieval,
        }) => {
            let tier = tier(config, retrieval);
            commands::recover::all(&tree.path, volume, &connect(config, cancel)?, inventory, tier).await?;
            Ok(())
        },
    }
}

/// Open a connection to the configured vault.
#[cfg(feature = "aws")]
fn connect(config: &Config, cancel: CancellationToken) -> Result<Connection> {
    use cairn_glacier::client::AwsClient;

    config.vault.validate().map_err(|err| err.raise(ErrorKind::Config))?;
    let vault = &config.vault;
    tracing::debug!(vault = %vault.vault_name, region = %vault.region, "Opening connection");
    let client = AwsClient::new(
        vault.account_id.as_str(),
        vault.vault_name.as_str(),
        vault.region.as_str(),
        vault.endpoint.as_deref(),
        vault.key_id.as_str(),
        vault.key_secret.as_str(),
    );
    Ok(Connection::new(client)
        .with_poll_interval(config.poll_interval())
        .with_cancellation_token(cancel))
}

#[cfg(not(feature = "aws"))]
fn connect(config: &Config, _cancel: CancellationToken) -> Result<Connection> {
    config.vault.validate().map_err(|err| err.raise(ErrorKind::Config))?;
    exn::bail!(ErrorKind::NoBackend)
}
