use cairn_config::LogFormat;
use cairn_glacier::RetrievalTier;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cairn", version)]
#[command(about = "Incremental backups of a local file tree into a cold-storage archive vault", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, global = true, env = "CAIRN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `cairn_glacier=trace`
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format: text or json
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect and process local changes
    #[command(subcommand)]
    Changes(ChangesCommand),
    /// Manage the vault inventory
    #[command(subcommand)]
    Inventory(InventoryCommand),
    /// Rebuild the index or the local tree from the vault
    #[command(subcommand)]
    Recover(RecoverCommand),
}

#[derive(Debug, Args)]
pub struct TreeArgs {
    /// Root of the backed up tree
    pub path: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum ChangesCommand {
    /// List files added, modified or deleted since the last upload
    Ls(TreeArgs),
    /// Upload local changes to the vault and record them in the index
    Upload(TreeArgs),
    /// Record all local changes in the index without uploading anything
    Commit {
        #[command(flatten)]
        tree: TreeArgs,

        #[arg(long, required = true, hide = true)]
        i_understand_consequences_of_force_commit: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum InventoryCommand {
    /// Ask the vault to prepare a fresh inventory
    Retrieve,
    /// Wait for the newest inventory and print it
    Print,
    /// Delete every archive listed in the newest inventory
    Purge {
        #[arg(long, required = true, hide = true, value_name = "VAULT_NAME")]
        i_really_want_to_delete_all_archives_in_vault: String,
    },
}

#[derive(Debug, Clone, Copy, Default, Args)]
pub struct InventoryJobArgs {
    /// Fail instead of creating an inventory job when none exists
    #[arg(long, conflicts_with = "force_create_inventory_job")]
    pub skip_create_inventory_job: bool,

    /// Create a new inventory job even if one exists
    #[arg(long)]
    pub force_create_inventory_job: bool,
}

#[derive(Debug, Clone, Copy, Default, Args)]
pub struct RetrievalArgs {
    /// Retrieval tier: Expedited, Standard or Bulk (overrides configuration)
    #[arg(long)]
    pub tier: Option<RetrievalTier>,
}

#[derive(Debug, Subcommand)]
pub enum RecoverCommand {
    /// Rebuild the index from the newest vault inventory
    Index {
        #[command(flatten)]
        tree: TreeArgs,
        #[command(flatten)]
        inventory: InventoryJobArgs,
    },
    /// Download every indexed file that is missing or different locally
    Data {
        #[command(flatten)]
        tree: TreeArgs,
        #[command(flatten)]
        retrieval: RetrievalArgs,
    },
    /// Rebuild the index, then download the missing files
    All {
        #[command(flatten)]
        tree: TreeArgs,
        #[command(flatten)]
        inventory: InventoryJobArgs,
        #[command(flatten)]
        retrieval: RetrievalArgs,
    },
}
