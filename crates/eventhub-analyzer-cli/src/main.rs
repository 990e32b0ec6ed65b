//! CLI for eventhub-analyzer: partition throughput and ownership from checkpoint stores.

mod commands;

use clap::{ArgAction, Args, Parser, Subcommand};
use eventhub_analyzer_core::blob::DEFAULT_TIMEOUT;

#[derive(Parser)]
#[command(name = "eventhub-analyzer")]
#[command(about = "eventhub-analyzer: is every partition being consumed, how fast, and by whom?")]
#[command(version = eventhub_analyzer_core::VERSION)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Where the checkpoint store lives.
#[derive(Args, Debug, Clone)]
pub struct StorageArgs {
    /// The connection string of the storage account. Can instead be given
    /// using the STORAGE_ACCOUNT_CONNECTION_STRING environment variable.
    #[arg(
        short = 'c',
        long,
        env = "STORAGE_ACCOUNT_CONNECTION_STRING",
        hide_env_values = true
    )]
    pub connection_string: String,

    /// The name of the container in which the event hub offsets are stored.
    /// Can instead be given using the CONTAINER_NAME environment variable.
    #[arg(short = 'n', long, env = "CONTAINER_NAME")]
    pub container_name: String,

    /// HTTP timeout for blob listing requests, in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub timeout_sec: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze offsets per partition: events and bytes per second since the last run
    Offsets {
        #[command(flatten)]
        storage: StorageArgs,

        /// File holding the snapshot from the previous run (replaced on every run)
        #[arg(long, env = "EVENTHUB_ANALYZER_DATA_FILE", default_value = "data.json")]
        data_file: String,

        /// Also write the results as JSON
        #[arg(long)]
        output: Option<String>,
    },

    /// Analyze owners of partitions
    Owners {
        #[command(flatten)]
        storage: StorageArgs,

        /// Count each (owner, partition) pair once instead of every ownership record
        #[arg(long)]
        distinct_partitions: bool,

        /// Also write the results as JSON
        #[arg(long)]
        output: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Offsets {
            storage,
            data_file,
            output,
        } => commands::offsets::run(&storage, &data_file, output.as_deref()),
        Commands::Owners {
            storage,
            distinct_partitions,
            output,
        } => commands::owners::run(&storage, distinct_partitions, output.as_deref()),
    }
}
