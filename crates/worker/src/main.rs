use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod keyword;
mod partition;
mod split;
mod tree;

#[derive(Debug, Parser)]
#[command(name = "rankscope_worker")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Split the raw exports in the data root into one CSV per country.
    SplitCountries {
        /// Overrides RANKSCOPE_DATA_ROOT.
        #[arg(long)]
        data_root: Option<PathBuf>,
    },

    /// Partition every country's records by category and aggregate each partition.
    Partition(partition::PartitionArgs),

    /// Collect one country's products whose title contains a keyword and aggregate them.
    Keyword(keyword::KeywordArgs),

    /// Convert a flat taxonomy CSV into the nested category tree JSON.
    BuildTree {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut settings = rankscope_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let result = match args.command {
        Command::SplitCountries { data_root } => {
            if let Some(dir) = data_root {
                settings.data_root = dir;
            }
            split::run(&settings).await
        }
        Command::Partition(partition_args) => partition::run(&mut settings, partition_args).await,
        Command::Keyword(keyword_args) => keyword::run(&mut settings, keyword_args).await,
        Command::BuildTree { input, output } => tree::run(&input, &output).await,
    };

    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "worker command failed");
    }
    result
}

fn init_sentry(settings: &rankscope_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
