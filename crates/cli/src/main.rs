mod commands;

use adoption_insights_core::{parse_filter_pair, EntityType, Filters};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "adoption-insights")]
#[command(about = "Incremental loader for developer-tool adoption insights", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a single page and print it as JSON
    Fetch {
        /// organization | project | user
        entity: EntityType,
        #[arg(long, default_value = "0")]
        start: usize,
        #[arg(long, default_value = "100")]
        end: usize,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Load an entity type page by page until exhausted
    Watch {
        /// organization | project | user
        entity: EntityType,
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        delay_ms: Option<u64>,
        /// Keep reloading every auto-refresh interval until Ctrl-C
        #[arg(long)]
        auto_refresh: bool,
        /// Stop after this many pages
        #[arg(long)]
        max_pages: Option<usize>,
        /// Print the loaded records instead of a summary
        #[arg(long)]
        print_records: bool,
    },
    /// Print the effective batch loading configuration
    Config,
}

#[derive(Args, Debug, Default)]
pub(crate) struct FilterArgs {
    /// Filter passed to the backend, as key=value (repeatable)
    #[arg(short, long = "filter", value_parser = parse_filter_pair)]
    filter: Vec<(String, Option<String>)>,
}

impl FilterArgs {
    pub(crate) fn into_filters(self) -> Filters {
        self.filter.into_iter().collect()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fetch { entity, start, end, filters } => {
            commands::fetch::run(entity, start, end, filters.into_filters()).await?;
        },
        Commands::Watch {
            entity,
            filters,
            batch_size,
            delay_ms,
            auto_refresh,
            max_pages,
            print_records,
        } => {
            let options = commands::watch::WatchOptions {
                batch_size,
                delay_ms,
                auto_refresh,
                max_pages,
                print_records,
            };
            commands::watch::run(entity, filters.into_filters(), options).await?;
        },
        Commands::Config => commands::config::run()?,
    }

    Ok(())
}
