use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod scrape;

#[derive(Debug, Parser)]
#[command(name = "shelfscan-cli")]
#[command(about = "Multi-tier product extraction for e-commerce pages")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the loaded site profiles
    Profiles,
    /// Fetch and extract product pages, one JSON line per item
    Scrape {
        /// Profile id of the source site
        #[arg(long)]
        site: String,
        /// File with one URL per line; blank lines and `#` comments are skipped
        #[arg(long)]
        input: Option<PathBuf>,
        /// Product page URLs
        urls: Vec<String>,
    },
    /// Run the extraction chain over a saved HTML file
    Extract {
        /// Profile id of the source site
        #[arg(long)]
        site: String,
        /// URL the page was saved from, used to resolve relative links
        #[arg(long)]
        base_url: Option<String>,
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = shelfscan_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("shelfscan-cli: no command given; try --help");
        return Ok(());
    };

    let registry = shelfscan_core::load_profiles(&config.profiles_path)?;
    tracing::debug!(
        env = %config.env,
        profiles = registry.len(),
        path = %config.profiles_path.display(),
        "loaded site profiles"
    );

    match command {
        Commands::Profiles => {
            scrape::run_profiles(&registry);
            Ok(())
        }
        Commands::Scrape { site, input, urls } => {
            let urls = scrape::collect_urls(urls, input.as_deref())?;
            scrape::run_scrape(&config, registry, &site, urls).await
        }
        Commands::Extract {
            site,
            base_url,
            file,
        } => scrape::run_extract(&registry, &site, base_url, &file),
    }
}
