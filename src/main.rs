//! search-wrapper command line entry point

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use search_wrapper::{
    config,
    search::{self, RetryPolicy, RunOptions, SearchLimits, SearchWrapper},
    CredentialPool, Error, OutputMode, ProviderLoader,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "search-wrapper", version)]
#[command(about = "Run a file of queries against a search provider and save the results as XML")]
struct Cli {
    /// Provider name, e.g. google-custom or wikipedia
    #[arg(required_unless_present = "list_providers")]
    provider: Option<String>,

    /// Input file, one `label: query` per line
    #[arg(required_unless_present = "list_providers")]
    input: Option<PathBuf>,

    /// Output XML file
    #[arg(required_unless_present = "list_providers")]
    output: Option<PathBuf>,

    /// Number of results to request per query
    num_results: Option<u64>,

    /// Registration keys file, one key per line
    #[arg(short, long)]
    keys: Option<PathBuf>,

    /// Settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input file encoding (default: byte order mark, else UTF-8)
    #[arg(long)]
    input_encoding: Option<String>,

    /// Output file encoding
    #[arg(long)]
    output_encoding: Option<String>,

    /// Write one record per page instead of one per query
    #[arg(long)]
    per_page: bool,

    /// Maximum number of pages fetched per query
    #[arg(long)]
    max_requests: Option<u32>,

    /// List the available providers and exit
    #[arg(long)]
    list_providers: bool,

    /// More logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut settings = config::load(cli.config.as_deref())?;
    if let Some(n) = cli.num_results {
        settings.search.num_results = n;
    }
    if let Some(n) = cli.max_requests {
        settings.search.max_requests = n;
    }
    if cli.per_page {
        settings.search.combine_pages = false;
    }
    if let Some(label) = cli.input_encoding {
        settings.input.encoding = Some(label);
    }
    if let Some(label) = cli.output_encoding {
        settings.output.encoding = label;
    }
    settings.validate()?;

    let registry = ProviderLoader::load(&settings)?;

    if cli.list_providers {
        for name in registry.names() {
            println!("{name}");
        }
        return Ok(());
    }

    // clap guarantees these unless --list-providers was given
    let (Some(name), Some(input), Some(output)) = (cli.provider, cli.input, cli.output) else {
        anyhow::bail!("provider, input and output are required");
    };

    let provider = registry.resolve(&name)?;
    info!("search-wrapper v{} using provider {}", search_wrapper::VERSION, name);

    let mut wrapper = SearchWrapper::new(provider.clone())
        .with_policy(RetryPolicy::from(&settings.retry))
        .with_limits(SearchLimits::from(&settings.search));

    if provider.is_keyed() {
        let keys = cli.keys.ok_or_else(|| Error::MissingKeys(name.clone()))?;
        let pool = CredentialPool::from_file(&keys)
            .with_context(|| format!("reading keys from {}", keys.display()))?;
        info!("Loaded {} registration keys", pool.len());
        wrapper = wrapper.with_pool(pool);
    } else if cli.keys.is_some() {
        warn!("Provider {} takes no registration keys; ignoring key file", name);
    }

    let options = RunOptions {
        mode: if settings.search.combine_pages {
            OutputMode::Combined
        } else {
            OutputMode::PerPage
        },
        input_encoding: settings.input.encoding()?,
        output_encoding: settings.output.encoding()?,
    };

    let summary = search::run(&mut wrapper, &input, &output, options)
        .await
        .with_context(|| format!("writing {}", output.display()))?;

    info!(
        "Searched {} queries ({} skipped, {} fatal), wrote {} records",
        summary.lines, summary.skipped, summary.fatal_lines, summary.pages_written
    );
    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
