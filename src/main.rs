//! statewalk main entry point
//!
//! This is the command-line interface for the statewalk traversal engine.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use statewalk::config::{load_config_with_hash, Config};
use statewalk::crawler::crawl;
use statewalk::events::EventLog;
use statewalk::extract::ExtractorRegistry;
use statewalk::pipeline::{Pipeline, ProcessorContext, ProcessorRegistry};
use statewalk::TraversalGraph;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// statewalk: a state-graph website crawler
///
/// statewalk visits a site as a graph of named states. Each fetched page
/// becomes a typed item routed through post-processors, and the links found
/// on it are followed in their destination state.
#[derive(Parser, Debug)]
#[command(name = "statewalk")]
#[command(version)]
#[command(about = "A state-graph website crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config, build the graph and pipeline, then exit without crawling
    #[arg(long)]
    dry_run: bool,

    /// Fetch directly even if the configuration enables proxies
    #[arg(long)]
    no_proxies: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let events = EventLog::new();
    setup_logging(cli.verbose, cli.quiet, &events);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else {
        handle_crawl(config, config_hash, !cli.no_proxies, events).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Session events always reach the event log, whatever the console shows.
fn setup_logging(verbose: u8, quiet: bool, events: &EventLog) {
    let directives = if quiet {
        // Only show errors
        "error"
    } else {
        match verbose {
            0 => "statewalk=info,warn",
            1 => "statewalk=debug,info",
            2 => "statewalk=trace,debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::new(format!("{},statewalk::events=off", directives));

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(console)
        .with(events.layer())
        .init();
}

/// Handles the --dry-run mode: builds everything a crawl needs, without I/O
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let graph = TraversalGraph::build(&config.traversal, &ExtractorRegistry::default())?;
    let context = ProcessorContext {
        site: config.site.clone(),
        session_dir: PathBuf::from(&config.crawler.output_dir).join("dry-run"),
    };
    let pipeline = Pipeline::from_config(&config.processors, &ProcessorRegistry::default(), &context)?;

    println!("=== statewalk Dry Run ===\n");

    println!("Site: {}", config.site);
    println!("Output directory: {}", config.crawler.output_dir);
    println!("Max concurrent requests: {}", config.crawler.max_concurrent_requests);
    println!("Request timeout: {}ms", config.crawler.request_timeout);
    println!("Max retries: {}", config.crawler.max_retries);

    println!("\nStart URLs ({}):", config.start_urls.len());
    for (state, url) in &config.start_urls {
        println!("  - [{}] {}", state, url);
    }

    println!("\nStates ({}):", graph.states().count());
    for state in graph.states() {
        let edges = graph.get(state);
        if edges.is_empty() {
            println!("  - {} (terminal)", state);
        }
        for edge in edges {
            println!("  - {} -> {} ({} extractors)", state, edge.target, edge.extractors.len());
        }
    }

    println!("\nProcessors: {}", pipeline.len());
    for (state, assignments) in &config.processors {
        for assignment in assignments {
            println!("  - {}: {} ({})", state, assignment.class, assignment.method);
        }
    }

    if config.proxy.enabled {
        println!("\nProxy sources ({}):", config.proxy.sources.len());
        for source in &config.proxy.sources {
            println!("  - {:?}", source);
        }
    } else {
        println!("\nProxies: disabled");
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String, use_proxies: bool, events: EventLog) -> anyhow::Result<()> {
    tracing::info!(
        "Site '{}': {} states, {} start URLs",
        config.site,
        config.traversal.len(),
        config.start_urls.len()
    );

    match crawl(config, Some(config_hash), use_proxies, Some(events)).await {
        Ok(stats) => {
            tracing::info!("Crawl completed successfully");
            stats.print();
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
