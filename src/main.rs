//! Pull-Frontier main entry point
//!
//! Command-line driver that loads a configuration and runs a simulated crawl
//! through the frontier.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use pull_frontier::config::{load_config_with_hash, Config};
use pull_frontier::crawler::crawl;
use pull_frontier::report::FrontierSnapshot;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Pull-Frontier: a polite URI frontier with pull-based replenishment
///
/// Runs the configured seeds through the frontier with simulated fetch
/// workers and prints the final frontier report.
#[derive(Parser, Debug)]
#[command(name = "pull-frontier")]
#[command(version)]
#[command(about = "A polite URI frontier with pull-based replenishment", long_about = None)]
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

    /// Validate the config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,

    /// Format of the final report
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Toml,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let snapshot = handle_crawl(config).await?;
    print_report(&snapshot, cli.format)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pull_frontier=info,warn"),
            1 => EnvFilter::new("pull_frontier=debug,info"),
            2 => EnvFilter::new("pull_frontier=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: prints the parsed configuration
fn handle_dry_run(config: &Config) {
    println!("=== Pull-Frontier Dry Run ===\n");

    let frontier = &config.frontier;
    println!("Frontier:");
    println!("  Pull trigger level: {}", frontier.pull_trigger_level);
    println!("  Session budget: {}", frontier.balance_replenish_amount);
    match frontier.total_budget() {
        Some(total) => println!("  Total budget: {}", total),
        None => println!("  Total budget: unlimited"),
    }
    println!("  Precedence floor: {}", frontier.precedence_floor);
    println!("  Default precedence: {}", frontier.default_precedence);
    println!("  Max sleep: {}ms", frontier.max_sleep_ms);
    println!(
        "  Hold queues: {} (backlog target {})",
        frontier.hold_queues, frontier.ready_backlog_target
    );
    println!(
        "  Retries: {} (delay {}ms)",
        frontier.max_retries, frontier.retry_delay_ms
    );
    println!(
        "  Flush: timeout {}ms, batch {}",
        frontier.flush_timeout_ms, frontier.flush_batch_size
    );

    println!("\nPoliteness:");
    println!("  Delay factor: {}", config.politeness.delay_factor);
    println!(
        "  Delay bounds: {}ms - {}ms",
        config.politeness.min_delay_ms, config.politeness.max_delay_ms
    );

    println!("\nWorkers:");
    println!("  Count: {}", config.workers.count);
    println!("  Simulated fetch: {}ms", config.workers.simulated_fetch_ms);
    println!(
        "  Links per page: {} (max depth {})",
        config.workers.links_per_page, config.workers.max_depth
    );

    println!("\nSites ({}):", config.sites.len());
    for site in &config.sites {
        let precedence = site.precedence.unwrap_or(frontier.default_precedence);
        println!(
            "  - {} (precedence {}, {} seeds)",
            site.domain,
            precedence,
            site.seeds.len()
        );
        for seed in &site.seeds {
            println!("    * {}", seed);
        }
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling with {} seed URLs",
        config.sites.iter().map(|s| s.seeds.len()).sum::<usize>()
    );
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<FrontierSnapshot> {
    let seed_count: usize = config.sites.iter().map(|s| s.seeds.len()).sum();
    tracing::info!(
        "Sites: {}, seed URLs: {}, workers: {}",
        config.sites.len(),
        seed_count,
        config.workers.count
    );

    let snapshot = crawl(config).await.context("crawl failed")?;
    tracing::info!("Crawl completed successfully");
    Ok(snapshot)
}

fn print_report(snapshot: &FrontierSnapshot, format: ReportFormat) -> anyhow::Result<()> {
    match format {
        ReportFormat::Text => print!("{}", snapshot),
        ReportFormat::Toml => {
            let rendered = snapshot.to_toml().context("failed to render report")?;
            print!("{}", rendered);
        }
    }
    Ok(())
}
