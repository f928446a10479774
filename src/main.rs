//! Reroute main entry point
//!
//! This is the command-line interface for the Reroute redirect engine.

use anyhow::Context;
use clap::Parser;
use reroute::config::{compute_file_hash, load_config};
use reroute::engine::{Outcome, RedirectEngine};
use reroute::guard::CycleState;
use reroute::source::FileSource;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Reroute: a precedence-ordered redirect engine
///
/// Reroute loads redirect rules from a TOML file, projects them into
/// exact, prefix, and regex lookup tables, and resolves request paths
/// against them. The default mode keeps running and rebuilds the tables
/// whenever the rules file changes on disk.
#[derive(Parser, Debug)]
#[command(name = "reroute")]
#[command(version = "1.0.0")]
#[command(about = "A precedence-ordered redirect engine", long_about = None)]
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

    /// Validate config, load rules, show table sizes, and exit
    #[arg(long, conflicts_with = "resolve")]
    dry_run: bool,

    /// Resolve the given request paths and exit (repeatable)
    #[arg(long, value_name = "PATH")]
    resolve: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    if config.rules.path.is_empty() {
        anyhow::bail!("configuration has no [rules] path; nothing to serve");
    }

    // Load the rules file and build the initial tables
    let source = Arc::new(
        FileSource::load(&config.rules.path)
            .with_context(|| format!("failed to load rules from {}", config.rules.path))?,
    );
    let engine = RedirectEngine::new(&config, source.clone());
    engine.rebuild().context("failed to build redirect tables")?;

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, &engine);
    } else if !cli.resolve.is_empty() {
        handle_resolve(&engine, &cli.resolve);
    } else {
        handle_watch(&engine, &source).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("reroute=info,warn"),
            1 => EnvFilter::new("reroute=debug,info"),
            2 => EnvFilter::new("reroute=trace,debug"),
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

/// Handles the --dry-run mode: shows configuration and table sizes
fn handle_dry_run(config: &reroute::config::Config, engine: &RedirectEngine) {
    println!("=== Reroute Dry Run ===\n");

    println!("Engine Configuration:");
    println!("  Enabled: {}", config.engine.enabled);
    println!(
        "  Default status code: {}",
        config.engine.default_status_code
    );
    println!("  Check duplicates: {}", config.engine.check_duplicates);
    println!("  Check presentation: {}", config.engine.check_presentation);
    println!("  Rebuild on edit: {}", config.engine.rebuild_on_edit);
    println!(
        "  Ignored prefixes ({}):",
        config.engine.ignore_prefixes.len()
    );
    for prefix in &config.engine.ignore_prefixes {
        println!("    - {}", prefix);
    }

    println!("\nCycle Protection:");
    println!("  Enabled: {}", config.cycle_protection.enabled);
    println!("  Max attempts: {}", config.cycle_protection.max_attempts);

    println!("\nSite:");
    println!("  Virtual folder: {:?}", config.site.virtual_folder);
    println!("  Start item: {}", config.site.start_item);
    println!("  Page extension: {}", config.site.page_extension);

    let stats = engine.stats();
    println!("\nRules ({}):", config.rules.path);
    println!("  Exact entries: {}", stats.exact);
    println!("  Prefix entries: {}", stats.prefix);
    println!("  Regex entries: {}", stats.regex);

    println!("\n✓ Configuration is valid");
    println!("✓ {} redirect entries ready", stats.total());
}

/// Handles the --resolve mode: resolves each path once and prints the outcome
fn handle_resolve(engine: &RedirectEngine, paths: &[String]) {
    for raw in paths {
        // A query string may ride along on the path.
        let (path, query) = match raw.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (raw.as_str(), None),
        };

        let mut cycle = CycleState::new();
        match engine.handle(path, query, &mut cycle) {
            Outcome::Redirect(redirect) => {
                println!(
                    "{} -> {} ({})",
                    raw, redirect.target_url, redirect.status_code
                );
            }
            Outcome::Pass(reason) => {
                println!("{} -> no redirect ({:?})", raw, reason);
            }
        }
    }
}

/// Handles the default mode: polls the rules file and rebuilds on change
async fn handle_watch(engine: &RedirectEngine, source: &Arc<FileSource>) -> anyhow::Result<()> {
    let rules_path = source.path().to_path_buf();
    let mut last_hash = compute_file_hash(&rules_path)
        .with_context(|| format!("failed to hash {}", rules_path.display()))?;

    tracing::info!("Watching {} for changes", rules_path.display());
    let mut interval = tokio::time::interval(Duration::from_secs(2));
    interval.tick().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                return Ok(());
            }
            _ = interval.tick() => {
                let hash = match compute_file_hash(&rules_path) {
                    Ok(hash) => hash,
                    Err(e) => {
                        tracing::warn!("Failed to hash rules file: {}", e);
                        continue;
                    }
                };
                if hash == last_hash {
                    continue;
                }
                last_hash = hash;

                tracing::info!("Rules file changed, rebuilding");
                if let Err(e) = source.reload() {
                    tracing::error!("Failed to reload rules, keeping previous set: {}", e);
                    continue;
                }
                if let Err(e) = engine.on_rules_replaced() {
                    tracing::error!("Failed to rebuild redirect tables: {}", e);
                }
            }
        }
    }
}
