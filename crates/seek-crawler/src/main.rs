//! Seek crawler CLI - crawl job search results or serve the crawl API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use seek_crawler::output::{save_json, DEFAULT_OUTPUT_FILE};
use seek_crawler::server::{run_server, ServerState};
use seek_crawler::{ChromiumBackend, ChromiumFactory, CrawlRequest, CrawlerConfig};

/// Seek crawler - collect job listings from search results.
#[derive(Parser)]
#[command(name = "seek-crawler")]
#[command(about = "Crawl SEEK job search results into JSON")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one crawl and write the listings to a JSON file
    Crawl {
        /// Search results URL to start from
        #[arg(long)]
        search_url: String,

        /// Stop at the first listing older than this (e.g. "1d ago")
        #[arg(long)]
        posted_time_limit: Option<String>,

        /// Maximum number of result pages to visit
        #[arg(long)]
        max_pages: Option<u32>,

        /// Maximum number of listings to collect
        #[arg(long)]
        num_jobs: Option<u32>,

        /// Output file
        #[arg(long, short, default_value = DEFAULT_OUTPUT_FILE)]
        output: PathBuf,
    },

    /// Serve the crawl API over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, env = "SEEK_CRAWLER_ADDR", default_value = "0.0.0.0:8080")]
        addr: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("seek_crawler=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("seek_crawler=info,warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = CrawlerConfig::from_env();

    match cli.command {
        Commands::Crawl {
            search_url,
            posted_time_limit,
            max_pages,
            num_jobs,
            output,
        } => {
            let request = CrawlRequest {
                search_url,
                posted_time_limit,
                max_pages,
                num_jobs,
            };
            run_crawl(&request, &config, output).await
        }
        Commands::Serve { addr } => {
            tracing::info!(addr, base_url = %config.base_url, "Starting crawl API");
            let factory = ChromiumFactory::new(config.browser.clone());
            let state = Arc::new(ServerState::new(factory, config));
            run_server(state, &addr).await
        }
    }
}

async fn run_crawl(request: &CrawlRequest, config: &CrawlerConfig, output: PathBuf) -> Result<()> {
    println!(
        "{}",
        format!("Crawling {}...", request.search_url).cyan()
    );

    let started = Instant::now();
    let backend = ChromiumBackend::new(config.browser.clone());
    let report = seek_crawler::crawl(backend, request, config)
        .await
        .context("Crawl failed")?;

    save_json(&output, &report.jobs)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("\n{}", "Crawl Summary".bold());
    println!("   Jobs: {}", report.jobs.len().to_string().green());
    println!("   Pages: {}", report.pages_visited);
    println!("   Stopped: {}", report.stop_reason.to_string().yellow());
    println!("   Output: {}", output.display());
    println!(
        "{}",
        format!(
            "Execution time: {:.2} seconds",
            started.elapsed().as_secs_f64()
        )
        .cyan()
    );

    Ok(())
}
