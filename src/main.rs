mod browser;
mod config;
mod error;
mod features;
mod harvest;
mod parser;
mod record;
mod scraper;
mod sink;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono::Datelike;
use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{
    Config, DEFAULT_RECORDS_FILE, DEFAULT_SEED_URL, DEFAULT_SITE_URL, DEFAULT_URLS_FILE,
    DEFAULT_WORKERS,
};
use crate::harvest::NextControl;
use crate::parser::Strictness;

#[derive(Parser)]
#[command(name = "mtb_scraper", about = "Mountain bike spec scraper for mtbdatabase.com")]
struct Cli {
    /// WebDriver endpoint (default: $WEBDRIVER_URL or http://localhost:9515)
    #[arg(long, global = true)]
    webdriver: Option<String>,
    /// Show the browser window
    #[arg(long, global = true)]
    headed: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum HarvestMode {
    /// One riding style at a time, paging by query parameter
    Category,
    /// Whole listing, clicking "next"
    Pages,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect detail-page URLs into the URL list
    Harvest {
        #[arg(long, default_value = DEFAULT_SEED_URL)]
        seed: String,
        #[arg(long, value_enum, default_value = "category")]
        mode: HarvestMode,
        /// How to find the "next" control in pages mode
        #[arg(long, value_enum, default_value = "css")]
        next: NextControl,
        /// Stop after this many listing pages (per riding style in category mode)
        #[arg(long)]
        max_pages: Option<usize>,
        #[arg(short, long, default_value = DEFAULT_URLS_FILE)]
        output: PathBuf,
    },
    /// List result links of one page over plain HTTP
    Links {
        #[arg(long, default_value = DEFAULT_SITE_URL)]
        url: String,
    },
    /// Scrape every URL of the list into the record file
    Scrape {
        #[arg(short, long, default_value = DEFAULT_URLS_FILE)]
        input: PathBuf,
        #[arg(short, long, default_value = DEFAULT_RECORDS_FILE)]
        output: PathBuf,
        #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
        workers: usize,
        /// Keep partial records when landmarks are missing
        #[arg(long)]
        lenient: bool,
        /// Truncate the record file instead of resuming
        #[arg(long)]
        fresh: bool,
        /// Max pages to scrape (default: all pending)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Extract one record from a saved detail page
    Parse {
        html: PathBuf,
        /// URL the page was saved from
        #[arg(long)]
        url: String,
        #[arg(long)]
        lenient: bool,
    },
    /// Build modeling features from a listings table
    Features {
        #[arg(short, long, default_value = "spoj_updated.csv")]
        input: PathBuf,
        #[arg(short, long, default_value = "features.csv")]
        output: PathBuf,
        #[arg(long, default_value = "pipeline.json")]
        pipeline: PathBuf,
        /// Year ages are computed against (default: current year)
        #[arg(long)]
        reference_year: Option<i32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let base = Config::load(cli.webdriver, !cli.headed);

    let result = match cli.command {
        Commands::Harvest {
            seed,
            mode,
            next,
            max_pages,
            output,
        } => {
            let config = Config {
                max_pages,
                output,
                ..base
            };
            let urls = match mode {
                HarvestMode::Category => harvest::harvest_by_category(&config, &seed).await?,
                HarvestMode::Pages => harvest::harvest(&config, &seed, next).await?,
            };
            if urls.is_empty() {
                println!("No bike URLs found. Check the seed URL and WebDriver.");
                return Ok(());
            }
            sink::save_urls(&config.output, &urls)?;
            println!("Saved {} bike URLs to {}", urls.len(), config.output.display());
            Ok(())
        }
        Commands::Links { url } => {
            let links = harvest::fetch_listing_links(&url).await?;
            for link in &links {
                println!("{}", link);
            }
            println!("\n{} links", links.len());
            Ok(())
        }
        Commands::Scrape {
            input,
            output,
            workers,
            lenient,
            fresh,
            limit,
        } => {
            let config = Arc::new(Config {
                input,
                output,
                workers,
                strictness: strictness(lenient),
                ..base
            });

            let urls = sink::read_urls(&config.input)?;
            let done = if fresh {
                Default::default()
            } else {
                sink::existing_urls(&config.output)?
            };
            let (mut pending, skipped) = scraper::pending_urls(urls, &done);
            if let Some(n) = limit {
                pending.truncate(n);
            }
            if pending.is_empty() {
                println!("Nothing to scrape ({} already done). Run 'harvest' first or pass --fresh.", skipped);
                return Ok(());
            }

            println!(
                "Scraping {} pages with {} workers (streaming to {})...",
                pending.len(),
                config.workers,
                config.output.display()
            );
            let mut out = sink::RecordSink::open(&config.output, fresh)?;
            let worker_config = Arc::clone(&config);
            let mut stats = scraper::scrape_pages_streaming(
                &mut out,
                pending,
                config.workers,
                move |url: String| {
                    let config = Arc::clone(&worker_config);
                    async move { browser::fetch_detail(&config, &url).await }
                },
            )
            .await?;
            stats.skipped = skipped;
            println!(
                "Done: {} scraped ({} ok, {} errors, {} skipped).",
                stats.total, stats.ok, stats.errors, stats.skipped
            );
            Ok(())
        }
        Commands::Parse { html, url, lenient } => {
            let source = std::fs::read_to_string(&html)
                .with_context(|| format!("Failed to read {}", html.display()))?;
            let record = parser::parse_detail_page(&source, &url, strictness(lenient))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Commands::Features {
            input,
            output,
            pipeline,
            reference_year,
        } => {
            let year = reference_year.unwrap_or_else(|| chrono::Local::now().year());
            let listings = features::load_listings(&input)?;
            let loaded = listings.len();
            let rows = features::engineer(listings, year);
            println!("Kept {} of {} listings (reference year {})", rows.len(), loaded, year);

            println!("\nCategories:");
            for (feature, counts) in features::category_counts(&rows) {
                println!("\n{}:", feature);
                for (value, n) in counts {
                    println!("  {:<20} {:>6}", value, n);
                }
            }

            let fitted = features::Preprocessor::fit(&rows);
            let matrix = fitted.transform(&rows);
            println!(
                "\nDesign matrix: {} rows x {} columns",
                matrix.len(),
                fitted.feature_names().len()
            );

            features::write_rows(&output, &rows)?;
            features::write_pipeline(&pipeline, &fitted)?;
            println!("Wrote {} and {}", output.display(), pipeline.display());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn strictness(lenient: bool) -> Strictness {
    if lenient {
        Strictness::Lenient
    } else {
        Strictness::Strict
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
