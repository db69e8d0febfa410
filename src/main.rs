mod aggregate;
mod config;
mod dedup;
mod export;
mod loader;
mod models;
mod normalize;
mod pipeline;
mod source;
mod taxonomy;
mod utils;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;
use crate::normalize::dates::{Clock, DateExtractor, FixedClock, SystemClock};
use crate::normalize::price::PriceParser;
use crate::pipeline::{Pipeline, PipelineOutput, TARGET_RECENT_PCT, TARGET_UNIQUE_LISTINGS};
use crate::source::{FileSource, ListingSource};
use crate::taxonomy::Taxonomy;

#[derive(Parser)]
#[command(
    name = "rent-intel",
    about = "Rental listing normalization and market aggregation",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize, deduplicate and aggregate raw listings, then export
    Run {
        /// Listing file or directory (default: input.path from config)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output directory (default: output.dir from config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Normalize raw listings and write them as JSON, without aggregating
    Normalize {
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(short, long, default_value = "outputs/normalized_listings.json")]
        output: PathBuf,
    },

    /// Parse a single price string
    Price { text: String },

    /// Extract (year, month) from a single date string
    Date {
        text: String,

        /// Print nothing instead of the current month when unresolved
        #[arg(long)]
        no_fallback: bool,

        /// Pretend today is this date (YYYY-MM-DD)
        #[arg(long, env = "RENT_TODAY")]
        today: Option<NaiveDate>,
    },

    /// Show the housing-type and neighborhood tables in effect
    Taxonomy,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "rent_intel=info,warn",
        1 => "rent_intel=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let mut config = AppConfig::load().context("Failed to load configuration")?;

    match cli.command {
        Command::Run { input, output } => {
            if let Some(input) = input {
                config.input.path = input;
            }
            if let Some(output) = output {
                config.output.dir = output;
            }

            let source = FileSource::new(&config.input.path);
            let out_dir = config.output.dir.clone();
            let out = Pipeline::new(config).run(&source).await?;
            print_summary(&out);
            println!("  Outputs in {:?}", out_dir);
        }

        Command::Normalize { input, output } => {
            if let Some(input) = input {
                config.input.path = input;
            }
            let source = FileSource::new(&config.input.path);
            let pipeline = Pipeline::new(config);

            let raw = source.fetch_listings().await?;
            let n = raw.len();
            let normalized = pipeline.normalize_parallel(raw).await;
            export::write_listings_json(&output, &normalized)?;
            info!("Done: {} / {} listings normalized", normalized.len(), n);
        }

        Command::Price { text } => {
            let p = PriceParser::new().parse(&text);
            match p.monthly_xaf {
                Some(v) => println!("{} XAF / month", utils::fmt_xaf(v)),
                None => println!("unparseable"),
            }
            println!("  currency={}, frequency={}", p.currency, p.frequency);
        }

        Command::Date { text, no_fallback, today } => {
            let clock: Arc<dyn Clock> = match today.or(config.pipeline.reference_date) {
                Some(d) => Arc::new(FixedClock(d)),
                None => Arc::new(SystemClock),
            };
            match DateExtractor::new(clock).extract(&text, !no_fallback) {
                (Some(y), Some(m)) => println!("{}-{:02}", y, m),
                _ => println!("unresolved"),
            }
        }

        Command::Taxonomy => {
            let t = Taxonomy::load_or_degrade(config.taxonomy.path.as_deref());
            println!("Housing types ({}):", t.housing_types.len());
            for cat in &t.housing_types {
                println!("  {:<20} {}", cat.name, cat.keywords.join(", "));
            }
            for city in &t.cities {
                println!("{} ({} neighborhoods):", city.name, city.neighborhoods.len());
                for n in &city.neighborhoods {
                    println!("  {:<20} {}", n.name, n.variants.join(", "));
                }
            }
        }
    }

    Ok(())
}

fn print_summary(out: &PipelineOutput) {
    let s = out.summary();
    let stats = &out.stats;

    println!("─────────────────────────────────");
    println!("  Rent Intelligence - Run Summary");
    println!("─────────────────────────────────");
    println!("  Raw listings      : {}", stats.raw_listings);
    println!("  Normalized        : {} ({} dropped)", stats.normalized, stats.dropped);
    println!("  Unique            : {}", stats.unique);
    println!("  Aggregated groups : {}", stats.groups);
    println!("─────────────────────────────────");
    println!("  Year distribution");
    let dated: usize = s.year_counts.values().sum();
    for (year, n) in &s.year_counts {
        let pct = if dated > 0 { *n as f64 / dated as f64 * 100.0 } else { 0.0 };
        println!("    {} : {} ({:.1}%)", year, n, pct);
    }
    println!("  Recent share      : {:.1}%", s.recent_pct);
    println!("─────────────────────────────────");
    for c in &s.cities {
        println!("  {}", c.city);
        println!("    Neighborhoods : {}", c.neighborhoods);
        println!("    Housing types : {}", c.housing_types);
        println!("    Years         : {} - {}", c.year_min, c.year_max);
        println!("    Groups        : {}", c.groups);
    }
    println!("─────────────────────────────────");
    println!("  Confidence");
    for (tier, n) in &s.confidence_counts {
        println!("    {:<6} : {}", tier, n);
    }
    println!("─────────────────────────────────");
    println!("  Targets");
    println!(
        "    {:<8}{} unique listings (target >= {})",
        verdict(s.meets_volume_target()),
        s.unique_listings,
        TARGET_UNIQUE_LISTINGS
    );
    println!(
        "    {:<8}{:.1}% recent listings (target >= {:.0}%)",
        verdict(s.meets_recency_target()),
        s.recent_pct,
        TARGET_RECENT_PCT
    );
    println!("─────────────────────────────────");
}

fn verdict(ok: bool) -> &'static str {
    if ok { "PASSED" } else { "WARNING" }
}
