use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::sync::Arc;

use tally::config::{Config, DatabaseBackend};
use tally::stats::{classifier, compute_stats, Period, StatsFilter};
use tally::storage::{PostgresStore, SqliteStore, VisitStore};

#[derive(Parser)]
#[command(name = "tally-admin")]
#[command(about = "Tally statistics management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print statistics for a period, optionally filtered by one dimension
    Stats {
        /// Reporting period (day, week, month, year, overall)
        #[arg(long, default_value = "overall")]
        period: String,
        /// Filter dimension (language, url, browser)
        #[arg(long)]
        dimension: Option<String>,
        /// Exact value the dimension must match
        #[arg(long)]
        value: Option<String>,
    },
    /// Show the most recent visit records
    Recent {
        /// Number of records to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let store: Arc<dyn VisitStore> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            Arc::new(SqliteStore::new(&config.database.url, config.database.max_connections).await?)
        }
        DatabaseBackend::Postgres => Arc::new(
            PostgresStore::new(&config.database.url, config.database.max_connections).await?,
        ),
    };

    // Ensure the database is initialized
    store.init().await?;

    match cli.command {
        Commands::Stats {
            period,
            dimension,
            value,
        } => {
            let filter = match (dimension, value) {
                (Some(dimension), Some(value)) => Some(StatsFilter::parse(&dimension, &value)?),
                (None, None) => None,
                _ => anyhow::bail!("--dimension and --value must be supplied together"),
            };

            let records = store.load_all().await?;
            let now = Local::now();
            let stats = compute_stats(&records, Period::parse(&period), filter.as_ref(), &now);

            println!("Total visits:       {}", stats.total_visits);
            println!("Unique visitors:    {}", stats.unique_visitors);
            println!("Recurring visitors: {}", stats.recurring_visitors);
            println!();
            println!(
                "{:<12} {:>8} {:>8} {:>10}",
                "Bucket", "Visits", "Unique", "Recurring"
            );
            println!("{}", "-".repeat(42));
            for (i, label) in stats.bucket_labels.iter().enumerate() {
                println!(
                    "{:<12} {:>8} {:>8} {:>10}",
                    label, stats.visits_series[i], stats.unique_series[i], stats.recurring_series[i]
                );
            }

            print_grouping("By language", &stats.by_language);
            print_grouping("By URL", &stats.by_url);
            print_grouping("By browser", &stats.by_browser);
        }
        Commands::Recent { limit } => {
            let records = store.load_all().await?;
            let total = records.len();
            if total == 0 {
                println!("No visits recorded.");
            } else {
                println!("{:<12} {:<18} {:<24} {}", "Timestamp", "IP", "URL", "Browser");
                println!("{}", "-".repeat(70));
                for record in records.iter().rev().take(limit) {
                    println!(
                        "{:<12} {:<18} {:<24} {}",
                        record.timestamp,
                        record.ip,
                        record.url,
                        classifier::browser_name(&record.user_agent)
                    );
                }
                println!();
                println!("{} of {} total records shown", limit.min(total), total);
            }
        }
    }

    Ok(())
}

fn print_grouping(title: &str, counts: &BTreeMap<String, u64>) {
    if counts.is_empty() {
        return;
    }
    println!();
    println!("{}:", title);
    for (key, count) in counts {
        println!("  {:<30} {}", key, count);
    }
}
