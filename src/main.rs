use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use intrinio_pull::api::IntrinioClient;
use intrinio_pull::data_collector::{CollectorConfig, DataCollector};
use intrinio_pull::models::{CategoryPolicy, Config, PeriodType, PriceFrequency};
use intrinio_pull::storage::{self, OutputStore};

/// Quarterly fundamentals and price puller
#[derive(Parser, Debug)]
#[command(name = "intrinio-pull")]
#[command(version = "0.1.0")]
#[command(about = "Pull statements and prices for every ticker that filed in the target year")]
#[command(long_about = "
Reads the reference table of tickers, keeps the ones whose latest filing date
falls in the target year, and writes four CSV files per ticker into the output
directory: calculations, price, cash flow and balance sheet.

Credentials and default paths come from the environment (or a .env file):
INTRINIO_USERNAME, INTRINIO_PASSWORD, REFERENCE_TABLE_PATH, OUTPUT_DIR,
TARGET_FILING_YEAR, RATE_LIMIT_PER_MINUTE.

Examples:
  intrinio-pull --start 13331 --end 15000
  intrinio-pull --year 2019 --output-dir data/2019
  intrinio-pull --independent-categories
  intrinio-pull --period-type FY --frequency yearly
")]
struct Args {
    /// First index of the reference table to process
    #[arg(long, short = 's', default_value_t = 0)]
    start: usize,

    /// One past the last index to process (defaults to the end of the table)
    #[arg(long, short = 'e')]
    end: Option<usize>,

    /// Filing year a ticker must have to be pulled
    #[arg(long, short = 'y')]
    year: Option<String>,

    /// Reference table CSV with `ticker` and `latest_filing_date` columns
    #[arg(long, short = 'i')]
    input: Option<PathBuf>,

    /// Directory receiving the CSV files
    #[arg(long, short = 'o')]
    output_dir: Option<PathBuf>,

    /// Statement period type: QTR, FY, TTM or YTD
    #[arg(long, default_value = "QTR")]
    period_type: PeriodType,

    /// Price sampling: daily, weekly, monthly, quarterly or yearly
    #[arg(long, default_value = "quarterly")]
    frequency: PriceFrequency,

    /// Try every category even after one is missing
    #[arg(long)]
    independent_categories: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("intrinio_pull=info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            eprintln!(
                "Make sure you have a .env file with INTRINIO_USERNAME and INTRINIO_PASSWORD."
            );
            return Err(e);
        }
    };
    if let Some(year) = args.year {
        config.target_filing_year = year;
    }
    if let Some(input) = args.input {
        config.reference_table_path = input;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }

    let collector_config = CollectorConfig {
        target_filing_year: config.target_filing_year.clone(),
        start: args.start,
        end: args.end,
        period_type: args.period_type,
        price_frequency: args.frequency,
        category_policy: if args.independent_categories {
            CategoryPolicy::Independent
        } else {
            CategoryPolicy::Abandon
        },
    };

    info!("Reference table: {}", config.reference_table_path.display());
    info!("Output directory: {}", config.output_dir.display());
    info!("Target filing year: {}", collector_config.target_filing_year);
    info!(
        "Index range: [{}, {})",
        collector_config.start,
        collector_config
            .end
            .map(|end| end.to_string())
            .unwrap_or_else(|| "end of table".to_string())
    );
    info!(
        "Periods: {}, price frequency: {}",
        collector_config.period_type.as_query(),
        collector_config.price_frequency.as_query()
    );
    info!("Category policy: {:?}", collector_config.category_policy);
    info!("Provider: {}", config.intrinio_base_url);

    let records = storage::load_reference_table(&config.reference_table_path)?;
    let store = OutputStore::open(&config.output_dir)?;
    let client = IntrinioClient::new(&config).context("Failed to create Intrinio client")?;

    let collector = DataCollector::new(client, store, collector_config);
    let summary = collector.run(&records).await?;

    info!(
        "Done in {}s: {} of {} tickers successful",
        (summary.finished_at - summary.started_at).num_seconds(),
        summary.successful(),
        summary.processed()
    );

    Ok(())
}
