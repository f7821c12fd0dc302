use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};

use intrinio_pull::api::{FinancialDataProvider, IntrinioClient};
use intrinio_pull::models::Config;
use intrinio_pull::storage;

/// Refresh the reference table from the provider's company directory
#[derive(Parser)]
#[command(name = "update_company_list")]
#[command(about = "Download every company known to the provider and write the reference table CSV")]
struct Args {
    /// Destination file (defaults to REFERENCE_TABLE_PATH)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let args = Args::parse();
    let config = Config::from_env()?;
    let output = args.output.unwrap_or_else(|| config.reference_table_path.clone());

    info!("Fetching company directory from {}", config.intrinio_base_url);
    let client = IntrinioClient::new(&config)?;
    let companies = client.fetch_company_list().await?;

    let with_filings = companies
        .iter()
        .filter(|company| company.latest_filing_date.is_some())
        .count();
    info!(
        "{} companies, {} with a latest filing date",
        companies.len(),
        with_filings
    );

    storage::write_company_list(&output, &companies)?;
    Ok(())
}
