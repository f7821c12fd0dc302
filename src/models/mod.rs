use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// One row of the reference table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickerRecord {
    pub ticker: String,
    #[serde(default)]
    pub latest_filing_date: Option<String>,
}

impl TickerRecord {
    pub fn new(ticker: &str, latest_filing_date: Option<&str>) -> Self {
        Self {
            ticker: ticker.to_string(),
            latest_filing_date: latest_filing_date.map(str::to_string),
        }
    }

    /// Year part of the latest filing date: its first four characters.
    ///
    /// Returns `None` when the table has no filing date for the ticker. A
    /// date shorter than four characters is returned whole.
    pub fn filing_year(&self) -> Option<&str> {
        let date = self.latest_filing_date.as_deref()?.trim();
        if date.is_empty() {
            return None;
        }
        let end = date
            .char_indices()
            .nth(4)
            .map(|(idx, _)| idx)
            .unwrap_or(date.len());
        Some(&date[..end])
    }
}

/// Company directory entry as served by the provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompanyRecord {
    pub ticker: String,
    pub name: Option<String>,
    pub lei: Option<String>,
    pub cik: Option<String>,
    pub latest_filing_date: Option<String>,
}

/// The four datasets pulled for every eligible ticker, in pull order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetCategory {
    Calculations,
    Price,
    CashFlow,
    BalanceSheet,
}

impl DatasetCategory {
    pub const ALL: [DatasetCategory; 4] = [
        DatasetCategory::Calculations,
        DatasetCategory::Price,
        DatasetCategory::CashFlow,
        DatasetCategory::BalanceSheet,
    ];

    /// Filename label. The spellings are what downstream consumers expect.
    pub fn file_label(&self) -> &'static str {
        match self {
            DatasetCategory::Calculations => "fudamentals_calculations",
            DatasetCategory::Price => "price",
            DatasetCategory::CashFlow => "fudamentals_caseflow",
            DatasetCategory::BalanceSheet => "fudamentals_balance",
        }
    }

    /// Short word used in the "Doesnt have ..." console notice
    pub fn notice_word(&self) -> &'static str {
        match self {
            DatasetCategory::Calculations => "calcs",
            DatasetCategory::Price => "price",
            DatasetCategory::CashFlow => "cash",
            DatasetCategory::BalanceSheet => "bal",
        }
    }

    /// Statement fetched for this category; `None` for the price series
    pub fn statement_kind(&self) -> Option<StatementKind> {
        match self {
            DatasetCategory::Calculations => Some(StatementKind::Calculations),
            DatasetCategory::Price => None,
            DatasetCategory::CashFlow => Some(StatementKind::CashFlowStatement),
            DatasetCategory::BalanceSheet => Some(StatementKind::BalanceSheet),
        }
    }

    /// `<TICKER>_<label>.csv`. Path separators in the ticker (`BRK/A`) become
    /// `_` so the file always lands directly in the output directory.
    pub fn file_name(&self, ticker: &str) -> String {
        let ticker: String = ticker
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
            .collect();
        format!("{}_{}.csv", ticker, self.file_label())
    }
}

impl fmt::Display for DatasetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DatasetCategory::Calculations => "calculations",
            DatasetCategory::Price => "price",
            DatasetCategory::CashFlow => "cash_flow",
            DatasetCategory::BalanceSheet => "balance_sheet",
        };
        f.write_str(name)
    }
}

/// Standardized statement families understood by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    BalanceSheet,
    CashFlowStatement,
    Calculations,
}

impl StatementKind {
    pub fn as_query(&self) -> &'static str {
        match self {
            StatementKind::BalanceSheet => "balance_sheet",
            StatementKind::CashFlowStatement => "cash_flow_statement",
            StatementKind::Calculations => "calculations",
        }
    }
}

/// Reporting period granularity for statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeriodType {
    #[default]
    Quarter,
    FiscalYear,
    TrailingTwelveMonths,
    YearToDate,
}

impl PeriodType {
    pub fn as_query(&self) -> &'static str {
        match self {
            PeriodType::Quarter => "QTR",
            PeriodType::FiscalYear => "FY",
            PeriodType::TrailingTwelveMonths => "TTM",
            PeriodType::YearToDate => "YTD",
        }
    }
}

impl FromStr for PeriodType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "QTR" | "QUARTER" => Ok(PeriodType::Quarter),
            "FY" | "YEAR" => Ok(PeriodType::FiscalYear),
            "TTM" => Ok(PeriodType::TrailingTwelveMonths),
            "YTD" => Ok(PeriodType::YearToDate),
            _ => Err(format!("unknown period type '{}' (expected QTR, FY, TTM or YTD)", s)),
        }
    }
}

/// Sampling frequency of a price series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriceFrequency {
    Daily,
    Weekly,
    Monthly,
    #[default]
    Quarterly,
    Yearly,
}

impl PriceFrequency {
    pub fn as_query(&self) -> &'static str {
        match self {
            PriceFrequency::Daily => "daily",
            PriceFrequency::Weekly => "weekly",
            PriceFrequency::Monthly => "monthly",
            PriceFrequency::Quarterly => "quarterly",
            PriceFrequency::Yearly => "yearly",
        }
    }
}

impl FromStr for PriceFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(PriceFrequency::Daily),
            "weekly" => Ok(PriceFrequency::Weekly),
            "monthly" => Ok(PriceFrequency::Monthly),
            "quarterly" => Ok(PriceFrequency::Quarterly),
            "yearly" => Ok(PriceFrequency::Yearly),
            _ => Err(format!(
                "unknown price frequency '{}' (expected daily, weekly, monthly, \
                 quarterly or yearly)",
                s
            )),
        }
    }
}

/// Tabular dataset exactly as returned by the provider.
///
/// Every row is expected to have one cell per column; cells are kept as the
/// provider's text so the written CSV is a direct copy of the response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DataTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row<S: Into<String>>(&mut self, row: impl IntoIterator<Item = S>) {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    /// A table without data rows counts as empty even if it has a header.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// How a failing category affects the rest of the ticker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryPolicy {
    /// First missing category ends the ticker; later categories are not tried.
    #[default]
    Abandon,
    /// Every category is tried regardless of earlier failures.
    Independent,
}

/// Configuration for the application
#[derive(Debug, Clone)]
pub struct Config {
    pub intrinio_username: String,
    pub intrinio_password: String,
    pub intrinio_base_url: String,
    pub reference_table_path: PathBuf,
    pub output_dir: PathBuf,
    pub target_filing_year: String,
    pub rate_limit_per_minute: u32,
    pub page_size: u32,
    pub request_timeout: Option<Duration>,
}

impl Config {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.intrinio.com";

    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Ok(Config {
            intrinio_username: std::env::var("INTRINIO_USERNAME")
                .map_err(|_| anyhow::anyhow!("INTRINIO_USERNAME environment variable required"))?,
            intrinio_password: std::env::var("INTRINIO_PASSWORD")
                .map_err(|_| anyhow::anyhow!("INTRINIO_PASSWORD environment variable required"))?,
            intrinio_base_url: std::env::var("INTRINIO_BASE_URL")
                .unwrap_or_else(|_| Self::DEFAULT_BASE_URL.to_string()),
            reference_table_path: std::env::var("REFERENCE_TABLE_PATH")
                .unwrap_or_else(|_| "test-data/Intrinio_all_symbols.csv".to_string())
                .into(),
            output_dir: std::env::var("OUTPUT_DIR")
                .unwrap_or_else(|_| "test-data/PythonData".to_string())
                .into(),
            target_filing_year: std::env::var("TARGET_FILING_YEAR")
                .unwrap_or_else(|_| "2018".to_string()),
            rate_limit_per_minute: std::env::var("RATE_LIMIT_PER_MINUTE")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .unwrap_or(0),
            page_size: std::env::var("PAGE_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .unwrap_or(100),
            request_timeout: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|secs| secs.parse().ok())
                .map(Duration::from_secs),
        })
    }

    /// Config with the given credentials and every other field at its default
    pub fn with_credentials(username: &str, password: &str) -> Self {
        Config {
            intrinio_username: username.to_string(),
            intrinio_password: password.to_string(),
            intrinio_base_url: Self::DEFAULT_BASE_URL.to_string(),
            reference_table_path: PathBuf::from("test-data/Intrinio_all_symbols.csv"),
            output_dir: PathBuf::from("test-data/PythonData"),
            target_filing_year: "2018".to_string(),
            rate_limit_per_minute: 0,
            page_size: 100,
            request_timeout: None,
        }
    }
}
