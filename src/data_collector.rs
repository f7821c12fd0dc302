use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::api::FinancialDataProvider;
use crate::models::{
    CategoryPolicy, DataTable, DatasetCategory, PeriodType, PriceFrequency, TickerRecord,
};
use crate::storage::OutputStore;

/// Settings for one pull over the reference table
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub target_filing_year: String,
    /// First table index to process
    pub start: usize,
    /// One past the last index; `None` runs to the end of the table
    pub end: Option<usize>,
    pub period_type: PeriodType,
    pub price_frequency: PriceFrequency,
    pub category_policy: CategoryPolicy,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            target_filing_year: "2018".to_string(),
            start: 0,
            end: None,
            period_type: PeriodType::Quarter,
            price_frequency: PriceFrequency::Quarterly,
            category_policy: CategoryPolicy::Abandon,
        }
    }
}

/// Terminal state of a single ticker
#[derive(Debug, Clone, PartialEq)]
pub enum TickerOutcome {
    NoFilingData,
    WrongFilingYear { filing_year: String },
    /// Categories that came back empty or unavailable, in pull order
    MissingCategories(Vec<DatasetCategory>),
    Successful,
}

/// What happened to one row of the reference table
#[derive(Debug, Clone, PartialEq)]
pub struct TickerReport {
    pub index: usize,
    pub ticker: String,
    pub outcome: TickerOutcome,
    pub target_filing_year: String,
    /// Files written for this ticker, whatever the outcome
    pub files: Vec<PathBuf>,
}

impl TickerReport {
    /// Console lines for this ticker
    pub fn notices(&self) -> Vec<String> {
        let ignored = |reason: String| {
            format!("{} ({}) Ignored - {}.", self.ticker, self.index, reason)
        };
        match &self.outcome {
            TickerOutcome::NoFilingData => vec![ignored("No filing data".to_string())],
            TickerOutcome::WrongFilingYear { .. } => {
                vec![ignored(format!("Didnt file in {}", self.target_filing_year))]
            }
            TickerOutcome::MissingCategories(categories) => categories
                .iter()
                .map(|category| ignored(format!("Doesnt have {}", category.notice_word())))
                .collect(),
            TickerOutcome::Successful => {
                vec![format!("{} ({}) Successful.", self.ticker, self.index)]
            }
        }
    }
}

impl fmt::Display for TickerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.notices().join("\n"))
    }
}

/// Counts and reports for a finished pull
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reports: Vec<TickerReport>,
}

impl RunSummary {
    fn count(&self, predicate: impl Fn(&TickerOutcome) -> bool) -> usize {
        self.reports.iter().filter(|report| predicate(&report.outcome)).count()
    }

    pub fn processed(&self) -> usize {
        self.reports.len()
    }

    pub fn successful(&self) -> usize {
        self.count(|outcome| matches!(outcome, TickerOutcome::Successful))
    }

    pub fn no_filing_data(&self) -> usize {
        self.count(|outcome| matches!(outcome, TickerOutcome::NoFilingData))
    }

    pub fn wrong_filing_year(&self) -> usize {
        self.count(|outcome| matches!(outcome, TickerOutcome::WrongFilingYear { .. }))
    }

    pub fn missing_categories(&self) -> usize {
        self.count(|outcome| matches!(outcome, TickerOutcome::MissingCategories(_)))
    }

    pub fn files_written(&self) -> usize {
        self.reports.iter().map(|report| report.files.len()).sum()
    }
}

/// Result of one category attempt
enum CategoryFetch {
    Fetched(DataTable),
    Missing,
}

/// Pulls statements and prices for each eligible ticker and writes them to
/// the output store
pub struct DataCollector<P> {
    provider: P,
    store: OutputStore,
    config: CollectorConfig,
}

impl<P: FinancialDataProvider> DataCollector<P> {
    pub fn new(provider: P, store: OutputStore, config: CollectorConfig) -> Self {
        Self {
            provider,
            store,
            config,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Walk `records[start..end]` in order, printing one notice per outcome.
    ///
    /// Missing data never stops the run. Transport, authentication and disk
    /// errors do, and are returned as-is.
    pub async fn run(&self, records: &[TickerRecord]) -> Result<RunSummary> {
        let started_at = Utc::now();
        let requested_end = self.config.end.unwrap_or(records.len());
        let end = if requested_end > records.len() {
            warn!(
                "Index range end {} is past the table ({} rows); stopping at {}",
                requested_end,
                records.len(),
                records.len()
            );
            records.len()
        } else {
            requested_end
        };
        let start = self.config.start.min(end);

        info!(
            "Pulling tickers [{}, {}) for filing year {}",
            start, end, self.config.target_filing_year
        );

        let mut reports = Vec::with_capacity(end - start);
        for (index, record) in records.iter().enumerate().take(end).skip(start) {
            let report = self.process_ticker(index, record).await?;
            for notice in report.notices() {
                println!("{}", notice);
            }
            reports.push(report);
        }

        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            reports,
        };

        info!(
            "Pull finished: {} tickers, {} successful, {} without filing data, \
             {} filed in another year, {} missing data, {} files written",
            summary.processed(),
            summary.successful(),
            summary.no_filing_data(),
            summary.wrong_filing_year(),
            summary.missing_categories(),
            summary.files_written()
        );

        Ok(summary)
    }

    /// Decide eligibility for one ticker and pull its categories
    pub async fn process_ticker(
        &self,
        index: usize,
        record: &TickerRecord,
    ) -> Result<TickerReport> {
        let ticker = record.ticker.as_str();
        let report = |outcome, files| TickerReport {
            index,
            ticker: ticker.to_string(),
            outcome,
            target_filing_year: self.config.target_filing_year.clone(),
            files,
        };

        let filing_year = match record.filing_year() {
            Some(year) => year,
            None => {
                debug!("{} has no filing date", ticker);
                return Ok(report(TickerOutcome::NoFilingData, Vec::new()));
            }
        };

        if filing_year != self.config.target_filing_year {
            debug!("{} last filed in {}", ticker, filing_year);
            return Ok(report(
                TickerOutcome::WrongFilingYear {
                    filing_year: filing_year.to_string(),
                },
                Vec::new(),
            ));
        }

        let mut files = Vec::new();
        let mut missing = Vec::new();

        for category in DatasetCategory::ALL {
            match self.fetch_category(ticker, category).await? {
                CategoryFetch::Fetched(table) => {
                    let path = self
                        .store
                        .write_table(ticker, category, &table)
                        .with_context(|| format!("Failed to save {} for {}", category, ticker))?;
                    files.push(path);
                }
                CategoryFetch::Missing => {
                    missing.push(category);
                    if self.config.category_policy == CategoryPolicy::Abandon {
                        break;
                    }
                }
            }
        }

        let outcome = if missing.is_empty() {
            TickerOutcome::Successful
        } else {
            TickerOutcome::MissingCategories(missing)
        };
        Ok(report(outcome, files))
    }

    /// One provider call for `category`; empty results and data-absence
    /// errors are folded into `Missing`
    async fn fetch_category(
        &self,
        ticker: &str,
        category: DatasetCategory,
    ) -> Result<CategoryFetch> {
        let result = match category.statement_kind() {
            Some(kind) => {
                self.provider
                    .fetch_financial_statement(ticker, self.config.period_type, kind)
                    .await
            }
            None => {
                self.provider
                    .fetch_price_series(ticker, self.config.price_frequency)
                    .await
            }
        };

        match result {
            Ok(table) if table.is_empty() => {
                warn!("{}: {} came back empty", ticker, category);
                Ok(CategoryFetch::Missing)
            }
            Ok(table) => {
                debug!("{}: {} returned {} rows", ticker, category, table.len());
                Ok(CategoryFetch::Fetched(table))
            }
            Err(e) if e.is_data_absence() => {
                warn!("{}: {} unavailable - {}", ticker, category, e);
                Ok(CategoryFetch::Missing)
            }
            Err(e) => {
                Err(e).with_context(|| format!("Fetching {} for {} failed", category, ticker))
            }
        }
    }
}
