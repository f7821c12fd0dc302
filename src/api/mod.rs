use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::models::{CompanyRecord, DataTable, PeriodType, PriceFrequency, StatementKind};

pub mod intrinio_client;
pub use intrinio_client::IntrinioClient;

/// Errors raised by a financial data provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no data found: {0}")]
    NotFound(String),

    #[error("invalid response data: {0}")]
    InvalidResponse(String),

    #[error("provider rejected credentials (HTTP {0})")]
    Unauthorized(u16),

    #[error("provider rate limit exceeded")]
    RateLimited,

    #[error("provider request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request could not be completed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ProviderError {
    /// Whether the error only means the dataset is unavailable for this
    /// ticker. Anything else is a failure of the run itself.
    pub fn is_data_absence(&self) -> bool {
        matches!(self, ProviderError::NotFound(_) | ProviderError::InvalidResponse(_))
    }
}

/// Simple rate limiter for API requests
pub struct ApiRateLimiter {
    delay_ms: u64,
}

impl ApiRateLimiter {
    /// `0` requests per minute disables pacing.
    pub fn new(requests_per_minute: u32) -> Self {
        let delay_ms = if requests_per_minute > 0 {
            60_000 / requests_per_minute as u64
        } else {
            0
        };

        Self { delay_ms }
    }

    pub async fn wait(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }
}

/// Capabilities the pull needs from a financial data source
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FinancialDataProvider {
    /// Full company directory
    async fn fetch_company_list(&self) -> Result<Vec<CompanyRecord>, ProviderError>;

    async fn fetch_financial_statement(
        &self,
        ticker: &str,
        period_type: PeriodType,
        statement_kind: StatementKind,
    ) -> Result<DataTable, ProviderError>;

    async fn fetch_price_series(
        &self,
        ticker: &str,
        frequency: PriceFrequency,
    ) -> Result<DataTable, ProviderError>;
}
