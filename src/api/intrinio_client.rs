use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION},
    Client, StatusCode,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};
use url::Url;

use super::{ApiRateLimiter, FinancialDataProvider, ProviderError};
use crate::models::{CompanyRecord, Config, DataTable, PeriodType, PriceFrequency, StatementKind};

/// Columns of a price table, in output order
const PRICE_COLUMNS: [&str; 13] = [
    "date",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "ex_dividend",
    "split_ratio",
    "adj_open",
    "adj_high",
    "adj_low",
    "adj_close",
    "adj_volume",
];

/// Leading columns of a statement table; tag columns follow
const STATEMENT_COLUMNS: [&str; 3] = ["fiscal_year", "fiscal_period", "end_date"];

/// Paginated response envelope shared by every endpoint
#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Option<Vec<T>>,
    total_pages: Option<u32>,
}

/// One reported period of a standardized statement
#[derive(Debug, Clone, Deserialize)]
struct FundamentalPeriod {
    #[serde(default)]
    fiscal_year: Value,
    fiscal_period: String,
    end_date: Option<String>,
}

/// A single tag/value pair of a statement period
#[derive(Debug, Deserialize)]
struct FinancialItem {
    tag: String,
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Deserialize)]
struct PriceRecord {
    date: String,
    #[serde(default)]
    open: Value,
    #[serde(default)]
    high: Value,
    #[serde(default)]
    low: Value,
    #[serde(default)]
    close: Value,
    #[serde(default)]
    volume: Value,
    #[serde(default)]
    ex_dividend: Value,
    #[serde(default)]
    split_ratio: Value,
    #[serde(default)]
    adj_open: Value,
    #[serde(default)]
    adj_high: Value,
    #[serde(default)]
    adj_low: Value,
    #[serde(default)]
    adj_close: Value,
    #[serde(default)]
    adj_volume: Value,
}

/// Intrinio v1 REST API client
pub struct IntrinioClient {
    client: Client,
    base_url: Url,
    headers: HeaderMap,
    page_size: u32,
    rate_limiter: ApiRateLimiter,
}

impl IntrinioClient {
    /// Create a new Intrinio client from the configured credentials
    pub fn new(config: &Config) -> Result<Self> {
        let mut builder = Client::builder().user_agent("intrinio-pull/0.1");
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        // Url::join drops the last path segment unless the base ends with '/'
        let mut base = config.intrinio_base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .with_context(|| format!("Invalid Intrinio base URL: {}", config.intrinio_base_url))?;

        let credentials = general_purpose::STANDARD.encode(format!(
            "{}:{}",
            config.intrinio_username, config.intrinio_password
        ));
        let mut auth_value = HeaderValue::from_str(&format!("Basic {}", credentials))
            .context("Credentials are not valid header text")?;
        auth_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth_value);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Self {
            client,
            base_url,
            headers,
            page_size: config.page_size.max(1),
            rate_limiter: ApiRateLimiter::new(config.rate_limit_per_minute),
        })
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url, ProviderError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| ProviderError::InvalidResponse(format!("bad endpoint {}: {}", path, e)))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(key, value)| (*key, value.as_str())));
        }
        Ok(url)
    }

    /// Make an authenticated GET request and decode the JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = self.endpoint(path, query)?;

        self.rate_limiter.wait().await;

        debug!("Making request to: {}", url);

        let response = self
            .client
            .get(url.clone())
            .headers(self.headers.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::NOT_FOUND => ProviderError::NotFound(url.to_string()),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ProviderError::Unauthorized(status.as_u16())
                }
                StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
                _ => ProviderError::Status {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        let text = response.text().await?;
        debug!("API response received: {} bytes", text.len());

        serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(format!("{}: {}", url.path(), e)))
    }

    /// Request pages 1..=`total_pages` of `path` and concatenate their data
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, ProviderError> {
        let mut records = Vec::new();
        let mut page_number: u32 = 1;

        loop {
            let mut query = params.to_vec();
            query.push(("page_number", page_number.to_string()));
            query.push(("page_size", self.page_size.to_string()));

            let page: Page<T> = self.get_json(path, &query).await?;
            records.extend(page.data.unwrap_or_default());

            // Counted locally; the echoed `current_page` is ignored
            if page_number >= page.total_pages.unwrap_or(1) {
                break;
            }
            page_number += 1;
        }

        Ok(records)
    }
}

#[async_trait]
impl FinancialDataProvider for IntrinioClient {
    async fn fetch_company_list(&self) -> Result<Vec<CompanyRecord>, ProviderError> {
        let companies: Vec<CompanyRecord> = self.get_all_pages("companies", &[]).await?;
        info!("Retrieved {} companies", companies.len());
        Ok(companies)
    }

    async fn fetch_financial_statement(
        &self,
        ticker: &str,
        period_type: PeriodType,
        statement_kind: StatementKind,
    ) -> Result<DataTable, ProviderError> {
        let identifier = ("identifier", ticker.to_string());
        let statement = ("statement", statement_kind.as_query().to_string());

        let periods: Vec<FundamentalPeriod> = self
            .get_all_pages(
                "fundamentals/standardized",
                &[
                    identifier.clone(),
                    statement.clone(),
                    ("type", period_type.as_query().to_string()),
                ],
            )
            .await?;

        let mut reported = Vec::with_capacity(periods.len());
        for period in periods {
            let items: Vec<FinancialItem> = self
                .get_all_pages(
                    "financials/standardized",
                    &[
                        identifier.clone(),
                        statement.clone(),
                        ("fiscal_year", cell(&period.fiscal_year)),
                        ("fiscal_period", period.fiscal_period.clone()),
                    ],
                )
                .await?;
            reported.push((period, items));
        }

        let table = statement_table(reported);
        debug!(
            "Retrieved {} {} periods for {}",
            table.len(),
            statement_kind.as_query(),
            ticker
        );
        Ok(table)
    }

    async fn fetch_price_series(
        &self,
        ticker: &str,
        frequency: PriceFrequency,
    ) -> Result<DataTable, ProviderError> {
        let prices: Vec<PriceRecord> = self
            .get_all_pages(
                "prices",
                &[
                    ("identifier", ticker.to_string()),
                    ("frequency", frequency.as_query().to_string()),
                ],
            )
            .await?;

        let table = price_table(prices);
        debug!("Retrieved {} {} prices for {}", table.len(), frequency.as_query(), ticker);
        Ok(table)
    }
}

/// Render a JSON scalar the way it appeared in the response
fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// One row per period, one column per tag in first-seen order
fn statement_table(reported: Vec<(FundamentalPeriod, Vec<FinancialItem>)>) -> DataTable {
    let mut tags: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut period_values = Vec::with_capacity(reported.len());

    for (period, items) in reported {
        let mut values: HashMap<usize, String> = HashMap::new();
        for item in items {
            let position = match positions.get(&item.tag) {
                Some(&position) => position,
                None => {
                    tags.push(item.tag.clone());
                    positions.insert(item.tag, tags.len() - 1);
                    tags.len() - 1
                }
            };
            values.insert(position, cell(&item.value));
        }
        period_values.push((period, values));
    }

    let columns = STATEMENT_COLUMNS
        .iter()
        .copied()
        .chain(tags.iter().map(String::as_str));
    let mut table = DataTable::new(columns);
    for (period, mut values) in period_values {
        let mut row = vec![
            cell(&period.fiscal_year),
            period.fiscal_period,
            period.end_date.unwrap_or_default(),
        ];
        row.extend((0..tags.len()).map(|position| values.remove(&position).unwrap_or_default()));
        table.push_row(row);
    }
    table
}

fn price_table(prices: Vec<PriceRecord>) -> DataTable {
    let mut table = DataTable::new(PRICE_COLUMNS);
    for price in prices {
        table.push_row([
            price.date,
            cell(&price.open),
            cell(&price.high),
            cell(&price.low),
            cell(&price.close),
            cell(&price.volume),
            cell(&price.ex_dividend),
            cell(&price.split_ratio),
            cell(&price.adj_open),
            cell(&price.adj_high),
            cell(&price.adj_low),
            cell(&price.adj_close),
            cell(&price.adj_volume),
        ]);
    }
    table
}
