pub mod api;
pub mod data_collector;
pub mod models;
pub mod storage;

pub use api::{FinancialDataProvider, IntrinioClient, ProviderError};
pub use data_collector::{CollectorConfig, DataCollector, RunSummary, TickerOutcome, TickerReport};
