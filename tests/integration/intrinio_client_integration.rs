//! HTTP-level tests of the Intrinio client against a local mock server

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::logging::init_test_logging;
use intrinio_pull::api::{FinancialDataProvider, IntrinioClient, ProviderError};
use intrinio_pull::models::{Config, PeriodType, PriceFrequency, StatementKind};

fn client_for(server: &MockServer) -> IntrinioClient {
    let mut config = Config::with_credentials("user", "secret");
    config.intrinio_base_url = server.uri();
    IntrinioClient::new(&config).expect("client")
}

#[tokio::test]
async fn test_price_series_follows_pages() {
    init_test_logging();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/prices"))
        .and(query_param("identifier", "ABC"))
        .and(query_param("frequency", "quarterly"))
        .and(query_param("page_number", "1"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"date": "2018-03-31", "open": 10.0, "close": 11.5, "volume": 1500}],
            "current_page": 1,
            "total_pages": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/prices"))
        .and(query_param("page_number", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"date": "2017-12-31", "open": 9.0, "close": 10.0, "volume": null}],
            "current_page": 2,
            "total_pages": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let table = client_for(&server)
        .fetch_price_series("ABC", PriceFrequency::Quarterly)
        .await
        .unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(table.columns[0], "date");
    assert_eq!(table.rows[0][0], "2018-03-31");
    assert_eq!(table.rows[0][5], "1500");
    assert_eq!(table.rows[1][0], "2017-12-31");
    assert_eq!(table.rows[1][5], "");
}

#[tokio::test]
async fn test_stale_current_page_stops_at_total_pages() {
    init_test_logging();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/prices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"date": "2018-03-31", "close": 11.5}],
            "current_page": 1,
            "total_pages": 3
        })))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let fetch = client.fetch_price_series("ABC", PriceFrequency::Quarterly);
    let table = tokio::time::timeout(std::time::Duration::from_secs(5), fetch)
        .await
        .expect("pagination should finish")
        .unwrap();

    assert_eq!(table.len(), 3);

    let pages: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter_map(|request| {
            request
                .url
                .query_pairs()
                .find(|(key, _)| key == "page_number")
                .map(|(_, value)| value.to_string())
        })
        .collect();
    assert_eq!(pages, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_statement_is_pivoted_per_period() {
    init_test_logging();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/fundamentals/standardized"))
        .and(query_param("identifier", "ABC"))
        .and(query_param("statement", "calculations"))
        .and(query_param("type", "QTR"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"fiscal_year": 2018, "fiscal_period": "Q1", "end_date": "2018-03-31"},
                {"fiscal_year": 2017, "fiscal_period": "Q4", "end_date": "2017-12-31"}
            ],
            "current_page": 1,
            "total_pages": 1
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/financials/standardized"))
        .and(query_param("fiscal_year", "2018"))
        .and(query_param("fiscal_period", "Q1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"tag": "roe", "value": 0.12}, {"tag": "ebitda", "value": 500}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/financials/standardized"))
        .and(query_param("fiscal_year", "2017"))
        .and(query_param("fiscal_period", "Q4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"tag": "ebitda", "value": 450}]
        })))
        .mount(&server)
        .await;

    let table = client_for(&server)
        .fetch_financial_statement("ABC", PeriodType::Quarter, StatementKind::Calculations)
        .await
        .unwrap();

    assert_eq!(
        table.columns,
        vec!["fiscal_year", "fiscal_period", "end_date", "roe", "ebitda"]
    );
    assert_eq!(table.rows[0], vec!["2018", "Q1", "2018-03-31", "0.12", "500"]);
    assert_eq!(table.rows[1], vec!["2017", "Q4", "2017-12-31", "", "450"]);
}

#[tokio::test]
async fn test_unknown_ticker_is_data_absence() {
    init_test_logging();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/prices"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let error = client_for(&server)
        .fetch_price_series("NOPE", PriceFrequency::Quarterly)
        .await
        .unwrap_err();

    assert_matches!(error, ProviderError::NotFound(_));
    assert!(error.is_data_absence());
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    init_test_logging();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/fundamentals/standardized"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let error = client_for(&server)
        .fetch_financial_statement("ABC", PeriodType::Quarter, StatementKind::BalanceSheet)
        .await
        .unwrap_err();

    assert_matches!(error, ProviderError::InvalidResponse(_));
}

#[tokio::test]
async fn test_rejected_credentials_are_fatal() {
    init_test_logging();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/prices"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let error = client_for(&server)
        .fetch_price_series("ABC", PriceFrequency::Quarterly)
        .await
        .unwrap_err();

    assert_matches!(error, ProviderError::Unauthorized(401));
    assert!(!error.is_data_absence());
}

#[tokio::test]
async fn test_throttling_and_server_errors_are_fatal() {
    init_test_logging();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/prices"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/fundamentals/standardized"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .mount(&server)
        .await;

    let client = client_for(&server);

    let throttled = client
        .fetch_price_series("ABC", PriceFrequency::Quarterly)
        .await
        .unwrap_err();
    assert_matches!(throttled, ProviderError::RateLimited);

    let unavailable = client
        .fetch_financial_statement("ABC", PeriodType::Quarter, StatementKind::CashFlowStatement)
        .await
        .unwrap_err();
    assert_matches!(unavailable, ProviderError::Status { status: 503, .. });
}

#[tokio::test]
async fn test_company_list_reads_every_page() {
    init_test_logging();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/companies"))
        .and(query_param("page_number", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "ticker": "ABC",
                    "name": "Abc Corp",
                    "lei": null,
                    "cik": "0000001",
                    "latest_filing_date": "2018-03-31"
                }
            ],
            "current_page": 1,
            "total_pages": 2
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/companies"))
        .and(query_param("page_number", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "ticker": "DEF",
                    "name": "Def Inc",
                    "lei": null,
                    "cik": null,
                    "latest_filing_date": null
                }
            ],
            "current_page": 2,
            "total_pages": 2
        })))
        .mount(&server)
        .await;

    let companies = client_for(&server).fetch_company_list().await.unwrap();

    let tickers: Vec<&str> = companies.iter().map(|c| c.ticker.as_str()).collect();
    assert_eq!(tickers, vec!["ABC", "DEF"]);
    assert_eq!(companies[0].latest_filing_date.as_deref(), Some("2018-03-31"));
    assert_eq!(companies[1].latest_filing_date, None);
}
