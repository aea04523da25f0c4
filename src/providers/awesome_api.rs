use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::core::{Deadline, Quote, QuoteError, QuoteSource, Stage};

#[derive(Deserialize, Debug)]
struct AwesomeApiResponse {
    #[serde(rename = "USDBRL")]
    usd_brl: CurrencyPair,
}

#[derive(Deserialize, Debug)]
struct CurrencyPair {
    bid: String,
}

fn parse_quote(body: &str) -> Result<Quote, QuoteError> {
    let data: AwesomeApiResponse = serde_json::from_str(body)
        .map_err(|e| QuoteError::MalformedResponse(e.to_string()))?;
    Quote::new(data.usd_brl.bid)
}

/// Fetches the USD-BRL bid from AwesomeAPI (`/json/last/USD-BRL`).
pub struct AwesomeApiSource {
    url: String,
    client: reqwest::Client,
}

impl AwesomeApiSource {
    pub fn new(url: &str) -> Result<Self, QuoteError> {
        let client = reqwest::Client::builder()
            .user_agent("bidwatch/0.1")
            .build()
            .map_err(QuoteError::Transport)?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }
}

#[async_trait]
impl QuoteSource for AwesomeApiSource {
    #[instrument(
        name = "QuoteFetch",
        skip(self),
        fields(url = %self.url)
    )]
    async fn fetch(&self, deadline: Deadline) -> Result<Quote, QuoteError> {
        let request = async {
            let response = self
                .client
                .get(&self.url)
                .send()
                .await
                .map_err(QuoteError::Transport)?;

            debug!(status = %response.status(), "Received upstream response");
            if response.status() != StatusCode::OK {
                return Err(QuoteError::UpstreamStatus(response.status().as_u16()));
            }

            let body = response.text().await.map_err(QuoteError::Transport)?;
            parse_quote(&body)
        };

        match deadline.run(request).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Timed out calling the quotation provider");
                Err(QuoteError::timeout(Stage::Fetch, deadline.budget()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const QUOTE_PATH: &str = "/json/last/USD-BRL";

    async fn create_mock_server(response: ResponseTemplate) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(QUOTE_PATH))
            .respond_with(response)
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn source_for(server: &MockServer) -> AwesomeApiSource {
        AwesomeApiSource::new(&format!("{}{}", server.uri(), QUOTE_PATH)).unwrap()
    }

    #[tokio::test]
    async fn test_successful_fetch() {
        let mock_response = r#"{
            "USDBRL": {
                "code": "USD",
                "codein": "BRL",
                "name": "Dólar Americano/Real Brasileiro",
                "bid": "5.4312",
                "ask": "5.4342"
            }
        }"#;
        let server =
            create_mock_server(ResponseTemplate::new(200).set_body_string(mock_response)).await;

        let quote = source_for(&server)
            .fetch(Deadline::after(Duration::from_secs(2)))
            .await
            .unwrap();

        assert_eq!(quote.value(), "5.4312");
    }

    #[tokio::test]
    async fn test_bid_is_passed_through_verbatim() {
        let server = create_mock_server(
            ResponseTemplate::new(200).set_body_string(r#"{"USDBRL":{"bid":"5.430000"}}"#),
        )
        .await;

        let quote = source_for(&server)
            .fetch(Deadline::after(Duration::from_secs(2)))
            .await
            .unwrap();

        assert_eq!(quote.value(), "5.430000");
    }

    #[tokio::test]
    async fn test_non_ok_status() {
        let server = create_mock_server(ResponseTemplate::new(503)).await;

        let err = source_for(&server)
            .fetch(Deadline::after(Duration::from_secs(2)))
            .await
            .unwrap_err();

        assert!(matches!(err, QuoteError::UpstreamStatus(503)));
    }

    #[tokio::test]
    async fn test_other_success_status_is_rejected() {
        let server = create_mock_server(
            ResponseTemplate::new(203).set_body_string(r#"{"USDBRL":{"bid":"5.43"}}"#),
        )
        .await;

        let err = source_for(&server)
            .fetch(Deadline::after(Duration::from_secs(2)))
            .await
            .unwrap_err();

        assert!(matches!(err, QuoteError::UpstreamStatus(203)));
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = create_mock_server(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"USDBRL":{"bid":"5.43"}}"#)
                .set_delay(Duration::from_millis(500)),
        )
        .await;

        let started = std::time::Instant::now();
        let err = source_for(&server)
            .fetch(Deadline::after(Duration::from_millis(50)))
            .await
            .unwrap_err();

        assert!(err.is_timeout(), "unexpected error: {err}");
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_missing_bid_field() {
        let server = create_mock_server(
            ResponseTemplate::new(200).set_body_string(r#"{"USDBRL":{"ask":"5.43"}}"#),
        )
        .await;

        let err = source_for(&server)
            .fetch(Deadline::after(Duration::from_secs(2)))
            .await
            .unwrap_err();

        assert!(matches!(err, QuoteError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_unparsable_body() {
        let server =
            create_mock_server(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
                .await;

        let err = source_for(&server)
            .fetch(Deadline::after(Duration::from_secs(2)))
            .await
            .unwrap_err();

        assert!(matches!(err, QuoteError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_empty_bid() {
        let server = create_mock_server(
            ResponseTemplate::new(200).set_body_string(r#"{"USDBRL":{"bid":""}}"#),
        )
        .await;

        let err = source_for(&server)
            .fetch(Deadline::after(Duration::from_secs(2)))
            .await
            .unwrap_err();

        assert!(matches!(err, QuoteError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then release a port so nothing is listening on it
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let source = AwesomeApiSource::new(&format!("http://{addr}{QUOTE_PATH}")).unwrap();

        let err = source
            .fetch(Deadline::after(Duration::from_secs(2)))
            .await
            .unwrap_err();

        assert!(matches!(err, QuoteError::Transport(_)), "unexpected error: {err}");
    }
}
