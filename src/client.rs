//! Single-shot client: one bounded request to the quote service, then the
//! artifact write, all under [`CLIENT_BUDGET`].

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::core::{CLIENT_BUDGET, Deadline, Quote};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080/quote";
pub const SERVER_URL_ENV: &str = "BIDWATCH_SERVER_URL";
pub const ARTIFACT_PATH: &str = "quote.txt";

/// Client failures, one variant per stage that can fail.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build request: {0}")]
    Request(#[source] reqwest::Error),

    #[error("request to quote server failed: {0}")]
    Network(#[source] reqwest::Error),

    #[error("timed out waiting for quote server after {0:?}")]
    Timeout(Duration),

    #[error("unexpected status from quote server: {0}")]
    Status(u16),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("field `bid` missing or empty in response")]
    MissingField,

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The line written to the artifact and echoed to stdout.
pub fn artifact_line(quote: &Quote) -> String {
    format!("Dólar: {quote}")
}

pub struct QuoteClient {
    http: reqwest::Client,
    url: String,
}

impl QuoteClient {
    pub fn new(url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent("bidwatch-client/0.1")
            .build()
            .map_err(ClientError::Request)?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }

    /// Uses `BIDWATCH_SERVER_URL` when set, the local default otherwise.
    pub fn from_env() -> Result<Self, ClientError> {
        let url = std::env::var(SERVER_URL_ENV).unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        Self::new(&url)
    }

    /// Requests the current quote. Unbounded on its own; see [`QuoteClient::run`].
    pub async fn fetch(&self) -> Result<Quote, ClientError> {
        let request = self
            .http
            .get(&self.url)
            .build()
            .map_err(ClientError::Request)?;

        let response = self
            .http
            .execute(request)
            .await
            .map_err(ClientError::Network)?;

        let status = response.status();
        debug!(%status, "Received quote server response");
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(ClientError::Network)?;
        let data: Map<String, Value> =
            serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))?;

        let bid = data
            .get("bid")
            .and_then(Value::as_str)
            .ok_or(ClientError::MissingField)?;
        Quote::new(bid).map_err(|_| ClientError::MissingField)
    }

    /// Fetches the quote and writes it to `artifact`, within [`CLIENT_BUDGET`].
    ///
    /// Returns the line that was written.
    #[instrument(name = "QuoteClientRun", skip(self), fields(url = %self.url))]
    pub async fn run(&self, artifact: &Path) -> Result<String, ClientError> {
        let deadline = Deadline::after(CLIENT_BUDGET);

        let work = async {
            let quote = self.fetch().await?;
            let line = artifact_line(&quote);
            tokio::fs::write(artifact, format!("{line}\n"))
                .await
                .map_err(|source| ClientError::Write {
                    path: artifact.to_path_buf(),
                    source,
                })?;
            Ok(line)
        };

        match deadline.run(work).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Timed out waiting for quote server");
                Err(ClientError::Timeout(CLIENT_BUDGET))
            }
        }
    }
}
