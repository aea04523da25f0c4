//! Quote types and the source/store abstractions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::deadline::Deadline;
use super::error::QuoteError;

/// A bid as published by the provider.
///
/// The value is kept as text and never parsed as a number, so it reaches the
/// client exactly as the provider wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuoteWire")]
pub struct Quote {
    #[serde(rename = "bid")]
    value: String,
}

#[derive(Deserialize)]
struct QuoteWire {
    bid: String,
}

impl TryFrom<QuoteWire> for Quote {
    type Error = QuoteError;

    fn try_from(wire: QuoteWire) -> Result<Self, Self::Error> {
        Quote::new(wire.bid)
    }
}

impl Quote {
    pub fn new(value: impl Into<String>) -> Result<Self, QuoteError> {
        let value = value.into();
        if value.is_empty() {
            return Err(QuoteError::MalformedResponse("empty bid".to_string()));
        }
        Ok(Self { value })
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Display for Quote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

/// A quote as stored in the append-only log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRecord {
    pub id: u64,
    pub quote: Quote,
    pub observed_at: DateTime<Utc>,
}

#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetches the current quote, giving up once `deadline` elapses.
    async fn fetch(&self, deadline: Deadline) -> Result<Quote, QuoteError>;
}

#[async_trait]
pub trait QuoteStore: Send + Sync {
    /// Appends `quote` to the log.
    ///
    /// Returns [`QuoteError::Timeout`] as soon as `deadline` elapses, even if
    /// the write is still running. Such a write is abandoned, not cancelled,
    /// and may still land afterwards.
    async fn persist(&self, deadline: Deadline, quote: &Quote) -> Result<QuoteRecord, QuoteError>;
}
