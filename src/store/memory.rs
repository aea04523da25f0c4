use crate::core::{Deadline, Quote, QuoteError, QuoteRecord, QuoteStore};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{Instrument, debug, instrument};

use super::race_write;

/// In-process quote log, optionally with a simulated write latency.
#[derive(Default)]
pub struct MemoryQuoteStore {
    records: Arc<Mutex<Vec<QuoteRecord>>>,
    latency: Duration,
}

impl MemoryQuoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write takes at least `latency` before it lands.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            latency,
        }
    }

    pub async fn records(&self) -> Vec<QuoteRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl QuoteStore for MemoryQuoteStore {
    #[instrument(name = "QuotePersist", skip(self, quote), fields(bid = %quote))]
    async fn persist(&self, deadline: Deadline, quote: &Quote) -> Result<QuoteRecord, QuoteError> {
        let records = Arc::clone(&self.records);
        let latency = self.latency;
        let quote = quote.clone();

        let write = tokio::spawn(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            let mut records = records.lock().await;
            let record = QuoteRecord {
                id: records.len() as u64 + 1,
                quote,
                observed_at: Utc::now(),
            };
            records.push(record.clone());
            debug!(id = record.id, "Quote record written");
            Ok(record)
        }
        .in_current_span());

        race_write(deadline, write).await
    }
}
