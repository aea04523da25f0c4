//! Request orchestration: fetch, then best-effort persist, then respond.
//!
//! Both child deadlines are derived from the inbound request's deadline, not
//! from each other, so a fetch that used most of its budget does not shrink
//! the persist budget and vice versa. The service applies its own ceilings
//! ([`FETCH_BUDGET`], [`PERSIST_BUDGET`]) however generous the caller is.

use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::core::{
    Deadline, FETCH_BUDGET, PERSIST_BUDGET, Quote, QuoteError, QuoteSource, QuoteStore,
};

#[derive(Clone)]
pub struct QuoteService {
    source: Arc<dyn QuoteSource>,
    store: Arc<dyn QuoteStore>,
}

impl QuoteService {
    pub fn new(source: Arc<dyn QuoteSource>, store: Arc<dyn QuoteStore>) -> Self {
        Self { source, store }
    }

    /// Serves one quote request.
    ///
    /// Only fetch failures are returned. A failed or late write is logged and
    /// the fetched quote is returned anyway.
    #[instrument(name = "QuoteRequest", skip(self))]
    pub async fn handle(&self, inbound: Deadline) -> Result<Quote, QuoteError> {
        let quote = match self.source.fetch(inbound.child(FETCH_BUDGET)).await {
            Ok(quote) => quote,
            Err(e) => {
                error!(error = %e, "Failed to fetch quote");
                return Err(e);
            }
        };
        debug!(bid = %quote, "Fetched quote");

        match self.store.persist(inbound.child(PERSIST_BUDGET), &quote).await {
            Ok(record) => debug!(id = record.id, "Persisted quote"),
            Err(e) if e.is_timeout() => warn!(error = %e, "Quote persist timed out"),
            Err(e) => warn!(error = %e, "Failed to persist quote"),
        }

        info!(bid = %quote, "Responding with quote");
        Ok(quote)
    }
}
