use crate::core::{Deadline, Quote, QuoteError, QuoteRecord, QuoteStore};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{Dispatch, Span, debug, instrument};

use super::race_write;

const PARTITION: &str = "quotes";

#[derive(Serialize, Deserialize)]
struct StoredQuote {
    bid: String,
    timestamp: DateTime<Utc>,
}

fn decode_id(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| anyhow!("Invalid record key of {} bytes", key.len()))?;
    Ok(u64::from_be_bytes(bytes))
}

fn write_record(
    partition: &PartitionHandle,
    id: u64,
    quote: Quote,
) -> Result<QuoteRecord, QuoteError> {
    let observed_at = Utc::now();
    let entry = StoredQuote {
        bid: quote.value().to_string(),
        timestamp: observed_at,
    };
    let value = serde_json::to_vec(&entry).map_err(|e| QuoteError::WriteFailed(e.to_string()))?;
    partition
        .insert(&id.to_be_bytes()[..], value.as_slice())
        .map_err(|e| QuoteError::WriteFailed(e.to_string()))?;
    debug!(id, "Quote record written");

    Ok(QuoteRecord {
        id,
        quote,
        observed_at,
    })
}

/// Append-only quote log in a fjall keyspace.
///
/// Records are keyed by a big-endian id so iteration order is id order.
pub struct FjallQuoteStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
    next_id: Arc<AtomicU64>,
}

impl FjallQuoteStore {
    /// Opens or creates the log at `path`. Failure here is fatal to startup.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create data directory: {}", path.display()))?;

        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open keyspace at {}", path.display()))?;
        let partition = keyspace
            .open_partition(PARTITION, PartitionCreateOptions::default())
            .context("Failed to open quotes partition")?;

        let last_id = match partition
            .last_key_value()
            .context("Failed to read last quote record")?
        {
            Some((key, _)) => decode_id(&key)?,
            None => 0,
        };
        debug!(last_id, path = %path.display(), "Opened quote store");

        Ok(Self {
            keyspace,
            partition,
            next_id: Arc::new(AtomicU64::new(last_id + 1)),
        })
    }

    /// All records in id order.
    pub fn records(&self) -> Result<Vec<QuoteRecord>> {
        self.partition
            .iter()
            .map(|item| {
                let (key, value) = item.context("Failed to read quote log")?;
                let id = decode_id(&key)?;
                let stored: StoredQuote = serde_json::from_slice(&value)
                    .with_context(|| format!("Failed to decode quote record {id}"))?;
                Ok(QuoteRecord {
                    id,
                    quote: Quote::new(stored.bid)
                        .with_context(|| format!("Invalid bid in quote record {id}"))?,
                    observed_at: stored.timestamp,
                })
            })
            .collect()
    }

    /// Flushes the journal to disk, used on shutdown.
    pub fn flush(&self) -> Result<()> {
        self.keyspace
            .persist(PersistMode::SyncAll)
            .context("Failed to flush quote store")
    }
}

#[async_trait]
impl QuoteStore for FjallQuoteStore {
    #[instrument(name = "QuotePersist", skip(self, quote), fields(bid = %quote))]
    async fn persist(&self, deadline: Deadline, quote: &Quote) -> Result<QuoteRecord, QuoteError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let partition = self.partition.clone();
        let quote = quote.clone();

        // The blocking pool does not inherit the caller's subscriber or span
        let dispatch = tracing::dispatcher::get_default(Dispatch::clone);
        let span = Span::current();
        let write = tokio::task::spawn_blocking(move || {
            tracing::dispatcher::with_default(&dispatch, || {
                span.in_scope(|| write_record(&partition, id, quote))
            })
        });

        race_write(deadline, write).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log::CapturedLogs;
    use std::time::Duration;
    use tempfile::tempdir;

    fn generous() -> Deadline {
        Deadline::after(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_persist_and_read_back() {
        let dir = tempdir().unwrap();
        let store = FjallQuoteStore::open(dir.path()).unwrap();

        // Initially, the log is empty
        assert!(store.records().unwrap().is_empty());

        let record = store
            .persist(generous(), &Quote::new("5.43").unwrap())
            .await
            .unwrap();
        assert_eq!(record.id, 1);
        assert_eq!(record.quote.value(), "5.43");

        let records = store.records().unwrap();
        assert_eq!(records, vec![record]);
    }

    #[tokio::test]
    async fn test_ids_are_monotonic() {
        let dir = tempdir().unwrap();
        let store = FjallQuoteStore::open(dir.path()).unwrap();

        for bid in ["5.41", "5.42", "5.43"] {
            store
                .persist(generous(), &Quote::new(bid).unwrap())
                .await
                .unwrap();
        }

        let records = store.records().unwrap();
        let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
        let bids: Vec<&str> = records.iter().map(|r| r.quote.value()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(bids, vec!["5.41", "5.42", "5.43"]);
    }

    #[tokio::test]
    async fn test_reopen_resumes_ids() {
        let dir = tempdir().unwrap();
        {
            let store = FjallQuoteStore::open(dir.path()).unwrap();
            store
                .persist(generous(), &Quote::new("5.41").unwrap())
                .await
                .unwrap();
            store.flush().unwrap();
        }

        let store = FjallQuoteStore::open(dir.path()).unwrap();
        let record = store
            .persist(generous(), &Quote::new("5.42").unwrap())
            .await
            .unwrap();

        assert_eq!(record.id, 2);
        assert_eq!(store.records().unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_persists_get_distinct_ids() {
        let dir = tempdir().unwrap();
        let store = Arc::new(FjallQuoteStore::open(dir.path()).unwrap());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .persist(generous(), &Quote::new(format!("5.{i:02}")).unwrap())
                        .await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.sort_unstable();
        ids.dedup();

        assert_eq!(ids.len(), 16);
        assert_eq!(store.records().unwrap().len(), 16);
    }

    #[tokio::test]
    async fn test_write_log_carries_persist_span() {
        let logs = CapturedLogs::default();
        let _guard = logs.install(tracing::Level::DEBUG);
        let dir = tempdir().unwrap();
        let store = FjallQuoteStore::open(dir.path()).unwrap();

        store
            .persist(generous(), &Quote::new("5.43").unwrap())
            .await
            .unwrap();

        let output = logs.contents();
        let line = output
            .lines()
            .find(|line| line.contains("Quote record written"))
            .unwrap_or_else(|| panic!("no write log in: {output}"));
        assert!(line.contains("QuotePersist{bid=5.43}"), "missing span: {line}");
        assert!(line.contains("id=1"), "missing id: {line}");
    }

    #[test]
    fn test_corrupt_key_is_a_read_error() {
        let dir = tempdir().unwrap();
        let store = FjallQuoteStore::open(dir.path()).unwrap();
        store.partition.insert("bad", "{}").unwrap();

        let err = store.records().unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("Invalid record key of 3 bytes"), "unexpected error: {message}");
        assert!(!message.contains("write"), "read failure reported as a write: {message}");
    }

    #[test]
    fn test_open_fails_on_file_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(FjallQuoteStore::open(file.path()).is_err());
    }
}
