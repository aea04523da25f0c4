pub mod disk;
pub mod memory;

use crate::core::{Deadline, QuoteError, QuoteRecord, Stage};
use tokio::task::JoinHandle;
use tracing::debug;

pub use disk::FjallQuoteStore;
pub use memory::MemoryQuoteStore;

/// Waits for a spawned write until `deadline`, whichever comes first.
///
/// On timeout the handle is dropped, which detaches the write rather than
/// aborting it: it may still complete after the caller has moved on.
pub(crate) async fn race_write(
    deadline: Deadline,
    write: JoinHandle<Result<QuoteRecord, QuoteError>>,
) -> Result<QuoteRecord, QuoteError> {
    match deadline.run(write).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(QuoteError::WriteFailed(format!("write task failed: {join_err}"))),
        Err(_) => {
            debug!("Write deadline elapsed, abandoning write");
            Err(QuoteError::timeout(Stage::Persist, deadline.budget()))
        }
    }
}
