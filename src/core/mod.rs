//! Core abstractions: quotes, deadlines and errors

pub mod config;
pub mod deadline;
pub mod error;
pub mod log;
pub mod quote;

// Re-export main types for cleaner imports
pub use deadline::{CLIENT_BUDGET, Deadline, FETCH_BUDGET, PERSIST_BUDGET};
pub use error::{QuoteError, Stage};
pub use quote::{Quote, QuoteRecord, QuoteSource, QuoteStore};
