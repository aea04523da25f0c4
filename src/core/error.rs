use std::fmt::Display;
use std::time::Duration;
use thiserror::Error;

/// Stage of a request a deadline or failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Persist,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Stage::Fetch => "quote fetch",
                Stage::Persist => "quote persist",
            }
        )
    }
}

/// Failures of the fetch and persist stages of a quote request.
#[derive(Debug, Error)]
pub enum QuoteError {
    /// The stage's deadline elapsed before it observably completed.
    #[error("{stage} timed out after {budget:?}")]
    Timeout { stage: Stage, budget: Duration },

    #[error("upstream responded with status {0}")]
    UpstreamStatus(u16),

    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("failed to write quote: {0}")]
    WriteFailed(String),

    /// Connection-level failure, distinct from a timeout.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
}

impl QuoteError {
    pub fn timeout(stage: Stage, budget: Option<Duration>) -> Self {
        QuoteError::Timeout {
            stage,
            budget: budget.unwrap_or_default(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, QuoteError::Timeout { .. })
    }
}
