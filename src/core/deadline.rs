//! Deadline budgets and their cascade across call layers.
//!
//! A [`Deadline`] is an absolute instant (or none, for an inbound call that
//! set no limit) together with the budget it was derived from. Children are
//! derived with [`Deadline::child`] and can never outlive their parent.

use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, error::Elapsed, timeout_at};

/// End-to-end budget of one client invocation.
pub const CLIENT_BUDGET: Duration = Duration::from_millis(300);

/// Budget of the outbound call to the quotation provider.
pub const FETCH_BUDGET: Duration = Duration::from_millis(200);

/// Budget of the best-effort write of a fetched quote.
pub const PERSIST_BUDGET: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
    budget: Option<Duration>,
}

impl Deadline {
    /// A deadline that never elapses, e.g. for an inbound HTTP request.
    pub fn unbounded() -> Self {
        Self {
            at: None,
            budget: None,
        }
    }

    /// A root deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Some(Instant::now() + budget),
            budget: Some(budget),
        }
    }

    /// Derives a deadline of at most `budget` from now, clamped to this one.
    pub fn child(&self, budget: Duration) -> Self {
        let own = Instant::now() + budget;
        let at = match self.at {
            Some(parent) if parent < own => parent,
            _ => own,
        };
        Self {
            at: Some(at),
            budget: Some(budget),
        }
    }

    /// Time left before the deadline elapses, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| at <= Instant::now())
    }

    /// The budget this deadline was derived from.
    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }

    /// Drives `fut` until it completes or the deadline elapses.
    ///
    /// When the deadline wins, `fut` is dropped. If `fut` is a `JoinHandle`
    /// this only abandons interest in the task; the task itself keeps running.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Elapsed> {
        match self.at {
            Some(at) => timeout_at(at, fut).await,
            None => Ok(fut.await),
        }
    }
}
