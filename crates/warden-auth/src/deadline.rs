//! Per-request deadline.
//!
//! A [`Deadline`] is fixed when the authentication gate starts handling a
//! request and is shared by every cache and authoritative call made for it.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, error::Elapsed};

/// An absolute point in time after which pending external calls are abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Creates a deadline `budget` from now.
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    /// Runs `fut` until it completes or the deadline fires.
    ///
    /// # Errors
    ///
    /// Returns [`Elapsed`] if the deadline fires first.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Elapsed>
    where
        F: Future,
    {
        tokio::time::timeout_at(self.at, fut).await
    }
}
