//! Async timeout helpers for bounded waits.

use crate::error::{Result, VaspError};
use std::future::Future;
use std::time::Duration;

/// Default bound for operations that must not wait forever.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Run a future with a deadline, mapping expiry to [`VaspError::Timeout`].
pub async fn with_timeout<F, T>(future: F, duration: Duration) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| VaspError::Timeout)
}
