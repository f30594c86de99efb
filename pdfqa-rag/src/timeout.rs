//! Deadline handling for calls into external model backends.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{RagError, Result};

/// Await `call`, failing with [`RagError::Provider`] if it does not finish
/// within `limit`.
///
/// A timeout is reported like any other provider failure so callers can retry
/// it the same way.
pub(crate) async fn with_timeout<T>(
    provider: &str,
    limit: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(provider, timeout_ms = limit.as_millis() as u64, "provider call timed out");
            Err(RagError::provider(provider, format!("timed out after {limit:?}")))
        }
    }
}
