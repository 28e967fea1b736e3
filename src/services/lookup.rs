//! Bounded collaborator calls
//!
//! Identity and follow-graph lookups go through `bounded`: each is a single
//! call with a deadline, and any failure surfaces as `ServiceUnavailable`.

use super::error::ServiceError;
use std::future::Future;
use std::time::Duration;

/// Run `call`, giving up after `timeout`. `what` names the lookup in logs
/// and in the resulting error.
pub async fn bounded<T, F>(timeout: Duration, what: &str, call: F) -> Result<T, ServiceError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::warn!("{} failed: {:#}", what, e);
            Err(ServiceError::ServiceUnavailable(format!("{} failed", what)))
        }
        Err(_) => {
            tracing::warn!("{} timed out after {:?}", what, timeout);
            Err(ServiceError::ServiceUnavailable(format!("{} timed out", what)))
        }
    }
}
