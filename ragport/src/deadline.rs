use std::future::Future;
use std::time::Duration;

use crate::error::{RagError, Result, Stage};

/// Run a port call under an optional deadline.
///
/// An elapsed deadline surfaces as the stage's own error kind with
/// [`ErrorCause::Timeout`](crate::ErrorCause::Timeout).
pub(crate) async fn within<T, F>(
    limit: Option<Duration>,
    stage: Stage,
    component: &str,
    call: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        None => call.await,
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| RagError::timed_out(stage, component, limit))?,
    }
}
