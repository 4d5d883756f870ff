//! Per-operation deadlines.

use std::future::Future;
use std::time::Duration;

use crate::errors::PipelineError;

/// Await `operation`, failing with [`PipelineError::Timeout`] after `limit`.
pub(crate) async fn bounded<T, E, F>(
    limit: Duration,
    name: &'static str,
    operation: F,
) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, E>>,
    PipelineError: From<E>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result.map_err(PipelineError::from),
        Err(_) => Err(PipelineError::timeout(name, limit)),
    }
}
