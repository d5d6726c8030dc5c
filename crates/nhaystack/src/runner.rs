//! Running rebuilds off the async runtime
//!
//! A rebuild walks the whole station synchronously, so it runs on the
//! blocking pool with an upper bound on how long the caller waits.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinError;
use tracing::{info, warn};

use haystack_cache::{Cache, CacheError, Generation};

#[derive(Debug, Error)]
pub enum RebuildError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Rebuild did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Rebuild task failed: {0}")]
    Join(#[from] JoinError),
}

/// Rebuild `cache` on the blocking pool, giving up after `timeout`.
///
/// A timed out rebuild keeps running in the background and publishes its
/// generation when it completes; the cache stays readable meanwhile.
pub async fn rebuild_with_timeout(
    cache: Arc<Cache>,
    timeout: Duration,
) -> Result<Arc<Generation>, RebuildError> {
    let task = tokio::task::spawn_blocking(move || cache.rebuild());

    match tokio::time::timeout(timeout, task).await {
        Ok(joined) => {
            let generation = joined??;
            info!("Rebuild finished in {:?}", generation.rebuild_duration());
            Ok(generation)
        }
        Err(_) => {
            warn!("Rebuild still running after {:?}", timeout);
            Err(RebuildError::Timeout(timeout))
        }
    }
}
