//! Receipt triage.
//!
//! Fetches the receipts of a block and keeps the subset that created a
//! contract. Upstream fetch errors are retried with backoff; the caller
//! treats exhausted retries as skip-block, not fatal.

use tokio_retry::Retry;
use tracing::{debug, warn};

use crate::chain::{ChainError, ChainSource};
use crate::settings::Watcher;
use crate::types::Deployment;

pub async fn deployments_in_block(
    chain: &dyn ChainSource,
    height: u64,
    watcher: &Watcher,
) -> Result<Vec<Deployment>, ChainError> {
    let deployments = Retry::spawn(watcher.backoff(), || async {
        chain.deployment_receipts(height).await.map_err(|e| {
            warn!(height, error = %e, "receipt fetch failed, will retry");
            e
        })
    })
    .await?;

    debug!(
        height,
        deployments = deployments.len(),
        "receipt triage complete"
    );
    Ok(deployments)
}
