//! Block-to-notification pipeline.
//!
//! Single consumer loop over the ingestion queue: triage the block's
//! receipts, enrich each deployment under a bounded worker pool, match the
//! enriched candidates against the subscription snapshot and dispatch. A
//! block is fully processed before the next height starts, which keeps
//! notification order non-interleaved across blocks.

use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, warn};

use crate::block_queue::BlockQueue;
use crate::chain::ChainSource;
use crate::enricher::CandidateEnricher;
use crate::matcher::match_candidate;
use crate::notify::{dispatch_events, NotificationSink};
use crate::settings::{Notifier, Watcher};
use crate::subscriptions::SubscriptionStore;
use crate::triage;

pub struct Pipeline {
    queue: Arc<BlockQueue>,
    chain: Arc<dyn ChainSource>,
    enricher: Arc<CandidateEnricher>,
    store: Arc<dyn SubscriptionStore>,
    sink: Arc<dyn NotificationSink>,
    notifier: Notifier,
    watcher: Watcher,
    shutdown: watch::Receiver<bool>,
}

impl Pipeline {
    pub fn new(
        queue: Arc<BlockQueue>,
        chain: Arc<dyn ChainSource>,
        enricher: Arc<CandidateEnricher>,
        store: Arc<dyn SubscriptionStore>,
        sink: Arc<dyn NotificationSink>,
        notifier: Notifier,
        watcher: Watcher,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            queue,
            chain,
            enricher,
            store,
            sink,
            notifier,
            watcher,
            shutdown,
        }
    }

    /// Drains the queue until it is closed. Heights are processed in
    /// ascending order, one block at a time; candidates within a block run
    /// concurrently up to the configured worker bound.
    pub async fn run(self) {
        let semaphore = Arc::new(Semaphore::new(
            self.watcher.max_concurrent_enrichments.max(1),
        ));

        while let Some(height) = self.queue.pop().await {
            if *self.shutdown.borrow() {
                // Shutdown does not drain: stop before starting another block.
                warn!(height, queued = self.queue.len(), "shutdown requested, abandoning queued blocks");
                break;
            }
            info!(height, "processing block");

            let deployments =
                match triage::deployments_in_block(self.chain.as_ref(), height, &self.watcher)
                    .await
                {
                    Ok(deployments) => deployments,
                    Err(e) => {
                        warn!(height, error = %e, "block skipped after exhausting receipt retries");
                        continue;
                    }
                };

            if deployments.is_empty() {
                debug!(height, "no contract creations in block");
                continue;
            }
            info!(height, deployments = deployments.len(), "contract creations found");

            let mut tasks = Vec::with_capacity(deployments.len());
            for deployment in deployments {
                let permit = Arc::clone(&semaphore)
                    .acquire_owned()
                    .await
                    .expect("enrichment semaphore is never closed");
                let enricher = Arc::clone(&self.enricher);
                let store = Arc::clone(&self.store);
                let sink = Arc::clone(&self.sink);
                let notifier = self.notifier.clone();

                tasks.push(tokio::spawn(async move {
                    let _permit = permit;
                    match enricher.enrich(&deployment).await {
                        Ok(Some(candidate)) => {
                            let snapshot = store.snapshot();
                            let events = match_candidate(&candidate, &snapshot);
                            dispatch_events(sink.as_ref(), &candidate, &events, &notifier).await;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            // One candidate's failure never aborts its siblings.
                            warn!(
                                contract = ?deployment.contract_address,
                                error = %e,
                                "candidate enrichment failed"
                            );
                        }
                    }
                }));
            }

            for task in tasks {
                if let Err(e) = task.await {
                    warn!(height, error = %e, "enrichment task panicked");
                }
            }
            debug!(height, "block fully processed");
        }

        info!("block queue closed, pipeline stopped");
    }
}
