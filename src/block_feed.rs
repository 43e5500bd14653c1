//! WebSocket block feed.
//!
//! Subscribes to `newHeads` and pushes block heights into the ingestion
//! queue. Connection loss is Fatal-Process for ingestion: nothing new is
//! enqueued until the feed reconnects, which it attempts forever with
//! exponential backoff. The pipeline itself keeps draining whatever is
//! already queued.

use anyhow::{Context, Result};
use ethers::prelude::*;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::block_queue::BlockQueue;

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

pub struct BlockFeed {
    ws_url: String,
    queue: Arc<BlockQueue>,
    shutdown: watch::Receiver<bool>,
}

impl BlockFeed {
    pub fn new(ws_url: String, queue: Arc<BlockQueue>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            ws_url,
            queue,
            shutdown,
        }
    }

    /// Runs until shutdown, reconnecting on any subscription failure.
    pub async fn run(mut self) {
        let mut reconnect_delay = INITIAL_RECONNECT_DELAY;

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            match self.stream_blocks().await {
                Ok(()) => break, // clean exit only happens on shutdown
                Err(e) => {
                    error!(error = %e, "block subscription lost, reconnecting in {:?}", reconnect_delay);
                }
            }

            let mut shutdown = self.shutdown.clone();
            tokio::select! {
                _ = sleep(reconnect_delay) => {}
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
            reconnect_delay = (reconnect_delay * 2).min(MAX_RECONNECT_DELAY);
        }

        info!("block feed stopped");
    }

    async fn stream_blocks(&mut self) -> Result<()> {
        let provider = Provider::<Ws>::connect(&self.ws_url)
            .await
            .context("failed to connect to WebSocket provider")?;
        let mut stream = provider
            .subscribe_blocks()
            .await
            .context("failed to subscribe to newHeads")?;
        info!(url = %self.ws_url, "subscribed to new blocks");

        loop {
            tokio::select! {
                block = stream.next() => {
                    match block {
                        Some(block) => {
                            if let Some(number) = block.number {
                                self.queue.push(number.as_u64());
                            } else {
                                warn!("received block header without a number, skipping");
                            }
                        }
                        None => anyhow::bail!("newHeads stream ended"),
                    }
                }
                _ = self.shutdown.wait_for(|stop| *stop) => return Ok(()),
            }
        }
    }
}
