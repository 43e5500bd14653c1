//! gemwatch binary: wires settings, the chain client, the verification
//! registry, the subscription store and the Telegram sink into the pipeline,
//! then runs until Ctrl+C.

use anyhow::{Context, Result};
use ethers::prelude::{Http, Provider};
use ethers::types::Address;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gemwatch::block_feed::BlockFeed;
use gemwatch::block_queue::BlockQueue;
use gemwatch::chain::{ChainSource, EthersChainSource};
use gemwatch::enricher::CandidateEnricher;
use gemwatch::liquidity::LiquidityResolver;
use gemwatch::notify::{NotificationSink, TelegramSink};
use gemwatch::pipeline::Pipeline;
use gemwatch::provenance::{EtherscanRegistry, VerificationRegistry};
use gemwatch::settings::Settings;
use gemwatch::subscriptions::{InMemorySubscriptions, SubscriptionStore};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::new().context("failed to load settings")?;
    info!("settings loaded");

    let factory: Address = settings
        .contracts
        .uniswap_v2_factory
        .parse()
        .context("invalid uniswap_v2_factory address")?;
    let weth: Address = settings
        .contracts
        .weth
        .parse()
        .context("invalid weth address")?;

    let provider = Provider::<Http>::try_from(settings.network.http_url.as_str())
        .context("invalid RPC HTTP url")?;
    let chain: Arc<dyn ChainSource> =
        Arc::new(EthersChainSource::new(Arc::new(provider), factory, weth));
    let registry: Arc<dyn VerificationRegistry> =
        Arc::new(EtherscanRegistry::new(&settings.registry));
    let sink: Arc<dyn NotificationSink> = Arc::new(TelegramSink::new(&settings.notifier));

    let store = Arc::new(InMemorySubscriptions::new());
    for entry in &settings.subscribers {
        for threshold in &entry.thresholds {
            let threshold = Decimal::from_str(threshold)
                .with_context(|| format!("invalid threshold '{threshold}'"))?;
            if entry.thread_ids.is_empty() {
                store.subscribe(entry.recipient_id, threshold, None);
            } else {
                for &thread in &entry.thread_ids {
                    store.subscribe(entry.recipient_id, threshold, Some(thread));
                }
            }
        }
    }
    info!(
        subscriptions = store.snapshot().len(),
        "subscription store seeded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let queue = Arc::new(BlockQueue::new(settings.watcher.queue_capacity));

    let enricher = Arc::new(CandidateEnricher::new(
        Arc::clone(&chain),
        registry,
        LiquidityResolver::new(Arc::clone(&chain), weth),
        settings.watcher.clone(),
        shutdown_rx.clone(),
    ));

    let pipeline = Pipeline::new(
        Arc::clone(&queue),
        Arc::clone(&chain),
        enricher,
        Arc::clone(&store) as Arc<dyn SubscriptionStore>,
        sink,
        settings.notifier.clone(),
        settings.watcher.clone(),
        shutdown_rx.clone(),
    );
    let pipeline_handle = tokio::spawn(pipeline.run());

    let feed = BlockFeed::new(
        settings.network.ws_url.clone(),
        Arc::clone(&queue),
        shutdown_rx,
    );
    let feed_handle = tokio::spawn(feed.run());

    info!("gemwatch running, press Ctrl+C to stop");
    signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");

    // Stop accepting new blocks, then give in-flight enrichment a grace
    // period to finish or observe the cancellation.
    shutdown_tx.send(true).ok();
    queue.close();

    let grace = Duration::from_secs(settings.watcher.shutdown_grace_seconds);
    if tokio::time::timeout(grace, pipeline_handle).await.is_err() {
        warn!("pipeline did not stop within the grace period");
    }
    feed_handle.abort();

    info!("gemwatch stopped");
    Ok(())
}
