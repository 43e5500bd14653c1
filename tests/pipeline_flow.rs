//! End-to-end pipeline tests against in-memory collaborators.

use async_trait::async_trait;
use ethers::types::{Address, H256, U256};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::watch;

use gemwatch::block_queue::BlockQueue;
use gemwatch::chain::{ChainError, ChainSource};
use gemwatch::enricher::CandidateEnricher;
use gemwatch::liquidity::LiquidityResolver;
use gemwatch::notify::{NotificationSink, TransportError};
use gemwatch::pipeline::Pipeline;
use gemwatch::provenance::{RegistryError, VerificationRegistry};
use gemwatch::settings::{Notifier, Watcher};
use gemwatch::subscriptions::{InMemorySubscriptions, SubscriptionStore};
use gemwatch::types::{Deployment, PairReserves, TokenMetadata};

const WETH: Address = Address::repeat_byte(0xEE);

fn eth(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn wei(eth: u64) -> U256 {
    U256::from(eth) * U256::exp10(18)
}

/// A single-block chain with one configurable token deployment.
struct OneTokenChain {
    decimals: u8,
    balance: U256,
    pair: Address,
    lp_reserve: U256,
}

impl OneTokenChain {
    fn token() -> Address {
        Address::repeat_byte(0xCA)
    }
}

#[async_trait]
impl ChainSource for OneTokenChain {
    async fn deployment_receipts(&self, block: u64) -> Result<Vec<Deployment>, ChainError> {
        Ok(vec![Deployment {
            contract_address: Self::token(),
            deployer_address: Address::repeat_byte(0xDE),
            transaction_hash: H256::zero(),
            block_number: block,
        }])
    }

    async fn token_metadata(&self, _token: Address) -> Result<TokenMetadata, ChainError> {
        Ok(TokenMetadata {
            name: "Gem".into(),
            symbol: "GEM".into(),
            decimals: self.decimals,
        })
    }

    async fn eth_balance(&self, _address: Address) -> Result<U256, ChainError> {
        Ok(self.balance)
    }

    async fn pair_for(&self, _token: Address) -> Result<Address, ChainError> {
        Ok(self.pair)
    }

    async fn pair_reserves(&self, _pair: Address) -> Result<PairReserves, ChainError> {
        Ok(PairReserves {
            reserve0: self.lp_reserve,
            reserve1: U256::zero(),
            token0: WETH,
        })
    }
}

/// Registry whose calls always time out, for the degradation scenario.
struct TimingOutRegistry;

#[async_trait]
impl VerificationRegistry for TimingOutRegistry {
    async fn is_verified(&self, _contract: Address) -> Result<bool, RegistryError> {
        Err(RegistryError::Api("timeout".into()))
    }

    async fn source_code(&self, _contract: Address) -> Result<Option<String>, RegistryError> {
        Err(RegistryError::Api("timeout".into()))
    }
}

struct VerifiedRegistry {
    source: String,
}

#[async_trait]
impl VerificationRegistry for VerifiedRegistry {
    async fn is_verified(&self, _contract: Address) -> Result<bool, RegistryError> {
        Ok(true)
    }

    async fn source_code(&self, _contract: Address) -> Result<Option<String>, RegistryError> {
        Ok(Some(self.source.clone()))
    }
}

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(i64, Option<i64>, String)>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(
        &self,
        recipient_id: i64,
        text: &str,
        thread_id: Option<i64>,
    ) -> Result<(), TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient_id, thread_id, text.to_string()));
        Ok(())
    }
}

fn fast_watcher() -> Watcher {
    Watcher {
        queue_capacity: 16,
        max_concurrent_enrichments: 4,
        settle_delay_seconds: 0,
        retry_attempts: 1,
        retry_base_delay_ms: 1,
        retry_max_delay_ms: 2,
        shutdown_grace_seconds: 5,
    }
}

/// Runs one block through a pipeline wired from the given collaborators and
/// returns everything the sink recorded.
async fn run_one_block(
    chain: Arc<dyn ChainSource>,
    registry: Arc<dyn VerificationRegistry>,
    store: Arc<InMemorySubscriptions>,
) -> Vec<(i64, Option<i64>, String)> {
    let watcher = fast_watcher();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let sink = Arc::new(RecordingSink::default());

    let enricher = Arc::new(CandidateEnricher::new(
        Arc::clone(&chain),
        registry,
        LiquidityResolver::new(Arc::clone(&chain), WETH),
        watcher.clone(),
        shutdown_rx.clone(),
    ));

    // Closing after the push lets the queue drain and the pipeline exit.
    let queue = Arc::new(BlockQueue::new(watcher.queue_capacity));
    queue.push(100);
    queue.close();

    let pipeline = Pipeline::new(
        Arc::clone(&queue),
        chain,
        enricher,
        store as Arc<dyn SubscriptionStore>,
        Arc::clone(&sink) as Arc<dyn NotificationSink>,
        Notifier::default(),
        watcher,
        shutdown_rx,
    );
    pipeline.run().await;

    let sent = sink.sent.lock().unwrap().clone();
    sent
}

#[tokio::test]
async fn five_eth_candidate_notifies_only_the_low_threshold_subscriber() {
    let chain = Arc::new(OneTokenChain {
        decimals: 18,
        balance: wei(5),
        pair: Address::zero(),
        lp_reserve: U256::zero(),
    });
    let store = Arc::new(InMemorySubscriptions::new());
    store.subscribe(1, eth("2"), None);
    store.subscribe(2, eth("10"), None);

    let sent = run_one_block(chain, Arc::new(TimingOutRegistry), store).await;

    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 1);
    assert_eq!(sent[0].1, None);
}

#[tokio::test]
async fn thread_bindings_fan_out_instead_of_the_default_channel() {
    let chain = Arc::new(OneTokenChain {
        decimals: 18,
        balance: wei(5),
        pair: Address::zero(),
        lp_reserve: U256::zero(),
    });
    let store = Arc::new(InMemorySubscriptions::new());
    store.subscribe(1, eth("2"), Some(10));
    store.subscribe(1, eth("2"), Some(11));

    let sent = run_one_block(chain, Arc::new(TimingOutRegistry), store).await;

    let mut targets: Vec<Option<i64>> = sent.iter().map(|(_, t, _)| *t).collect();
    targets.sort();
    assert_eq!(targets, vec![Some(10), Some(11)]);
}

#[tokio::test]
async fn zero_decimals_token_never_reaches_the_matcher() {
    let chain = Arc::new(OneTokenChain {
        decimals: 0,
        balance: wei(100),
        pair: Address::zero(),
        lp_reserve: U256::zero(),
    });
    let store = Arc::new(InMemorySubscriptions::new());
    store.subscribe(1, eth("0"), None);

    let sent = run_one_block(chain, Arc::new(TimingOutRegistry), store).await;
    assert!(sent.is_empty());
}

#[tokio::test]
async fn liquidity_satisfies_the_threshold_when_balance_does_not() {
    let chain = Arc::new(OneTokenChain {
        decimals: 18,
        balance: U256::zero(),
        pair: Address::repeat_byte(0xAB),
        lp_reserve: wei(8),
    });
    let store = Arc::new(InMemorySubscriptions::new());
    store.subscribe(1, eth("5"), None);

    let sent = run_one_block(chain, Arc::new(TimingOutRegistry), store).await;
    assert_eq!(sent.len(), 1);
}

#[tokio::test]
async fn registry_timeouts_degrade_to_unverified_without_blocking_dispatch() {
    let chain = Arc::new(OneTokenChain {
        decimals: 18,
        balance: wei(5),
        pair: Address::zero(),
        lp_reserve: U256::zero(),
    });
    let store = Arc::new(InMemorySubscriptions::new());
    store.subscribe(1, eth("2"), None);

    let sent = run_one_block(chain, Arc::new(TimingOutRegistry), store).await;

    assert_eq!(sent.len(), 1);
    // No social links render when the registry is unreachable.
    let text = &sent[0].2;
    assert!(!text.contains("[Website]("));
    assert!(!text.contains("[Telegram]("));
    assert!(text.contains("[Honeypot]("));
}

#[tokio::test]
async fn verified_source_links_show_up_in_the_payload() {
    let chain = Arc::new(OneTokenChain {
        decimals: 18,
        balance: wei(5),
        pair: Address::zero(),
        lp_reserve: U256::zero(),
    });
    let registry = Arc::new(VerifiedRegistry {
        source: "// https://gemtoken.io https://t.me/gemtoken".into(),
    });
    let store = Arc::new(InMemorySubscriptions::new());
    store.subscribe(1, eth("2"), None);

    let sent = run_one_block(chain, registry, store).await;

    assert_eq!(sent.len(), 1);
    let text = &sent[0].2;
    assert!(text.contains("[Website](https://gemtoken.io)"));
    assert!(text.contains("[Telegram](https://t.me/gemtoken)"));
}
