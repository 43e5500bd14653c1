//! Per-candidate enrichment.
//!
//! Takes a triaged deployment through metadata classification, balance and
//! deployer lookups, the settle delay, and finally provenance and liquidity
//! resolution (independent, run concurrently). Produces either a fully
//! enriched `Candidate` or `None` for contracts that are not tokens of
//! interest or whose enrichment was cancelled by shutdown.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_retry::RetryIf;
use tracing::{debug, warn};

use crate::chain::{ChainError, ChainSource};
use crate::liquidity::LiquidityResolver;
use crate::provenance::{self, VerificationRegistry};
use crate::settings::Watcher;
use crate::types::{Candidate, Deployment};

pub struct CandidateEnricher {
    chain: Arc<dyn ChainSource>,
    registry: Arc<dyn VerificationRegistry>,
    liquidity: LiquidityResolver,
    watcher: Watcher,
    shutdown: watch::Receiver<bool>,
}

impl CandidateEnricher {
    pub fn new(
        chain: Arc<dyn ChainSource>,
        registry: Arc<dyn VerificationRegistry>,
        liquidity: LiquidityResolver,
        watcher: Watcher,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            chain,
            registry,
            liquidity,
            watcher,
            shutdown,
        }
    }

    /// Enriches one deployment.
    ///
    /// `Ok(None)` means the candidate was discarded (not a fungible token,
    /// or enrichment cancelled by shutdown) — that is not an error. `Err` is
    /// a transient chain failure that survived retries; the caller logs it
    /// and moves on to the next candidate.
    pub async fn enrich(&self, deployment: &Deployment) -> Result<Option<Candidate>, ChainError> {
        let contract = deployment.contract_address;

        let metadata = match self.token_metadata(contract).await {
            Ok(metadata) => metadata,
            Err(e) if e.is_invalid_contract() => {
                debug!(?contract, "not a token contract, discarding");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if metadata.decimals == 0 {
            debug!(?contract, "decimals == 0, not a fungible token");
            return Ok(None);
        }

        let (balance_wei, deployer_balance_wei) = tokio::try_join!(
            self.eth_balance(contract),
            self.eth_balance(deployment.deployer_address),
        )?;

        // Let chain state settle (pool creation in particular often trails
        // the deployment) before the expensive downstream lookups.
        if !self.settle(self.watcher.settle_delay()).await {
            debug!(?contract, "enrichment cancelled during settle delay");
            return Ok(None);
        }

        let (provenance, depth) = tokio::join!(
            provenance::resolve(self.registry.as_ref(), contract, &self.watcher),
            self.liquidity.resolve(contract),
        );

        Ok(Some(Candidate {
            contract_address: contract,
            deployer_address: deployment.deployer_address,
            token_name: metadata.name,
            token_symbol: metadata.symbol,
            decimals: metadata.decimals,
            balance_wei,
            deployer_balance_wei,
            verified: provenance.verified,
            links: provenance.links,
            lp_pair: depth.pair,
            lp_reserve_wei: depth.reserve_wei,
        }))
    }

    async fn token_metadata(
        &self,
        contract: ethers::types::Address,
    ) -> Result<crate::types::TokenMetadata, ChainError> {
        RetryIf::spawn(
            self.watcher.backoff(),
            || self.chain.token_metadata(contract),
            |e: &ChainError| !e.is_invalid_contract(),
        )
        .await
    }

    async fn eth_balance(
        &self,
        address: ethers::types::Address,
    ) -> Result<ethers::types::U256, ChainError> {
        RetryIf::spawn(
            self.watcher.backoff(),
            || async {
                self.chain.eth_balance(address).await.map_err(|e| {
                    warn!(?address, error = %e, "balance lookup failed, will retry");
                    e
                })
            },
            |e: &ChainError| !e.is_invalid_contract(),
        )
        .await
    }

    /// Cancellable settle timer. Returns `false` when shutdown was signalled
    /// before the delay elapsed.
    async fn settle(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return true;
        }
        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = shutdown.wait_for(|stop| *stop) => false,
        }
    }
}
