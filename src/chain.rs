//! Chain access layer.
//!
//! `ChainSource` is the seam between the pipeline and the node: receipt
//! triage, token metadata, balances and AMM reads all go through it, which
//! keeps the enrichment stages testable against in-memory fakes.

use async_trait::async_trait;
use ethers::prelude::*;
use std::sync::Arc;

use crate::contracts::{Erc20, IUniswapV2Factory, IUniswapV2Pair};
use crate::types::{Deployment, PairReserves, TokenMetadata};

/// Error taxonomy for chain calls.
///
/// `InvalidContract` means the address is not a token of interest (the call
/// reverted or returned garbage) and the candidate should be discarded
/// silently. Everything else is `Transient` and eligible for retry.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("not a token contract: {0:?}")]
    InvalidContract(Address),
    #[error("chain call failed: {0}")]
    Transient(String),
}

impl ChainError {
    pub fn is_invalid_contract(&self) -> bool {
        matches!(self, ChainError::InvalidContract(_))
    }
}

#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Receipts of `block` that created a contract, with the creating
    /// transaction's sender surfaced as the deployer.
    async fn deployment_receipts(&self, block: u64) -> Result<Vec<Deployment>, ChainError>;

    /// ERC-20 metadata for `token`. A revert or undecodable response is
    /// classified as `InvalidContract`.
    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata, ChainError>;

    /// Current ETH balance of `address` in wei.
    async fn eth_balance(&self, address: Address) -> Result<U256, ChainError>;

    /// Pair address for `(token, WETH)` from the configured V2 factory.
    /// Returns the zero address when no pool exists.
    async fn pair_for(&self, token: Address) -> Result<Address, ChainError>;

    /// Reserve snapshot and `token0` of a V2 pair.
    async fn pair_reserves(&self, pair: Address) -> Result<PairReserves, ChainError>;
}

/// `ChainSource` backed by an ethers middleware.
#[derive(Clone)]
pub struct EthersChainSource<M> {
    provider: Arc<M>,
    factory: Address,
    weth: Address,
}

impl<M: Middleware + 'static> EthersChainSource<M> {
    pub fn new(provider: Arc<M>, factory: Address, weth: Address) -> Self {
        Self {
            provider,
            factory,
            weth,
        }
    }

    fn transient(e: impl std::fmt::Display) -> ChainError {
        ChainError::Transient(e.to_string())
    }

    /// Contract reverts and ABI decode failures mean "not the contract we
    /// expected"; provider-level failures stay retryable.
    fn classify_contract_error(token: Address, e: ContractError<M>) -> ChainError {
        match e {
            ContractError::MiddlewareError { e } => ChainError::Transient(e.to_string()),
            ContractError::ProviderError { e } => ChainError::Transient(e.to_string()),
            _ => ChainError::InvalidContract(token),
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> ChainSource for EthersChainSource<M> {
    async fn deployment_receipts(&self, block: u64) -> Result<Vec<Deployment>, ChainError> {
        let receipts = self
            .provider
            .get_block_receipts(block)
            .await
            .map_err(Self::transient)?;

        let deployments = receipts
            .into_iter()
            .filter_map(|r| {
                r.contract_address.map(|contract| Deployment {
                    contract_address: contract,
                    deployer_address: r.from,
                    transaction_hash: r.transaction_hash,
                    block_number: block,
                })
            })
            .collect();

        Ok(deployments)
    }

    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata, ChainError> {
        let erc20 = Erc20::new(token, Arc::clone(&self.provider));

        let decimals = erc20
            .decimals()
            .call()
            .await
            .map_err(|e| Self::classify_contract_error(token, e))?;
        let name = erc20
            .name()
            .call()
            .await
            .map_err(|e| Self::classify_contract_error(token, e))?;
        let symbol = erc20
            .symbol()
            .call()
            .await
            .map_err(|e| Self::classify_contract_error(token, e))?;

        Ok(TokenMetadata {
            name,
            symbol,
            decimals,
        })
    }

    async fn eth_balance(&self, address: Address) -> Result<U256, ChainError> {
        self.provider
            .get_balance(address, None)
            .await
            .map_err(Self::transient)
    }

    async fn pair_for(&self, token: Address) -> Result<Address, ChainError> {
        let factory = IUniswapV2Factory::new(self.factory, Arc::clone(&self.provider));
        factory
            .get_pair(token, self.weth)
            .call()
            .await
            .map_err(Self::transient)
    }

    async fn pair_reserves(&self, pair: Address) -> Result<PairReserves, ChainError> {
        let contract = IUniswapV2Pair::new(pair, Arc::clone(&self.provider));
        let (reserve0, reserve1, _ts) = contract.get_reserves().call().await.map_err(Self::transient)?;
        let token0 = contract.token_0().call().await.map_err(Self::transient)?;

        Ok(PairReserves {
            reserve0: U256::from(reserve0),
            reserve1: U256::from(reserve1),
            token0,
        })
    }
}
