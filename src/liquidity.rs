//! Liquidity resolution.
//!
//! Derives the Uniswap V2 pair for `(token, WETH)` and reads the WETH-side
//! reserve as the candidate's pooled-ETH estimate. A missing pool or any
//! failed call counts as "no detectable liquidity", never as an error.

use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::chain::ChainSource;
use crate::types::PairReserves;

/// Pool depth attributed to a candidate token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolDepth {
    pub pair: Option<Address>,
    pub reserve_wei: U256,
}

pub struct LiquidityResolver {
    chain: Arc<dyn ChainSource>,
    weth: Address,
}

impl LiquidityResolver {
    pub fn new(chain: Arc<dyn ChainSource>, weth: Address) -> Self {
        Self { chain, weth }
    }

    /// Resolves pooled WETH for `token`. The zero pair address means no pool
    /// exists and short-circuits without any reserve calls.
    pub async fn resolve(&self, token: Address) -> PoolDepth {
        let pair = match self.chain.pair_for(token).await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(?token, error = %e, "pair lookup failed, assuming no liquidity");
                return PoolDepth::default();
            }
        };

        if pair == Address::zero() {
            debug!(?token, "no pair exists for token");
            return PoolDepth::default();
        }

        match self.chain.pair_reserves(pair).await {
            Ok(reserves) => PoolDepth {
                pair: Some(pair),
                reserve_wei: weth_side_reserve(&reserves, self.weth),
            },
            Err(e) => {
                warn!(?pair, error = %e, "reserve read failed, assuming no liquidity");
                PoolDepth {
                    pair: Some(pair),
                    reserve_wei: U256::zero(),
                }
            }
        }
    }
}

/// Selects the WETH-side reserve. Addresses are compared as raw bytes, which
/// makes the comparison independent of checksum casing in any textual form.
pub fn weth_side_reserve(reserves: &PairReserves, weth: Address) -> U256 {
    if reserves.token0 == weth {
        reserves.reserve0
    } else {
        reserves.reserve1
    }
}
