//! Core data types shared across the watcher pipeline.

use ethers::types::{Address, H256, U256};
use rust_decimal::Decimal;

use crate::links::SocialLinks;

/// ERC-20 metadata read from the token contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// A contract-creation transaction observed during receipt triage.
///
/// The deployer is the sender of the creating transaction, so it is already
/// known at triage time and does not require a separate lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    pub contract_address: Address,
    pub deployer_address: Address,
    pub transaction_hash: H256,
    pub block_number: u64,
}

/// Reserve snapshot of a Uniswap V2 pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairReserves {
    pub reserve0: U256,
    pub reserve1: U256,
    pub token0: Address,
}

/// A fully enriched token-deployment candidate.
///
/// Created at triage time, filled in by the enrichment stages, discarded
/// after dispatch. Never persisted.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub contract_address: Address,
    pub deployer_address: Address,
    pub token_name: String,
    pub token_symbol: String,
    pub decimals: u8,
    pub balance_wei: U256,
    pub deployer_balance_wei: U256,
    pub verified: bool,
    pub links: SocialLinks,
    pub lp_pair: Option<Address>,
    pub lp_reserve_wei: U256,
}

impl Candidate {
    /// Contract balance in ETH, used for threshold matching.
    pub fn balance_eth(&self) -> Decimal {
        wei_to_eth(self.balance_wei)
    }

    /// WETH-side pool reserve in ETH, used for threshold matching.
    pub fn liquidity_eth(&self) -> Decimal {
        wei_to_eth(self.lp_reserve_wei)
    }

    pub fn deployer_balance_eth(&self) -> Decimal {
        wei_to_eth(self.deployer_balance_wei)
    }
}

/// Converts a wei amount to its decimal ETH representation (18 decimals).
///
/// Amounts whose whole-ETH part does not fit in a `u64` saturate to
/// `Decimal::MAX`; thresholds are tiny by comparison, so a saturated balance
/// still matches everything it should.
pub fn wei_to_eth(wei: U256) -> Decimal {
    let base = U256::exp10(18);
    let whole = wei / base;
    if whole.bits() > 64 {
        return Decimal::MAX;
    }
    let frac = (wei % base).as_u128();
    let eth = Decimal::from(whole.as_u64()) + Decimal::from_i128_with_scale(frac as i128, 18);
    // Strip trailing zeros so rendered amounts read "5", not "5.000000000000000000".
    eth.normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn wei_to_eth_converts_whole_and_fraction() {
        let five_and_a_half = U256::from(5_500_000_000_000_000_000u128);
        assert_eq!(wei_to_eth(five_and_a_half), Decimal::from_str("5.5").unwrap());
    }

    #[test]
    fn wei_to_eth_zero() {
        assert_eq!(wei_to_eth(U256::zero()), Decimal::ZERO);
    }

    #[test]
    fn wei_to_eth_sub_wei_precision() {
        assert_eq!(
            wei_to_eth(U256::from(1u64)),
            Decimal::from_str("0.000000000000000001").unwrap()
        );
    }

    #[test]
    fn wei_to_eth_saturates_on_absurd_amounts() {
        assert_eq!(wei_to_eth(U256::MAX), Decimal::MAX);
    }
}
