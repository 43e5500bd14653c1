//! Configuration management.
//!
//! Loaded from `Config.toml` with environment-variable overrides for
//! endpoints and secrets.

use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};

#[derive(Debug, Deserialize, Clone)]
pub struct Network {
    #[serde(default = "default_http_url")]
    pub http_url: String,
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
}

fn default_http_url() -> String {
    "http://127.0.0.1:8545".to_string()
}
fn default_ws_url() -> String {
    "ws://127.0.0.1:8545".to_string()
}

impl Default for Network {
    fn default() -> Self {
        Self {
            http_url: default_http_url(),
            ws_url: default_ws_url(),
        }
    }
}

/// Verification registry (Etherscan-compatible) access.
#[derive(Debug, Deserialize, Clone)]
pub struct Registry {
    #[serde(default = "default_registry_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Free-tier Etherscan allows 5 req/s; stay at or below it.
    #[serde(default = "default_registry_requests_per_second")]
    pub requests_per_second: u32,
}

fn default_registry_base_url() -> String {
    "https://api.etherscan.io/api".to_string()
}
fn default_registry_requests_per_second() -> u32 {
    5
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            base_url: default_registry_base_url(),
            api_key: String::new(),
            requests_per_second: default_registry_requests_per_second(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Contracts {
    /// Uniswap V2 factory on mainnet.
    #[serde(default = "default_uniswap_v2_factory")]
    pub uniswap_v2_factory: String,
    /// Canonical wrapped-native-asset token (WETH on mainnet).
    #[serde(default = "default_weth")]
    pub weth: String,
}

fn default_uniswap_v2_factory() -> String {
    "0x5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f".to_string()
}
fn default_weth() -> String {
    "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2".to_string()
}

impl Default for Contracts {
    fn default() -> Self {
        Self {
            uniswap_v2_factory: default_uniswap_v2_factory(),
            weth: default_weth(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Watcher {
    /// Bounded ingestion queue; the oldest unstarted height is dropped when
    /// full.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Worker-pool bound for per-candidate enrichment within a block.
    #[serde(default = "default_max_concurrent_enrichments")]
    pub max_concurrent_enrichments: usize,
    /// Wait before provenance/liquidity resolution so chain state (pool
    /// creation in particular) can settle. Cancellable; 0 disables it.
    #[serde(default = "default_settle_delay_seconds")]
    pub settle_delay_seconds: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: usize,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,
}

fn default_queue_capacity() -> usize {
    64
}
fn default_max_concurrent_enrichments() -> usize {
    4
}
fn default_settle_delay_seconds() -> u64 {
    300
}
fn default_retry_attempts() -> usize {
    5
}
fn default_retry_base_delay_ms() -> u64 {
    100
}
fn default_retry_max_delay_ms() -> u64 {
    10_000
}
fn default_shutdown_grace_seconds() -> u64 {
    30
}

impl Default for Watcher {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_concurrent_enrichments: default_max_concurrent_enrichments(),
            settle_delay_seconds: default_settle_delay_seconds(),
            retry_attempts: default_retry_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            shutdown_grace_seconds: default_shutdown_grace_seconds(),
        }
    }
}

impl Watcher {
    /// Backoff schedule shared by triage, enrichment and registry calls.
    pub fn backoff(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(self.retry_base_delay_ms.max(1))
            .max_delay(Duration::from_millis(self.retry_max_delay_ms))
            .map(jitter)
            .take(self.retry_attempts)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_seconds)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Notifier {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_explorer_base")]
    pub explorer_base: String,
    #[serde(default = "default_honeypot_base")]
    pub honeypot_base: String,
}

fn default_explorer_base() -> String {
    "https://etherscan.io/address".to_string()
}
fn default_honeypot_base() -> String {
    "https://honeypot.is/ethereum".to_string()
}

impl Default for Notifier {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            explorer_base: default_explorer_base(),
            honeypot_base: default_honeypot_base(),
        }
    }
}

/// Static subscription entries loaded at startup. The live command surface
/// mutates the store through its own interface; these just seed it.
#[derive(Debug, Deserialize, Clone)]
pub struct SubscriberEntry {
    pub recipient_id: i64,
    /// ETH thresholds as decimal strings ("2.2").
    pub thresholds: Vec<String>,
    #[serde(default)]
    pub thread_ids: Vec<i64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub registry: Registry,
    #[serde(default)]
    pub contracts: Contracts,
    #[serde(default)]
    pub watcher: Watcher,
    #[serde(default)]
    pub notifier: Notifier,
    #[serde(default)]
    pub subscribers: Vec<SubscriberEntry>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("Config.toml").required(false))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Environment variable overrides for endpoints and secrets
        if let Ok(url) = env::var("GEMWATCH_RPC_HTTP_URL") {
            if !url.trim().is_empty() {
                settings.network.http_url = url.trim().to_string();
            }
        }
        if let Ok(url) = env::var("GEMWATCH_RPC_WS_URL") {
            if !url.trim().is_empty() {
                settings.network.ws_url = url.trim().to_string();
            }
        }
        if let Ok(key) = env::var("ETHERSCAN_API_KEY") {
            if !key.trim().is_empty() {
                settings.registry.api_key = key.trim().to_string();
            }
        }
        if let Ok(token) = env::var("TELEGRAM_TOKEN") {
            if !token.trim().is_empty() {
                settings.notifier.bot_token = token.trim().to_string();
            }
        }

        Ok(settings)
    }
}
