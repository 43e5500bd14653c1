//! Provenance resolution.
//!
//! Asks a verification registry (Etherscan-compatible API) whether a
//! contract's source has been published, and if so pulls the source text and
//! runs the link extractor over it. Registry failures are retried and then
//! degrade to "unverified" so the pipeline keeps moving.

use async_trait::async_trait;
use ethers::types::Address;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use std::num::NonZeroU32;
use tokio_retry::Retry;
use tracing::{debug, warn};

use crate::links::{extract_links, SocialLinks};
use crate::settings::{Registry as RegistrySettings, Watcher};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("registry rejected request: {0}")]
    Api(String),
}

#[async_trait]
pub trait VerificationRegistry: Send + Sync {
    /// Whether the contract's source has been published to the registry.
    async fn is_verified(&self, contract: Address) -> Result<bool, RegistryError>;

    /// Full source text of a verified contract, `None` when the registry has
    /// nothing on file.
    async fn source_code(&self, contract: Address) -> Result<Option<String>, RegistryError>;
}

/// Outcome of provenance resolution for one candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    pub verified: bool,
    pub links: SocialLinks,
}

impl Provenance {
    fn unverified() -> Self {
        Self::default()
    }
}

/// Resolves verification status and social links for `contract`.
///
/// Never fails: persistent registry errors are logged and reported as
/// unverified. An unverified contract makes no source-code call at all.
pub async fn resolve(
    registry: &dyn VerificationRegistry,
    contract: Address,
    watcher: &Watcher,
) -> Provenance {
    let verified = match Retry::spawn(watcher.backoff(), || registry.is_verified(contract)).await {
        Ok(v) => v,
        Err(e) => {
            warn!(?contract, error = %e, "verification lookup failed, treating as unverified");
            return Provenance::unverified();
        }
    };

    if !verified {
        debug!(?contract, "contract is not verified");
        return Provenance::unverified();
    }

    let links = match Retry::spawn(watcher.backoff(), || registry.source_code(contract)).await {
        Ok(Some(source)) => extract_links(&source),
        Ok(None) => SocialLinks::default(),
        Err(e) => {
            warn!(?contract, error = %e, "source retrieval failed, links unavailable");
            SocialLinks::default()
        }
    };

    Provenance {
        verified: true,
        links,
    }
}

const NOT_VERIFIED_SENTINEL: &str = "Contract source code not verified";

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SourceEntry {
    #[serde(rename = "SourceCode", default)]
    source_code: String,
}

/// Etherscan-backed registry client with a request-rate cap.
pub struct EtherscanRegistry {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    limiter: DefaultDirectRateLimiter,
}

impl EtherscanRegistry {
    pub fn new(settings: &RegistrySettings) -> Self {
        let rps = NonZeroU32::new(settings.requests_per_second)
            .unwrap_or_else(|| NonZeroU32::new(1).expect("1 is non-zero"));
        Self {
            http: reqwest::Client::new(),
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            limiter: RateLimiter::direct(Quota::per_second(rps)),
        }
    }

    async fn contract_query(
        &self,
        action: &str,
        contract: Address,
    ) -> Result<Envelope, RegistryError> {
        self.limiter.until_ready().await;
        let address = format!("{contract:?}");
        let envelope = self
            .http
            .get(&self.base_url)
            .query(&[
                ("module", "contract"),
                ("action", action),
                ("address", address.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<Envelope>()
            .await?;
        Ok(envelope)
    }
}

#[async_trait]
impl VerificationRegistry for EtherscanRegistry {
    async fn is_verified(&self, contract: Address) -> Result<bool, RegistryError> {
        let envelope = self.contract_query("getabi", contract).await?;
        let verified = envelope.status == "1"
            && envelope
                .result
                .as_str()
                .map(|r| r != NOT_VERIFIED_SENTINEL)
                .unwrap_or(false);
        Ok(verified)
    }

    async fn source_code(&self, contract: Address) -> Result<Option<String>, RegistryError> {
        let envelope = self.contract_query("getsourcecode", contract).await?;
        if envelope.status != "1" {
            return Err(RegistryError::Api(format!(
                "getsourcecode returned status {}",
                envelope.status
            )));
        }
        let entries: Vec<SourceEntry> =
            serde_json::from_value(envelope.result).map_err(|e| RegistryError::Api(e.to_string()))?;
        Ok(entries
            .into_iter()
            .map(|e| e.source_code)
            .find(|s| !s.is_empty()))
    }
}
