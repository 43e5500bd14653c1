//! Notification rendering and dispatch.
//!
//! The pipeline hands enriched candidates plus matched events to
//! `dispatch_events`, which renders one payload per candidate and pushes it
//! through a `NotificationSink`. Transport failures are per-recipient: they
//! are logged and never stop the remaining dispatches.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

use crate::matcher::NotificationEvent;
use crate::settings::Notifier;
use crate::types::Candidate;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("transport rejected message: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(
        &self,
        recipient_id: i64,
        text: &str,
        thread_id: Option<i64>,
    ) -> Result<(), TransportError>;
}

/// Composes the notification payload for one candidate.
///
/// Optional social links render only when present; the honeypot check link
/// is always appended.
pub fn render_notification(candidate: &Candidate, notifier: &Notifier) -> String {
    let contract = format!("{:?}", candidate.contract_address);
    let deployer = format!("{:?}", candidate.deployer_address);

    let mut text = format!(
        "*New Gem Detected* ✅\n\n\
         *Name*: {name}\n\
         *Symbol*: {symbol}\n\n\
         *Contract Address*: [{contract}]({explorer}/{contract})\n\
         *Deployer Address*: [{deployer}]({explorer}/{deployer})\n\n\
         *Contract Balance*: `{balance}` ETH\n\
         *Deployer Balance*: `{deployer_balance}` ETH\n\
         *Uniswap LP Balance*: `{liquidity}` ETH\n\n",
        name = candidate.token_name,
        symbol = candidate.token_symbol,
        contract = contract,
        deployer = deployer,
        explorer = notifier.explorer_base,
        balance = candidate.balance_eth(),
        deployer_balance = candidate.deployer_balance_eth(),
        liquidity = candidate.liquidity_eth(),
    );

    if let Some(website) = &candidate.links.website {
        text.push_str(&format!("[Website]({website})  "));
    }
    if let Some(x) = &candidate.links.x {
        text.push_str(&format!("[X]({x})  "));
    }
    if let Some(telegram) = &candidate.links.telegram {
        text.push_str(&format!("[Telegram]({telegram})  "));
    }
    text.push_str(&format!(
        "[Honeypot]({base}?address={contract})",
        base = notifier.honeypot_base,
    ));

    text
}

/// Dispatches every event for `candidate`, one send per event. A failed send
/// never prevents the remaining recipients from being notified.
pub async fn dispatch_events(
    sink: &dyn NotificationSink,
    candidate: &Candidate,
    events: &[NotificationEvent],
    notifier: &Notifier,
) -> usize {
    if events.is_empty() {
        return 0;
    }

    let text = render_notification(candidate, notifier);
    let mut delivered = 0;

    for event in events {
        match sink.send(event.recipient_id, &text, event.thread_id).await {
            Ok(()) => delivered += 1,
            Err(e) => {
                warn!(
                    recipient = event.recipient_id,
                    thread = ?event.thread_id,
                    error = %e,
                    "notification dispatch failed, skipping recipient"
                );
            }
        }
    }

    info!(
        contract = ?candidate.contract_address,
        delivered,
        attempted = events.len(),
        "notifications dispatched"
    );
    delivered
}

/// Telegram Bot API sink.
pub struct TelegramSink {
    http: Client,
    bot_token: String,
}

impl TelegramSink {
    pub fn new(notifier: &Notifier) -> Self {
        Self {
            http: Client::new(),
            bot_token: notifier.bot_token.clone(),
        }
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn send(
        &self,
        recipient_id: i64,
        text: &str,
        thread_id: Option<i64>,
    ) -> Result<(), TransportError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);

        let mut payload = json!({
            "chat_id": recipient_id,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": true,
        });
        if let Some(thread) = thread_id {
            payload["message_thread_id"] = json!(thread);
        }

        let response = self.http.post(&url).json(&payload).send().await?;
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected(body));
        }
        Ok(())
    }
}
