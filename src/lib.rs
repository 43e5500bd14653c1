//! # gemwatch
//!
//! Real-time watcher for newly deployed ERC-20 tokens. Each new block is
//! triaged for contract-creation receipts; every created token is enriched
//! with funding and provenance signals (contract/deployer balances,
//! verification status, social links, Uniswap V2 pool depth) and matched
//! against subscriber funding thresholds, producing one notification per
//! matching recipient thread.
//!
//! ## Architecture
//!
//! The pipeline is a single ordered consumer over block heights:
//!
//! ```text
//! newHeads ──▶ BlockFeed ──▶ BlockQueue ──▶ receipt triage
//!                                              │ (per candidate, bounded pool)
//!                                              ▼
//!                                       CandidateEnricher
//!                                       ├─ provenance (registry + link extraction)
//!                                       └─ liquidity (V2 pair reserves)
//!                                              ▼
//!                                    matcher ──▶ notification sink
//! ```
//!
//! External collaborators (chain RPC, verification registry, subscription
//! store, notification transport) sit behind traits so the pipeline can be
//! exercised against in-memory fakes.

// Ingestion
/// Bounded, height-ordered block ingestion queue
pub mod block_queue;
/// WebSocket newHeads subscription with reconnection
pub mod block_feed;
/// Receipt triage (contract-creation extraction)
pub mod triage;

// Enrichment
/// Per-candidate enrichment orchestration
pub mod enricher;
/// Verification registry client and provenance resolution
pub mod provenance;
/// Social-link extraction from verified source text
pub mod links;
/// Uniswap V2 pool-depth resolution
pub mod liquidity;

// Matching & Dispatch
/// Subscription store (snapshot-based)
pub mod subscriptions;
/// Threshold matching and event dedup
pub mod matcher;
/// Notification rendering and transport
pub mod notify;

// Infrastructure
/// Chain access trait and ethers implementation
pub mod chain;
/// Smart contract ABIs (read-only)
pub mod contracts;
/// Consumer loop wiring it all together
pub mod pipeline;
/// Core data types
pub mod types;

// Settings & Configuration
/// Configuration management
pub mod settings;

// Re-exports for convenience
pub use block_queue::BlockQueue;
pub use chain::{ChainSource, EthersChainSource};
pub use enricher::CandidateEnricher;
pub use pipeline::Pipeline;
pub use settings::Settings;
pub use subscriptions::{InMemorySubscriptions, SubscriptionStore};
pub use types::Candidate;
