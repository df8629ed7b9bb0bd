//! Multi-pool proof-of-capacity mining proxy.
//!
//! Sits between a local miner process and any number of upstream pools,
//! multiplexing their rounds into one local endpoint and arbitrating which
//! round the miner should be scanning at any moment. Submissions flow back
//! through the proxy, which validates, adjusts, gates, and forwards them to
//! the upstream that owns the round.

pub mod api;
pub mod api_client;
pub mod coin;
pub mod config;
pub mod error;
pub mod miner;
pub mod mining_info;
pub mod profitability;
pub mod proxy;
pub mod round_manager;
pub mod server;
pub mod submission;
pub mod tracing;
pub mod upstream;
