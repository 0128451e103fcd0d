//! Deribit v2 adapter: HTTP JSON-RPC client, live gateway, index source and
//! a paper-trading wrapper for dry runs.

pub mod client;
pub mod gateway;
pub mod index;
pub mod models;
pub mod paper;

pub use client::DeribitClient;
pub use gateway::DeribitGateway;
pub use index::DeribitIndexSource;
pub use paper::PaperGateway;
