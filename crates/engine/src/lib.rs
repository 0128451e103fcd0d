//! Automated delta hedging for a Deribit options portfolio.
//!
//! Each cycle the service:
//! - Reads the index price and the perpetual position
//! - Evaluates the price bands around the strike
//! - For each triggered check, re-reads portfolio delta and hedges it with
//!   the perpetual when it is outside tolerance
//! - Sleeps 1 minute until a hedge is on, then 1 hour
//!
//! Hedges are worked maker-first (post-only at the touch, re-quoted every
//! dwell) and escalate to a market order after the chase timeout.

pub mod bands;
pub mod chaser;
pub mod clock;
pub mod decision;
pub mod error;
pub mod notifier;
pub mod service;
pub mod sim;
pub mod types;

pub use bands::BandMonitor;
pub use chaser::{ChaseOrder, ChasePhase, ChasePolicy, OrderChaser};
pub use clock::TokioClock;
pub use error::HedgeError;
pub use notifier::{LogNotifier, TelegramNotifier};
pub use service::{HedgeDeps, HedgeService};
pub use types::{
    BandTrigger, ChaseReport, CycleOutcome, Decision, HedgeOrderIntent, HedgeRuntimeState,
    PriceBand,
};
