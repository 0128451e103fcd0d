use delta_hedge_core::{ErrorKind, GatewayError};
use thiserror::Error;

/// Failure inside a hedging cycle.
#[derive(Debug, Clone, Error)]
pub enum HedgeError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// No candles were returned for the perpetual.
    #[error("No recent OHLCV bars for {0}")]
    NoPriceData(String),

    #[error("Interrupted by operator")]
    Interrupted,
}

impl HedgeError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Gateway(e) => e.kind(),
            Self::NoPriceData(_) => ErrorKind::Transient,
            Self::Interrupted => ErrorKind::Interrupted,
        }
    }
}
