//! Error taxonomy for collaborator calls and startup configuration.

use rust_decimal::Decimal;
use thiserror::Error;

/// How the run loop must react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Log, alert, back off and resume with state intact.
    Transient,
    /// Stop the loop after cancelling open orders.
    Fatal,
    /// Operator shutdown. Cancel open orders and exit cleanly.
    Interrupted,
}

/// Failure reported by the exchange gateway or the index price source.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Connection-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Request did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded: retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Error envelope returned by the exchange.
    #[error("API error {code}: {message}")]
    Api {
        /// Exchange error code.
        code: i64,
        /// Exchange error message.
        message: String,
    },

    /// Credentials missing or rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Response body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Response was well-formed but lacked a required value.
    #[error("Missing data: {0}")]
    MissingData(String),

    /// Order parameters the exchange will never accept.
    #[error("Invalid order: {0}")]
    InvalidOrder(String),
}

impl GatewayError {
    #[must_use]
    pub fn api(code: i64, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn missing(what: impl Into<String>) -> Self {
        Self::MissingData(what.into())
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(_) | Self::InvalidOrder(_) => ErrorKind::Fatal,
            Self::Network(_)
            | Self::Timeout(_)
            | Self::RateLimited { .. }
            | Self::Api { .. }
            | Self::Decode(_)
            | Self::MissingData(_) => ErrorKind::Transient,
        }
    }

    /// Returns true if the next cycle may succeed without operator action.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient)
    }
}

/// Invalid startup configuration. Never entered into the run loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Incorrect symbol '{0}' - please choose between 'BTC' or 'ETH'")]
    UnsupportedSymbol(String),

    #[error("Strike must be positive, got {0}")]
    InvalidStrike(Decimal),

    #[error("Price change percent must be within (0, 1), got {0}")]
    InvalidBandWidth(Decimal),

    #[error("Number of levels must be at least 1")]
    InvalidLevelCount,

    #[error("{field} must be greater than zero")]
    ZeroInterval { field: &'static str },
}
