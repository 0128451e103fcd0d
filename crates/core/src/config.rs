use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::Symbol;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub hedge: HedgeConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub deribit: DeribitConfig,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    /// Start as if the first hedge already happened (resuming a paused run).
    #[serde(default)]
    pub resume_hedged: bool,
}

impl AppConfig {
    /// Validates every section, normalising where the loader allows it.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.hedge = self.hedge.validated()?;
        self.schedule.validate()?;
        Ok(self)
    }
}

/// What to hedge and when. Immutable once the loop starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HedgeConfig {
    pub symbol: Symbol,
    /// Maximum absolute delta tolerated before hedging.
    #[serde(default = "default_threshold")]
    pub threshold: Decimal,
    /// Reference price the bands are built around.
    pub strike: Decimal,
    /// Band spacing as a fraction of strike (0.025 = 2.5%).
    pub price_change_percent: Decimal,
    /// Bands per side. `None` runs the single-band policy.
    #[serde(default)]
    pub num_levels: Option<u32>,
}

fn default_threshold() -> Decimal {
    Decimal::new(10, 2)
}

impl HedgeConfig {
    /// Normalises the threshold to its absolute value and checks the band geometry.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for a non-positive strike, a band width outside
    /// (0, 1) or a zero level count.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.threshold = self.threshold.abs();

        if self.strike <= Decimal::ZERO {
            return Err(ConfigError::InvalidStrike(self.strike));
        }
        if self.price_change_percent <= Decimal::ZERO || self.price_change_percent >= Decimal::ONE
        {
            return Err(ConfigError::InvalidBandWidth(self.price_change_percent));
        }
        if self.num_levels == Some(0) {
            return Err(ConfigError::InvalidLevelCount);
        }
        Ok(self)
    }
}

/// Polling cadence and order-chasing timings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Poll interval before the first hedge or while flat.
    pub fast_interval_secs: u64,
    /// Poll interval once hedged with an open perpetual position.
    pub slow_interval_secs: u64,
    /// Pause after a transient failure.
    pub error_backoff_secs: u64,
    /// Time a resting limit order is given before it is checked.
    pub dwell_secs: u64,
    /// Time after which an unfilled hedge escalates to a market order.
    /// Zero sends a market order immediately.
    pub chase_timeout_secs: u64,
    /// Bars requested when pricing the hedge.
    pub ohlcv_limit: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            fast_interval_secs: 60,
            slow_interval_secs: 3600,
            error_backoff_secs: 30,
            dwell_secs: 5,
            chase_timeout_secs: 60,
            ohlcv_limit: 10,
        }
    }
}

impl ScheduleConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::ZeroInterval` for a zero polling, backoff or dwell interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("fast_interval_secs", self.fast_interval_secs),
            ("slow_interval_secs", self.slow_interval_secs),
            ("error_backoff_secs", self.error_backoff_secs),
            ("dwell_secs", self.dwell_secs),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigError::ZeroInterval { field });
            }
        }
        if self.ohlcv_limit == 0 {
            return Err(ConfigError::ZeroInterval {
                field: "ohlcv_limit",
            });
        }
        Ok(())
    }

    #[must_use]
    pub const fn fast_interval(&self) -> Duration {
        Duration::from_secs(self.fast_interval_secs)
    }

    #[must_use]
    pub const fn slow_interval(&self) -> Duration {
        Duration::from_secs(self.slow_interval_secs)
    }

    #[must_use]
    pub const fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }

    #[must_use]
    pub const fn dwell(&self) -> Duration {
        Duration::from_secs(self.dwell_secs)
    }

    #[must_use]
    pub const fn chase_timeout(&self) -> Duration {
        Duration::from_secs(self.chase_timeout_secs)
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeribitConfig {
    pub api_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub requests_per_second: u32,
}

impl Default for DeribitConfig {
    fn default() -> Self {
        Self {
            api_url: "https://www.deribit.com/api/v2".to_string(),
            client_id: None,
            client_secret: None,
            requests_per_second: 20,
        }
    }
}

impl std::fmt::Debug for DeribitConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeribitConfig")
            .field("api_url", &self.api_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("requests_per_second", &self.requests_per_second)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
    #[serde(default = "default_telegram_url")]
    pub api_url: String,
}

fn default_telegram_url() -> String {
    "https://api.telegram.org".to_string()
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("api_url", &self.api_url)
            .finish()
    }
}
