pub mod config;
pub mod config_loader;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{AppConfig, DeribitConfig, HedgeConfig, ScheduleConfig, TelegramConfig};
pub use config_loader::ConfigLoader;
pub use error::{ConfigError, ErrorKind, GatewayError};
pub use traits::{Clock, ExchangeGateway, IndexPriceSource, Notifier};
pub use types::{BookTop, OhlcvBar, OrderState, OrderStatus, PerpetualPosition, Side, Symbol};
