use crate::config::AppConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    pub const DEFAULT_PATH: &'static str = "config/Hedge.toml";
    pub const ENV_PREFIX: &'static str = "HEDGE_";

    /// Loads configuration from the default TOML file merged with `HEDGE_` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed or fails validation.
    pub fn load() -> Result<AppConfig> {
        Self::load_from(Self::DEFAULT_PATH)
    }

    /// Loads configuration from `path`, letting environment variables override it.
    ///
    /// Nested keys use `__` as separator, e.g. `HEDGE_DERIBIT__CLIENT_SECRET`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed or fails validation.
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig> {
        let path = path.as_ref();
        let config: AppConfig = Self::figment(path)
            .extract()
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

        let config = config.validated().context("Invalid configuration")?;
        Ok(config)
    }

    #[must_use]
    pub fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(Self::ENV_PREFIX).split("__"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Symbol;
    use figment::Jail;
    use rust_decimal_macros::dec;

    const TOML: &str = r#"
        [hedge]
        symbol = "BTC"
        threshold = 0.001
        strike = 27000
        price_change_percent = 0.025

        [schedule]
        dwell_secs = 5
    "#;

    #[test]
    fn loads_file_and_applies_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("Hedge.toml", TOML)?;
            let config = ConfigLoader::load_from("Hedge.toml").map_err(|e| e.to_string())?;

            assert_eq!(config.hedge.symbol, Symbol::Btc);
            assert_eq!(config.hedge.threshold, dec!(0.001));
            assert_eq!(config.hedge.strike, dec!(27000));
            assert_eq!(config.hedge.num_levels, None);
            assert_eq!(config.schedule.chase_timeout_secs, 60);
            assert!(config.telegram.is_none());
            assert!(!config.resume_hedged);
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file_and_supplies_credentials() {
        Jail::expect_with(|jail| {
            jail.create_file("Hedge.toml", TOML)?;
            jail.set_env("HEDGE_HEDGE__SYMBOL", "ETH");
            jail.set_env("HEDGE_RESUME_HEDGED", "true");
            jail.set_env("HEDGE_DERIBIT__CLIENT_ID", "abc");
            jail.set_env("HEDGE_DERIBIT__CLIENT_SECRET", "xyz");
            let config = ConfigLoader::load_from("Hedge.toml").map_err(|e| e.to_string())?;

            assert_eq!(config.hedge.symbol, Symbol::Eth);
            assert!(config.resume_hedged);
            assert_eq!(config.deribit.client_id.as_deref(), Some("abc"));
            assert_eq!(config.deribit.client_secret.as_deref(), Some("xyz"));
            Ok(())
        });
    }

    #[test]
    fn unsupported_symbol_is_fatal_at_load() {
        Jail::expect_with(|jail| {
            jail.create_file("Hedge.toml", &TOML.replace("\"BTC\"", "\"SOL\""))?;
            let err = ConfigLoader::load_from("Hedge.toml").unwrap_err();
            assert!(format!("{err:#}").contains("SOL"));
            Ok(())
        });
    }
}
