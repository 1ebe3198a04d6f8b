use serde::Deserialize;
use std::env;
use transix_catalog::FareConfig;
use transix_core::{CoreResult, Money};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub gateway: GatewayConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Absent in local development; the API falls back to the in-memory
    /// store.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub name: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    pub service_fee: f64,
    pub currency: String,
}

impl BusinessRules {
    /// Normalize the configured fee into the canonical money type once, at
    /// the boundary.
    pub fn fare_config(&self) -> CoreResult<FareConfig> {
        Ok(FareConfig {
            service_fee: Money::from_f64(self.service_fee)?,
            currency: self.currency.clone(),
        })
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Base configuration, checked in.
            .add_source(config::File::with_name("config/default"))
            // Environment-specific overrides, optional.
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in.
            .add_source(config::File::with_name("config/local").required(false))
            // Environment variables win: TRANSIX__SERVER__PORT etc.
            .add_source(config::Environment::with_prefix("TRANSIX").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fare_config_normalizes_fee() {
        let rules = BusinessRules {
            service_fee: 2.0,
            currency: "USD".to_string(),
        };
        let fare = rules.fare_config().unwrap();
        assert_eq!(fare.service_fee.amount(), dec!(2.00));
        assert_eq!(fare.currency, "USD");
    }
}
