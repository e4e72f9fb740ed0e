use std::str::FromStr;

use thiserror::Error;

const DEFAULT_DATABASE_URL: &str = "recipes.db";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_POOL_MAX_SIZE: u32 = 8;

#[derive(Debug, Error, PartialEq)]
pub(crate) enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Runtime settings, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub pool_max_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            pool_max_size: DEFAULT_POOL_MAX_SIZE,
        }
    }
}

impl Config {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let pool_max_size = parsed(&lookup, "RECIPES_POOL_SIZE", defaults.pool_max_size)?;
        if pool_max_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RECIPES_POOL_SIZE",
                value: "0".to_string(),
            });
        }
        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            host: lookup("RECIPES_HOST").unwrap_or(defaults.host),
            port: parsed(&lookup, "RECIPES_PORT", defaults.port)?,
            pool_max_size,
        })
    }
}

fn parsed<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", ":memory:"),
            ("RECIPES_HOST", "0.0.0.0"),
            ("RECIPES_PORT", "5000"),
            ("RECIPES_POOL_SIZE", "2"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, ":memory:");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.pool_max_size, 2);
    }

    #[test]
    fn test_invalid_values() {
        let err = Config::from_lookup(lookup(&[("RECIPES_PORT", "eighty")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "RECIPES_PORT",
                value: "eighty".to_string(),
            }
        );
        assert!(Config::from_lookup(lookup(&[("RECIPES_POOL_SIZE", "0")])).is_err());
    }
}
