//! Service configuration read from environment variables.
//!
//! | variable | default |
//! |---|---|
//! | `DATABASE_URL` | required |
//! | `HOST` | `0.0.0.0` |
//! | `PORT` | `3000` |
//! | `RAILWAY_ENVIRONMENT` | unset (`local`) |
//! | `DB_POOL_MAX` | `10` |
//! | `DB_CONNECT_RETRIES` | `10` |
//! | `DB_RETRY_DELAY_MS` | `3000` |
//! | `DB_ATTEMPT_TIMEOUT_MS` | `5000` |

use rapport_core::bootstrap::BootstrapConfig;
use rapport_pg::PoolConfig;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Errors raised while reading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("invalid value for {name}: {value:?}")]
    Invalid {
        /// The variable name.
        name: &'static str,
        /// The raw value.
        value: String,
    },
}

/// Where the service is deployed, as reported by the health endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentTag {
    /// Running on Railway.
    Railway,
    /// Anywhere else.
    #[default]
    Local,
}

impl fmt::Display for EnvironmentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EnvironmentTag::Railway => "railway",
            EnvironmentTag::Local => "local",
        })
    }
}

/// Everything the server binary needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind; `0` picks a free one.
    pub port: u16,
    /// Deployment environment.
    pub environment: EnvironmentTag,
    /// Database pool settings.
    pub pool: PoolConfig,
    /// Connection retry policy.
    pub bootstrap: BootstrapConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: EnvironmentTag::default(),
            pool: PoolConfig::default(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

fn parse<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(None),
    }
}

fn millis<F>(lookup: &F, name: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(parse::<u64, F>(lookup, name)?.map(Duration::from_millis))
}

impl ServiceConfig {
    /// Reads the configuration through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let environment = match lookup("RAILWAY_ENVIRONMENT") {
            Some(value) if !value.is_empty() => EnvironmentTag::Railway,
            _ => EnvironmentTag::Local,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "PORT")?.unwrap_or(defaults.port),
            environment,
            pool: PoolConfig {
                url,
                max_connections: parse(&lookup, "DB_POOL_MAX")?
                    .unwrap_or(defaults.pool.max_connections),
                ..defaults.pool
            },
            bootstrap: BootstrapConfig {
                max_attempts: parse(&lookup, "DB_CONNECT_RETRIES")?
                    .unwrap_or(defaults.bootstrap.max_attempts),
                retry_delay: millis(&lookup, "DB_RETRY_DELAY_MS")?
                    .unwrap_or(defaults.bootstrap.retry_delay),
                attempt_timeout: millis(&lookup, "DB_ATTEMPT_TIMEOUT_MS")?
                    .unwrap_or(defaults.bootstrap.attempt_timeout),
            },
        })
    }

    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// The `host:port` string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
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
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_url_is_set() {
        let config =
            ServiceConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://db/rapport")]))
                .unwrap();

        assert_eq!(config.pool.url, "postgres://db/rapport");
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.environment, EnvironmentTag::Local);
        assert_eq!(config.bootstrap, BootstrapConfig::default());
        assert_eq!(config.pool.max_connections, 10);
    }

    #[test]
    fn database_url_is_required() {
        let err = ServiceConfig::from_lookup(lookup(&[("PORT", "8080")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
        assert_eq!(
            err.to_string(),
            "missing required environment variable DATABASE_URL"
        );
    }

    #[test]
    fn overrides_are_parsed() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/rapport"),
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("RAILWAY_ENVIRONMENT", "production"),
            ("DB_POOL_MAX", "4"),
            ("DB_CONNECT_RETRIES", "3"),
            ("DB_RETRY_DELAY_MS", "250"),
            ("DB_ATTEMPT_TIMEOUT_MS", "1000"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.environment, EnvironmentTag::Railway);
        assert_eq!(config.pool.max_connections, 4);
        assert_eq!(
            config.bootstrap,
            BootstrapConfig {
                max_attempts: 3,
                retry_delay: Duration::from_millis(250),
                attempt_timeout: Duration::from_secs(1),
            }
        );
    }

    #[test]
    fn empty_railway_environment_is_local() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/rapport"),
            ("RAILWAY_ENVIRONMENT", ""),
        ]))
        .unwrap();
        assert_eq!(config.environment, EnvironmentTag::Local);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = ServiceConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/rapport"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();

        match err {
            ConfigError::Invalid { name, value } => {
                assert_eq!(name, "PORT");
                assert_eq!(value, "eighty");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
