//! Runtime settings read from the environment (a `.env` file is loaded by the server binary).

use crate::error::ConfigError;
use regex::Regex;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HOST_SCHEMA: &str = "host";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::Invalid {
                key: "APP_ENV",
                message: format!("{} (expected development or production)", s),
            }),
        }
    }
}

/// Sizing for the per-tenant connection pools.
#[derive(Clone, Debug)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        PoolSettings {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MediaSettings {
    pub bucket: String,
    /// Prefix for public object URLs, e.g. `https://bucket.s3.amazonaws.com`.
    pub public_base_url: String,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub host_database_url: String,
    pub host_schema: String,
    pub bind_addr: SocketAddr,
    pub tenant_pool: PoolSettings,
    pub max_body_bytes: usize,
    pub media: Option<MediaSettings>,
    pub environment: Environment,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host_database_url = lookup("HOST_DATABASE_URL")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("HOST_DATABASE_URL"))?;

        let host_schema = lookup("HOST_SCHEMA").unwrap_or_else(|| DEFAULT_HOST_SCHEMA.into());
        check_identifier("HOST_SCHEMA", &host_schema)?;

        let bind_addr = parse_or("BIND_ADDR", lookup("BIND_ADDR"), DEFAULT_BIND_ADDR.parse().ok())?;
        let defaults = PoolSettings::default();
        let max_connections = parse_or(
            "TENANT_POOL_MAX_CONNECTIONS",
            lookup("TENANT_POOL_MAX_CONNECTIONS"),
            Some(defaults.max_connections),
        )?;
        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "TENANT_POOL_MAX_CONNECTIONS",
                message: "must be at least 1".into(),
            });
        }
        let acquire_secs: u64 = parse_or(
            "TENANT_POOL_ACQUIRE_TIMEOUT_SECS",
            lookup("TENANT_POOL_ACQUIRE_TIMEOUT_SECS"),
            Some(defaults.acquire_timeout.as_secs()),
        )?;
        let max_body_bytes = parse_or("MAX_BODY_BYTES", lookup("MAX_BODY_BYTES"), Some(DEFAULT_MAX_BODY_BYTES))?;

        let media = match lookup("MEDIA_BUCKET").filter(|s| !s.is_empty()) {
            Some(bucket) => {
                let public_base_url = lookup("MEDIA_PUBLIC_BASE_URL")
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| format!("https://{}.s3.amazonaws.com", bucket));
                Some(MediaSettings {
                    bucket,
                    public_base_url: public_base_url.trim_end_matches('/').to_string(),
                })
            }
            None => None,
        };

        let environment = match lookup("APP_ENV") {
            Some(v) => v.parse()?,
            None => Environment::Production,
        };

        Ok(Settings {
            host_database_url,
            host_schema,
            bind_addr,
            tenant_pool: PoolSettings {
                max_connections,
                acquire_timeout: Duration::from_secs(acquire_secs),
            },
            max_body_bytes,
            media,
            environment,
        })
    }
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: Option<T>) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        }),
        None => default.ok_or(ConfigError::Missing(key)),
    }
}

/// `value` must be an unquoted PostgreSQL identifier; it is interpolated into DDL.
pub fn check_identifier(key: &'static str, value: &str) -> Result<(), ConfigError> {
    let re = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").map_err(|e| ConfigError::Invalid {
        key,
        message: format!("identifier pattern: {}", e),
    })?;
    if !re.is_match(value) {
        return Err(ConfigError::Invalid {
            key,
            message: format!("{} is not a valid identifier", value),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings_from(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let s = settings_from(&[("HOST_DATABASE_URL", "postgres://localhost/host")]).unwrap();
        assert_eq!(s.host_schema, "host");
        assert_eq!(s.bind_addr.port(), 3000);
        assert_eq!(s.tenant_pool.max_connections, 5);
        assert_eq!(s.environment, Environment::Production);
        assert!(s.media.is_none());
    }

    #[test]
    fn missing_database_url_is_reported() {
        let err = settings_from(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("HOST_DATABASE_URL")));
    }

    #[test]
    fn rejects_unsafe_schema_name() {
        let err = settings_from(&[
            ("HOST_DATABASE_URL", "postgres://localhost/host"),
            ("HOST_SCHEMA", "host; DROP TABLE x"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "HOST_SCHEMA", .. }));
    }

    #[test]
    fn identifiers() {
        assert!(check_identifier("HOST_SCHEMA", "host_1").is_ok());
        assert!(check_identifier("HOST_SCHEMA", "_private").is_ok());
        assert!(check_identifier("HOST_SCHEMA", "1host").is_err());
        assert!(check_identifier("HOST_SCHEMA", &"a".repeat(64)).is_err());
        assert!(check_identifier("HOST_SCHEMA", "").is_err());
    }

    #[test]
    fn development_environment_is_recognised() {
        let s = settings_from(&[("HOST_DATABASE_URL", "postgres://localhost/host"), ("APP_ENV", "Development")]).unwrap();
        assert_eq!(s.environment, Environment::Development);
        assert!(settings_from(&[("HOST_DATABASE_URL", "postgres://localhost/host"), ("APP_ENV", "staging")]).is_err());
    }

    #[test]
    fn media_url_defaults_from_bucket() {
        let s = settings_from(&[
            ("HOST_DATABASE_URL", "postgres://localhost/host"),
            ("MEDIA_BUCKET", "forum-media"),
        ])
        .unwrap();
        let media = s.media.unwrap();
        assert_eq!(media.public_base_url, "https://forum-media.s3.amazonaws.com");
    }

    #[test]
    fn invalid_number_is_reported_with_key() {
        let err = settings_from(&[
            ("HOST_DATABASE_URL", "postgres://localhost/host"),
            ("TENANT_POOL_MAX_CONNECTIONS", "many"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TENANT_POOL_MAX_CONNECTIONS", .. }));
    }
}
