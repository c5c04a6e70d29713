//! Configuration schema definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

/// Signing secret shipped in the default config. Refused in production.
pub const DEFAULT_SECRET_KEY: &str = "change_this_to_a_secure_random_string_in_production";

/// Password of the bootstrap principal when none is configured
pub const DEFAULT_BOOTSTRAP_PASSWORD: &str = "admin123";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub content: ContentConfig,

    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(Error::Config(format!("Unknown environment: {}", other))),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub environment: Environment,

    /// Externally reachable base URL, pinged periodically in production
    #[serde(default)]
    pub external_url: Option<String>,

    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Honour X-Forwarded-For / X-Real-IP when identifying clients
    #[serde(default)]
    pub trust_proxy: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://localhost:3000".to_string(),
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: Environment::default(),
            external_url: None,
            cors_origins: default_cors_origins(),
            trust_proxy: false,
        }
    }
}

/// Backing store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string. When unset the in-memory store is used.
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Token and credential configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_secret_key")]
    pub secret_key: String,

    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    #[serde(default = "default_access_token_expire_minutes")]
    pub access_token_expire_minutes: i64,

    #[serde(default = "default_login_attempts_per_minute")]
    pub login_attempts_per_minute: usize,

    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

fn default_secret_key() -> String {
    DEFAULT_SECRET_KEY.to_string()
}

fn default_algorithm() -> String {
    "HS256".to_string()
}

fn default_access_token_expire_minutes() -> i64 {
    240
}

fn default_login_attempts_per_minute() -> usize {
    5
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_key: default_secret_key(),
            algorithm: default_algorithm(),
            access_token_expire_minutes: default_access_token_expire_minutes(),
            login_attempts_per_minute: default_login_attempts_per_minute(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

/// Page-content cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    300
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            cache_enabled: default_cache_enabled(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl ContentConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Principal account created when the store has none
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_bootstrap_username")]
    pub username: String,

    #[serde(default = "default_bootstrap_password")]
    pub password: String,

    #[serde(default = "default_bootstrap_full_name")]
    pub full_name: String,
}

fn default_bootstrap_username() -> String {
    "admin".to_string()
}

fn default_bootstrap_password() -> String {
    DEFAULT_BOOTSTRAP_PASSWORD.to_string()
}

fn default_bootstrap_full_name() -> String {
    "Administrator".to_string()
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            username: default_bootstrap_username(),
            password: default_bootstrap_password(),
            full_name: default_bootstrap_full_name(),
        }
    }
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.server.environment == Environment::Production
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        match self.auth.algorithm.as_str() {
            "HS256" | "HS384" | "HS512" => {}
            other => {
                return Err(Error::Config(format!(
                    "Unsupported token algorithm: {} (expected HS256, HS384 or HS512)",
                    other
                )))
            }
        }

        if self.auth.access_token_expire_minutes <= 0 {
            return Err(Error::Config(
                "access_token_expire_minutes must be positive".to_string(),
            ));
        }

        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(Error::Config(format!(
                "bcrypt_cost must be between 4 and 31, got {}",
                self.auth.bcrypt_cost
            )));
        }

        if self.auth.login_attempts_per_minute == 0 {
            return Err(Error::Config(
                "login_attempts_per_minute must be at least 1".to_string(),
            ));
        }

        if self.is_production() && self.auth.secret_key == DEFAULT_SECRET_KEY {
            return Err(Error::Config(
                "secret_key must be changed before running in production".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.auth.access_token_expire_minutes, 240);
        assert_eq!(config.auth.login_attempts_per_minute, 5);
        assert_eq!(config.content.cache_ttl(), Duration::from_secs(300));
        assert!(config.database.url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_asymmetric_algorithm() {
        let mut config = Config::default();
        config.auth.algorithm = "RS256".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_production_requires_secret() {
        let mut config = Config::default();
        config.server.environment = Environment::Production;
        assert!(config.validate().is_err());

        config.auth.secret_key = "a-real-secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            "Production".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert!("staging".parse::<Environment>().is_err());
    }
}
