//! Configuration loading, environment variable interpolation and overrides

use crate::error::{Error, Result};
use regex::Regex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::{Config, Environment};

pub const CONFIG_FILENAME: &str = "schoolhouse.toml";

/// Load configuration from schoolhouse.toml, falling back to defaults when
/// no file is found. Environment overrides are applied last.
pub fn load_config() -> Result<Config> {
    let mut config = match find_config_file() {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading configuration");
            load_config_from_path(&path)?
        }
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |name| env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
    let content = interpolate_env_vars(&content);
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

/// Find the configuration file, searching upward from current directory
fn find_config_file() -> Option<PathBuf> {
    let mut current = env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Interpolate environment variables in the format ${VAR_NAME} or ${VAR_NAME:-default}
fn interpolate_env_vars(content: &str) -> String {
    let re = match Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}") {
        Ok(re) => re,
        Err(_) => return content.to_string(),
    };

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");

        env::var(var_name).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

/// Apply the deployment environment variables on top of file settings.
/// `lookup` is injected so tests do not touch the process environment.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(url) = get("DATABASE_URL") {
        config.database.url = Some(url);
    }
    if let Some(secret) = get("SECRET_KEY") {
        config.auth.secret_key = secret;
    }
    if let Some(algorithm) = get("ALGORITHM") {
        config.auth.algorithm = algorithm.trim().to_uppercase();
    }
    if let Some(minutes) = get("ACCESS_TOKEN_EXPIRE_MINUTES") {
        config.auth.access_token_expire_minutes = minutes.trim().parse().map_err(|_| {
            Error::Config(format!("ACCESS_TOKEN_EXPIRE_MINUTES is not a number: {}", minutes))
        })?;
    }
    if let Some(origins) = get("CORS_ORIGINS") {
        config.server.cors_origins = origins
            .split(',')
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();
    }
    if let Some(environment) = get("ENVIRONMENT") {
        config.server.environment = environment.parse::<Environment>()?;
    }
    if let Some(url) = get("EXTERNAL_URL") {
        config.server.external_url = Some(url.trim_end_matches('/').to_string());
    }
    if let Some(port) = get("PORT") {
        config.server.port = port
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("PORT is not a valid port: {}", port)))?;
    }

    Ok(())
}

/// Generate a default configuration file content
pub fn default_config_content() -> &'static str {
    r#"# Schoolhouse Configuration

[server]
host = "0.0.0.0"
port = 8000
environment = "development"   # or "production"
# external_url = "https://school.example.com"
cors_origins = ["http://localhost:5173", "http://localhost:3000"]
trust_proxy = false

[database]
# Leave unset to run against the in-memory store
# url = "${DATABASE_URL}"
connect_timeout_secs = 10

[auth]
secret_key = "${SECRET_KEY:-change_this_to_a_secure_random_string_in_production}"
algorithm = "HS256"
access_token_expire_minutes = 240
login_attempts_per_minute = 5
bcrypt_cost = 12

[content]
cache_enabled = true
cache_ttl_secs = 300

# Principal account created on first start
[bootstrap]
username = "admin"
password = "${ADMIN_PASSWORD:-admin123}"
full_name = "Administrator"
"#
}
