//! Keep-alive ping for hosts that idle instances without traffic

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;

use super::server::HEALTH_PATH;

const PING_INTERVAL: Duration = Duration::from_secs(30);
const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Health URL to ping, when the deployment wants pinging at all
pub fn ping_url(config: &Config) -> Option<String> {
    if !config.is_production() {
        return None;
    }
    let base = config.server.external_url.as_deref()?.trim_end_matches('/');
    if base.is_empty() {
        return None;
    }
    Some(format!("{}{}", base, HEALTH_PATH))
}

/// Start pinging our own health endpoint in production
pub fn spawn(config: &Config) -> Option<JoinHandle<()>> {
    let url = ping_url(config)?;

    let client = match reqwest::Client::builder().timeout(PING_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            warn!("keep-alive disabled, could not build HTTP client: {}", e);
            return None;
        }
    };

    info!(url = %url, "keep-alive task started");
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(PING_INTERVAL);
        // The first tick completes immediately; give the listener time to bind
        interval.tick().await;

        loop {
            interval.tick().await;
            match client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(status = response.status().as_u16(), "keep-alive ping ok");
                }
                Ok(response) => {
                    warn!(status = response.status().as_u16(), "keep-alive ping failed");
                }
                Err(e) => warn!("keep-alive ping error: {}", e),
            }
        }
    }))
}
