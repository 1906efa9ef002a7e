//! Reader service connection settings.

use std::time::Duration;

use url::Url;

use crate::error::BridgeError;

/// Default address of the vendor reader service.
pub const DEFAULT_URL: &str = "ws://localhost:8090";

/// Connection, capture and fallback settings for [`crate::FingerprintClient`].
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// WebSocket endpoint of the reader service (`ws://` or `wss://`).
    pub url: String,
    /// Limit on a single connection attempt.
    pub connect_timeout: Duration,
    /// Limit on a whole capture, from command to `captureComplete`.
    pub capture_timeout: Duration,
    /// Extra connection attempts after the first one fails.
    pub max_reconnect_attempts: u32,
    /// Pause between connection attempts.
    pub reconnect_delay: Duration,
    /// Silence after which device discovery stops listening.
    pub device_quiet_period: Duration,
    /// Switch to the simulated reader when the service is unreachable.
    pub simulate_on_unavailable: bool,
    /// Pause between simulated events.
    pub simulation_step_delay: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            connect_timeout: Duration::from_secs(5),
            capture_timeout: Duration::from_secs(30),
            max_reconnect_attempts: 3,
            reconnect_delay: Duration::from_secs(2),
            device_quiet_period: Duration::from_millis(500),
            simulate_on_unavailable: true,
            simulation_step_delay: Duration::from_millis(300),
        }
    }
}

impl BridgeConfig {
    /// Defaults, with the URL overridden by `INVENTA_BIOMETRIC_URL` when set.
    pub fn from_env() -> Result<Self, BridgeError> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var("INVENTA_BIOMETRIC_URL") {
            config.url = parse_url(&raw)?;
        }
        Ok(config)
    }

    /// Replace the endpoint, validating that it is a `ws://` or `wss://` URL.
    pub fn with_url(mut self, raw: &str) -> Result<Self, BridgeError> {
        self.url = parse_url(raw)?;
        Ok(self)
    }
}

fn parse_url(raw: &str) -> Result<String, BridgeError> {
    let url = Url::parse(raw.trim()).map_err(|e| BridgeError::Config(format!("{raw}: {e}")))?;
    match url.scheme() {
        "ws" | "wss" => Ok(url.to_string()),
        other => Err(BridgeError::Config(format!(
            "unsupported scheme \"{other}\" (expected ws or wss)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_service() {
        let config = BridgeConfig::default();
        assert_eq!(config.url, "ws://localhost:8090");
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.capture_timeout, Duration::from_secs(30));
        assert!(config.simulate_on_unavailable);
    }

    #[test]
    fn with_url_rejects_http() {
        let err = BridgeConfig::default()
            .with_url("http://localhost:8090")
            .unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[test]
    fn with_url_accepts_wss() {
        let config = BridgeConfig::default()
            .with_url("wss://reader.local:9443")
            .unwrap();
        assert!(config.url.starts_with("wss://reader.local:9443"));
    }
}
