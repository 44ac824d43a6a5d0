//! Configuration management

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server host (default: 0.0.0.0)
    pub host: String,
    /// Server port (default: 3000)
    pub port: u16,
    /// Log level (default: info)
    pub log_level: String,
    /// Enable HTTP transport
    pub http_transport: bool,
    /// Enable stdio transport
    pub stdio_transport: bool,
    /// Base URL of the eTabeb REST API
    pub upstream_base_url: String,
    /// Base URL of the booking web app linked from the widget
    pub booking_app_url: String,
    /// Upstream request timeout in seconds
    pub upstream_timeout_secs: u64,
    /// Session entry time-to-live in seconds
    pub session_ttl_secs: u64,
    /// Maximum number of concurrent session entries
    pub session_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            http_transport: true,
            stdio_transport: false,
            upstream_base_url: "https://api.etabeb.com".to_string(),
            booking_app_url: "https://booking.etabeb.com".to_string(),
            upstream_timeout_secs: 15,
            session_ttl_secs: 900,
            session_capacity: 1024,
        }
    }
}

impl ServerConfig {
    /// Build a configuration from defaults overridden by environment
    /// variables. Unset or unparseable variables fall back silently.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(v) = get("ETABEB_API_BASE_URL") {
            config.upstream_base_url = v;
        }
        if let Some(v) = get("BOOKING_APP_URL") {
            config.booking_app_url = v;
        }
        if let Some(port) = get("PORT").and_then(|v| v.parse().ok()) {
            config.port = port;
        }
        if let Some(secs) = get("UPSTREAM_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.upstream_timeout_secs = secs;
        }
        if let Some(secs) = get("SESSION_TTL_SECS").and_then(|v| v.parse().ok()) {
            config.session_ttl_secs = secs;
        }
        if let Some(capacity) = get("SESSION_CAPACITY").and_then(|v| v.parse().ok()) {
            config.session_capacity = capacity;
        }
        config
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}
