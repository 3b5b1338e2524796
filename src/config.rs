use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub static RELAY_API_URL: LazyLock<String> = LazyLock::new(|| {
    std::env::var("RELAY_API_URL").unwrap_or("http://0.0.0.0:5000/api/v1".to_string())
});
pub static RELAY_WS_URL: LazyLock<String> = LazyLock::new(|| {
    std::env::var("RELAY_WS_URL").unwrap_or_else(|_| ws_url_from_api_url(&RELAY_API_URL))
});
pub static USE_WEBSOCKETS: LazyLock<bool> =
    LazyLock::new(|| env_flag("USE_WEBSOCKETS").unwrap_or(false));
pub static POLL_INTERVAL_MS: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("POLL_INTERVAL_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(500)
});
pub static REQUEST_TIMEOUT_SECS: LazyLock<u64> = LazyLock::new(|| {
    std::env::var("REQUEST_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30)
});
pub static CHAIN_ID: LazyLock<Option<u64>> =
    LazyLock::new(|| std::env::var("CHAIN_ID").ok().and_then(|v| v.parse().ok()));

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Derive the relay's WebSocket base URL from its REST base URL.
pub fn ws_url_from_api_url(api_url: &str) -> String {
    if let Some(rest) = api_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        api_url.to_string()
    }
}

/// Relay endpoints and transport settings for a client instance.
///
/// `use_websockets` is the transport capability flag: it is read once when
/// the network is constructed and decides whether subscriptions poll the
/// REST API or keep a socket open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlConfig {
    pub relay_api_url: String,
    pub relay_ws_url: String,
    pub use_websockets: bool,
    pub poll_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub chain_id: Option<u64>,
}

impl Default for TlConfig {
    fn default() -> Self {
        Self {
            relay_api_url: RELAY_API_URL.to_string(),
            relay_ws_url: RELAY_WS_URL.to_string(),
            use_websockets: *USE_WEBSOCKETS,
            poll_interval_ms: *POLL_INTERVAL_MS,
            request_timeout_secs: *REQUEST_TIMEOUT_SECS,
            chain_id: *CHAIN_ID,
        }
    }
}

impl TlConfig {
    pub fn new(relay_api_url: &str, relay_ws_url: Option<&str>, use_websockets: bool) -> Self {
        let relay_api_url = relay_api_url.trim_end_matches('/').to_string();
        let relay_ws_url = relay_ws_url
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| ws_url_from_api_url(&relay_api_url));
        Self {
            relay_api_url,
            relay_ws_url,
            use_websockets,
            poll_interval_ms: 500,
            request_timeout_secs: 30,
            chain_id: None,
        }
    }

    /// Read the configuration from the process environment, bypassing the
    /// cached statics.
    pub fn from_env() -> Self {
        let relay_api_url = std::env::var("RELAY_API_URL")
            .unwrap_or("http://0.0.0.0:5000/api/v1".to_string())
            .trim_end_matches('/')
            .to_string();
        let relay_ws_url = std::env::var("RELAY_WS_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| ws_url_from_api_url(&relay_api_url));
        Self {
            relay_api_url,
            relay_ws_url,
            use_websockets: env_flag("USE_WEBSOCKETS").unwrap_or(false),
            poll_interval_ms: std::env::var("POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            chain_id: std::env::var("CHAIN_ID").ok().and_then(|v| v.parse().ok()),
        }
    }

    pub fn update_relay_api_url(&mut self, url: String) {
        self.relay_api_url = url.trim_end_matches('/').to_string();
    }
    pub fn update_relay_ws_url(&mut self, url: String) {
        self.relay_ws_url = url.trim_end_matches('/').to_string();
    }
    pub fn update_use_websockets(&mut self, use_websockets: bool) {
        self.use_websockets = use_websockets;
    }
    pub fn update_poll_interval_ms(&mut self, interval_ms: u64) {
        self.poll_interval_ms = interval_ms;
    }
    pub fn update_request_timeout_secs(&mut self, secs: u64) {
        self.request_timeout_secs = secs;
    }
    pub fn update_chain_id(&mut self, chain_id: Option<u64>) {
        self.chain_id = chain_id;
    }
}
