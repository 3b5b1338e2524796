//! REST client for the trustlines relay.
//!
//! [`RelayGateway`] is the transport seam: [`HttpRelay`] talks to a real
//! relay over HTTP, [`super::mock_relay::MockRelay`] answers from memory in
//! tests. [`RelayApiClient`] puts one typed method per relay endpoint on top
//! of either.

use super::relay_types::{
    EventQuery, HexEncodedData, NetworkDetails, NetworkSummary, PathQuery, PathResponse, RawEvent,
    TrustlineRaw, TxInfos, UserOverviewRaw,
};
use crate::error::{Result, TlError};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait RelayGateway: Send + Sync {
    /// GET `path` (relative to the API base, query string included).
    async fn get_json(&self, path: &str) -> Result<Value>;

    /// POST a JSON body to `path`.
    async fn post_json(&self, path: &str, body: &Value) -> Result<Value>;
}

#[derive(Debug, Clone)]
pub struct HttpRelay {
    client: Client,
    base_url: String,
}

impl HttpRelay {
    /// # Arguments
    /// * `base_url` - The relay API root (e.g. "https://relay.example.org/api/v1")
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TlError::NetworkUnavailable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl RelayGateway for HttpRelay {
    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        read_response(response).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self.client.post(&url).json(body).send().await?;
        read_response(response).await
    }
}

async fn read_response(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    if status.is_success() {
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        // `relay` answers with a bare transaction hash on some versions.
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    } else {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "No response body".to_string());
        Err(TlError::Relay {
            status: status.as_u16(),
            message: relay_error_message(&body),
        })
    }
}

/// The relay reports errors as `{"message": "..."}`; fall back to the raw
/// body for anything else.
pub fn relay_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Append a query string built from the pairs that have a value.
pub fn with_query(path: &str, pairs: &[(&str, Option<String>)]) -> String {
    let query: Vec<String> = pairs
        .iter()
        .filter_map(|(key, value)| {
            value
                .as_ref()
                .map(|v| format!("{}={}", key, urlencoding::encode(v)))
        })
        .collect();
    if query.is_empty() {
        path.to_string()
    } else {
        let separator = if path.contains('?') { '&' } else { '?' };
        format!("{}{}{}", path, separator, query.join("&"))
    }
}

/// Typed access to every relay endpoint used by the client.
#[derive(Clone)]
pub struct RelayApiClient {
    gateway: Arc<dyn RelayGateway>,
}

impl RelayApiClient {
    pub fn new(gateway: Arc<dyn RelayGateway>) -> Self {
        Self { gateway }
    }

    pub fn http(base_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpRelay::new(base_url, timeout)?)))
    }

    pub fn gateway(&self) -> Arc<dyn RelayGateway> {
        self.gateway.clone()
    }

    pub async fn fetch<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.gateway.get_json(path).await?;
        serde_json::from_value(value)
            .map_err(|e| TlError::Serialization(format!("unexpected response from {}: {}", path, e)))
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let value = self.gateway.post_json(path, body).await?;
        serde_json::from_value(value)
            .map_err(|e| TlError::Serialization(format!("unexpected response from {}: {}", path, e)))
    }

    // -------------------------
    // Currency networks
    // -------------------------

    pub async fn networks(&self) -> Result<Vec<NetworkSummary>> {
        self.fetch("networks").await
    }

    pub async fn network(&self, network: &str) -> Result<NetworkDetails> {
        self.fetch(&format!("networks/{}", network)).await
    }

    pub async fn network_users(&self, network: &str) -> Result<Vec<String>> {
        self.fetch(&format!("networks/{}/users", network)).await
    }

    pub async fn user_overview(&self, network: &str, user: &str) -> Result<UserOverviewRaw> {
        self.fetch(&format!("networks/{}/users/{}", network, user))
            .await
    }

    // -------------------------
    // Trustlines and contacts
    // -------------------------

    pub async fn trustlines(&self, network: &str, user: &str) -> Result<Vec<TrustlineRaw>> {
        self.fetch(&format!("networks/{}/users/{}/trustlines", network, user))
            .await
    }

    pub async fn trustline(
        &self,
        network: &str,
        user: &str,
        counterparty: &str,
    ) -> Result<TrustlineRaw> {
        self.fetch(&format!(
            "networks/{}/users/{}/trustlines/{}",
            network, user, counterparty
        ))
        .await
    }

    pub async fn contacts(&self, network: &str, user: &str) -> Result<Vec<String>> {
        self.fetch(&format!("networks/{}/users/{}/users", network, user))
            .await
    }

    // -------------------------
    // Events
    // -------------------------

    pub fn network_events_path(network: &str, user: &str) -> String {
        format!("networks/{}/users/{}/events", network, user)
    }

    pub fn user_events_path(user: &str) -> String {
        format!("users/{}/events", user)
    }

    pub async fn network_events(
        &self,
        network: &str,
        user: &str,
        query: &EventQuery,
    ) -> Result<Vec<RawEvent>> {
        self.fetch(&with_query(
            &Self::network_events_path(network, user),
            &query.to_pairs(),
        ))
        .await
    }

    pub async fn user_events(&self, user: &str, query: &EventQuery) -> Result<Vec<RawEvent>> {
        self.fetch(&with_query(&Self::user_events_path(user), &query.to_pairs()))
            .await
    }

    // -------------------------
    // Path finding
    // -------------------------

    pub async fn path(
        &self,
        network: &str,
        from: &str,
        to: &str,
        query: &PathQuery,
    ) -> Result<PathResponse> {
        self.fetch(&with_query(
            &format!("networks/{}/users/{}/path/{}", network, from, to),
            &query.to_pairs(),
        ))
        .await
    }

    pub async fn close_path(
        &self,
        network: &str,
        from: &str,
        to: &str,
        query: &PathQuery,
    ) -> Result<PathResponse> {
        self.fetch(&with_query(
            &format!("networks/{}/close-trustline-path-info/{}/{}", network, from, to),
            &query.to_pairs(),
        ))
        .await
    }

    // -------------------------
    // Chain state and submission
    // -------------------------

    pub async fn tx_infos(&self, address: &str) -> Result<TxInfos> {
        self.fetch(&format!("txinfos/{}", address)).await
    }

    pub async fn token_abi(&self) -> Result<Value> {
        self.fetch("tokenabi").await
    }

    pub async fn version(&self) -> Result<String> {
        self.fetch("version").await
    }

    /// Submit a signed raw transaction; returns the transaction hash.
    pub async fn send_signed_transaction(&self, signed_tx_hex: &str) -> Result<String> {
        let data = if signed_tx_hex.starts_with("0x") {
            signed_tx_hex.to_string()
        } else {
            format!("0x{}", signed_tx_hex)
        };
        let body = serde_json::to_value(HexEncodedData { data })?;
        self.post("relay", &body).await
    }

    pub async fn request_ether(&self, address: &str) -> Result<Value> {
        self.gateway
            .post_json("request-ether", &json!({ "address": address }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay_module::mock_relay::MockRelay;

    #[test]
    fn query_skips_missing_values() {
        assert_eq!(
            with_query("networks/0x1/users/0x2/events", &[("type", None), ("fromBlock", None)]),
            "networks/0x1/users/0x2/events"
        );
        assert_eq!(
            with_query(
                "networks/0x1/users/0x2/events",
                &[("type", Some("Transfer".into())), ("fromBlock", Some("10".into()))]
            ),
            "networks/0x1/users/0x2/events?type=Transfer&fromBlock=10"
        );
        assert_eq!(
            with_query("path?value=1", &[("maxHops", Some("3".into()))]),
            "path?value=1&maxHops=3"
        );
    }

    #[test]
    fn relay_errors_prefer_message_field() {
        assert_eq!(
            relay_error_message(r#"{"message": "Unknown network"}"#),
            "Unknown network"
        );
        assert_eq!(relay_error_message(" Bad Gateway \n"), "Bad Gateway");
    }

    #[tokio::test]
    async fn unreachable_relay_is_network_unavailable() {
        let relay = HttpRelay::new("http://127.0.0.1:1/api/v1", Duration::from_secs(2)).unwrap();
        let err = relay.get_json("networks").await.unwrap_err();
        assert!(matches!(err, TlError::NetworkUnavailable(_)), "{:?}", err);
    }

    #[test]
    fn http_relay_joins_paths() {
        let relay = HttpRelay::new("http://relay.test/api/v1/", Duration::from_secs(1)).unwrap();
        assert_eq!(relay.base_url(), "http://relay.test/api/v1");
        assert_eq!(relay.url("/networks"), "http://relay.test/api/v1/networks");
    }

    #[tokio::test]
    async fn send_signed_transaction_posts_data_field() {
        let mock = MockRelay::new();
        mock.on_post("relay", json!("0xabc"));
        let client = RelayApiClient::new(Arc::new(mock.clone()));

        let hash = client.send_signed_transaction("f86b01").await.unwrap();
        assert_eq!(hash, "0xabc");
        assert_eq!(
            mock.posted(),
            vec![("relay".to_string(), json!({ "data": "0xf86b01" }))]
        );
    }

    #[tokio::test]
    async fn typed_fetch_reports_shape_errors() {
        let mock = MockRelay::new();
        mock.on_get("networks", json!({ "not": "a list" }));
        let client = RelayApiClient::new(Arc::new(mock));
        let err = client.networks().await.unwrap_err();
        assert!(matches!(err, TlError::Serialization(_)));
    }

    #[tokio::test]
    async fn version_and_token_abi() {
        let mock = MockRelay::new();
        mock.on_get("version", json!("relay/0.21.0"));
        mock.on_get("tokenabi", json!([{"type": "function", "name": "transfer"}]));
        let client = RelayApiClient::new(Arc::new(mock.clone()));

        assert_eq!(client.version().await.unwrap(), "relay/0.21.0");
        let abi = client.token_abi().await.unwrap();
        assert_eq!(abi[0]["name"], "transfer");
        assert_eq!(mock.requests(), vec!["version".to_string(), "tokenabi".to_string()]);
    }

    #[tokio::test]
    async fn relay_errors_propagate() {
        let mock = MockRelay::new();
        mock.on_get_error("networks/0x1", 404, "Unknown network");
        let client = RelayApiClient::new(Arc::new(mock));
        match client.network("0x1").await.unwrap_err() {
            TlError::Relay { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Unknown network");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
