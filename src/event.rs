//! Relay events scaled for display.
//!
//! Amount fields become [`Amount`]s in the network's decimals, interest
//! rates use the network's interest rate decimals, and `extraData` is run
//! through [`extra_data::decode`]. Data that is not an envelope of ours
//! leaves `extra_data` at `None`.

use crate::amount::{Amount, format_to_amount};
use crate::config::TlConfig;
use crate::currency_network::{CurrencyNetwork, DecimalsOverride, NetworkDecimals};
use crate::error::{Result, TlError};
use crate::extra_data::{self, ExtraData};
use crate::relay_module::relay_api::{RelayApiClient, with_query};
use crate::relay_module::relay_stream::Subscription;
use crate::relay_module::relay_types::{EventQuery, RawEvent};
use crate::signer::TxSigner;
use crate::utils::parse_address;
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub const TRANSFER_EVENT: &str = "Transfer";
pub const TRUSTLINE_UPDATE_REQUEST_EVENT: &str = "TrustlineUpdateRequest";
pub const TRUSTLINE_UPDATE_CANCEL_EVENT: &str = "TrustlineUpdateCancel";
pub const TRUSTLINE_UPDATE_EVENT: &str = "TrustlineUpdate";

const WS_RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub network_address: Option<String>,
    pub block_number: Option<u64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub transaction_hash: Option<String>,
    pub log_index: Option<u64>,
    pub status: Option<String>,
    pub direction: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub user: Option<String>,
    pub counter_party: Option<String>,
    pub amount: Option<Amount>,
    pub given: Option<Amount>,
    pub received: Option<Amount>,
    pub interest_rate_given: Option<Amount>,
    pub interest_rate_received: Option<Amount>,
    pub is_frozen: Option<bool>,
    /// The data exactly as it appeared on chain.
    pub raw_extra_data: Option<String>,
    pub extra_data: Option<ExtraData>,
}

pub fn format_event(raw: RawEvent, decimals: NetworkDecimals) -> Result<FormattedEvent> {
    let amount = |v: &Option<String>, d: u8| -> Result<Option<Amount>> {
        v.as_deref().map(|raw| format_to_amount(raw, d)).transpose()
    };
    let timestamp = match raw.timestamp {
        Some(secs) => Some(DateTime::<Utc>::from_timestamp(secs, 0).ok_or_else(|| {
            TlError::Serialization(format!("event timestamp {} out of range", secs))
        })?),
        None => None,
    };

    Ok(FormattedEvent {
        amount: amount(&raw.amount, decimals.network_decimals)?,
        given: amount(&raw.given, decimals.network_decimals)?,
        received: amount(&raw.received, decimals.network_decimals)?,
        interest_rate_given: amount(&raw.interest_rate_given, decimals.interest_rate_decimals)?,
        interest_rate_received: amount(
            &raw.interest_rate_received,
            decimals.interest_rate_decimals,
        )?,
        extra_data: raw.extra_data.as_deref().and_then(extra_data::decode),
        raw_extra_data: raw.extra_data,
        event_type: raw.event_type,
        network_address: raw.network_address,
        block_number: raw.block_number,
        timestamp,
        transaction_hash: raw.transaction_hash,
        log_index: raw.log_index,
        status: raw.status,
        direction: raw.direction,
        from: raw.from,
        to: raw.to,
        user: raw.user,
        counter_party: raw.counter_party,
        is_frozen: raw.is_frozen,
    })
}

#[derive(Clone)]
pub struct Event {
    relay: RelayApiClient,
    currency_network: CurrencyNetwork,
    signer: Arc<dyn TxSigner>,
    config: TlConfig,
}

impl Event {
    pub fn new(
        relay: RelayApiClient,
        currency_network: CurrencyNetwork,
        signer: Arc<dyn TxSigner>,
        config: TlConfig,
    ) -> Self {
        Self {
            relay,
            currency_network,
            signer,
            config,
        }
    }

    fn user(&self) -> String {
        self.signer.address().to_string()
    }

    /// Events of the signer in one network.
    pub async fn get(&self, network: &str, query: &EventQuery) -> Result<Vec<FormattedEvent>> {
        parse_address(network, "network address")?;
        let decimals = self
            .currency_network
            .get_decimals(network, DecimalsOverride::default())
            .await?;
        let events = self
            .relay
            .network_events(network, &self.user(), query)
            .await?;
        events
            .into_iter()
            .map(|event| format_event(event, decimals))
            .collect()
    }

    /// Events of the signer across all networks.
    pub async fn get_all(&self, query: &EventQuery) -> Result<Vec<FormattedEvent>> {
        let events = self.relay.user_events(&self.user(), query).await?;
        let mut decimals_cache = HashMap::new();
        let mut formatted = Vec::with_capacity(events.len());
        for event in events {
            let decimals = self.decimals_for(&event, &mut decimals_cache).await?;
            formatted.push(format_event(event, decimals)?);
        }
        Ok(formatted)
    }

    async fn decimals_for(
        &self,
        event: &RawEvent,
        cache: &mut HashMap<String, NetworkDecimals>,
    ) -> Result<NetworkDecimals> {
        let Some(network) = event.network_address.as_deref() else {
            return Err(TlError::Serialization(format!(
                "{} event without networkAddress",
                event.event_type
            )));
        };
        let key = network.to_ascii_lowercase();
        if let Some(decimals) = cache.get(&key) {
            return Ok(*decimals);
        }
        let decimals = self
            .currency_network
            .get_decimals(network, DecimalsOverride::default())
            .await?;
        cache.insert(key, decimals);
        Ok(decimals)
    }

    /// Live events of the signer. `event_type` narrows to one type.
    ///
    /// Uses the relay's WebSocket stream when `use_websockets` is set,
    /// otherwise polls `users/{addr}/events` every `poll_interval_ms`.
    pub fn stream(&self, event_type: Option<&str>, from_block: Option<u64>) -> EventStream {
        let user = self.user();
        let subscription = if self.config.use_websockets {
            let subscribe = json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "subscribe",
                "params": {
                    "type": event_type.unwrap_or("all"),
                    "user": user,
                },
            });
            Subscription::websocket(
                format!("{}/streams/events", self.config.relay_ws_url),
                subscribe,
                WS_RECONNECT_DELAY,
            )
        } else {
            let path = with_query(
                &RelayApiClient::user_events_path(&user),
                &[("type", event_type.map(str::to_string))],
            );
            Subscription::polling(
                self.relay.gateway(),
                path,
                from_block,
                Duration::from_millis(self.config.poll_interval_ms),
            )
        };
        EventStream {
            subscription,
            event: self.clone(),
            decimals_cache: HashMap::new(),
        }
    }
}

/// A [`Subscription`] that yields formatted events.
pub struct EventStream {
    subscription: Subscription,
    event: Event,
    decimals_cache: HashMap<String, NetworkDecimals>,
}

impl EventStream {
    /// Next event, `None` once the stream has ended. Payloads that are not
    /// events are skipped.
    pub async fn next(&mut self) -> Option<Result<FormattedEvent>> {
        loop {
            let value = self.subscription.next().await?;
            let raw: RawEvent = match serde_json::from_value(value) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("skipping unexpected stream payload: {}", e);
                    continue;
                }
            };
            let decimals = match self.event.decimals_for(&raw, &mut self.decimals_cache).await {
                Ok(decimals) => decimals,
                Err(e) => return Some(Err(e)),
            };
            return Some(format_event(raw, decimals));
        }
    }

    pub async fn unsubscribe(self) {
        self.subscription.unsubscribe().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency_network::tests::{NETWORK, mock_network};
    use crate::relay_module::mock_relay::MockRelay;
    use crate::signer::LocalSigner;
    use tokio::time::timeout;

    const DECIMALS: NetworkDecimals = NetworkDecimals {
        network_decimals: 2,
        interest_rate_decimals: 2,
    };

    fn raw_transfer(extra: &str) -> RawEvent {
        serde_json::from_value(json!({
            "type": "Transfer",
            "networkAddress": NETWORK,
            "blockNumber": 7,
            "timestamp": 1_600_000_000,
            "transactionHash": "0xabc",
            "status": "confirmed",
            "direction": "sent",
            "from": "0x1",
            "to": "0x2",
            "amount": "1234",
            "extraData": extra
        }))
        .unwrap()
    }

    fn event_facade(mock: &MockRelay, signer: &LocalSigner, config: TlConfig) -> Event {
        let relay = RelayApiClient::new(Arc::new(mock.clone()));
        Event::new(
            relay.clone(),
            CurrencyNetwork::new(relay),
            Arc::new(signer.clone()),
            config,
        )
    }

    fn polling_config() -> TlConfig {
        let mut config = TlConfig::new("http://relay.test/api/v1", None, false);
        config.update_poll_interval_ms(10);
        config
    }

    #[test]
    fn transfer_amount_and_extra_data_are_formatted() {
        let encoded = extra_data::encode(&ExtraData::with_payment_request_id("0x1234567890abcdef"))
            .unwrap();
        let event = format_event(raw_transfer(&encoded), DECIMALS).unwrap();
        assert_eq!(event.amount.unwrap().value, "12.34");
        assert_eq!(
            event.extra_data.unwrap().payment_request_id.as_deref(),
            Some("0x1234567890abcdef")
        );
        assert_eq!(event.raw_extra_data.as_deref(), Some(encoded.as_str()));
        assert_eq!(event.timestamp.unwrap().timestamp(), 1_600_000_000);
    }

    #[test]
    fn foreign_extra_data_is_kept_raw() {
        let event = format_event(raw_transfer("0xdeadbeef"), DECIMALS).unwrap();
        assert_eq!(event.extra_data, None);
        assert_eq!(event.raw_extra_data.as_deref(), Some("0xdeadbeef"));

        let event = format_event(raw_transfer("0x"), DECIMALS).unwrap();
        assert_eq!(event.extra_data, None);
    }

    #[test]
    fn update_cancel_carries_no_amounts() {
        let raw: RawEvent = serde_json::from_value(json!({
            "type": TRUSTLINE_UPDATE_CANCEL_EVENT,
            "networkAddress": NETWORK,
            "blockNumber": 12,
            "user": "0x1",
            "counterParty": "0x2",
            "direction": "sent"
        }))
        .unwrap();
        let event = format_event(raw, DECIMALS).unwrap();
        assert_eq!(event.event_type, TRUSTLINE_UPDATE_CANCEL_EVENT);
        assert_eq!(event.counter_party.as_deref(), Some("0x2"));
        assert_eq!(event.given, None);
        assert_eq!(event.extra_data, None);
    }

    #[test]
    fn trustline_update_rates_use_interest_decimals() {
        let raw: RawEvent = serde_json::from_value(json!({
            "type": "TrustlineUpdate",
            "given": "10000",
            "received": "500",
            "interestRateGiven": "150",
            "interestRateReceived": 0,
            "isFrozen": false
        }))
        .unwrap();
        let decimals = NetworkDecimals {
            network_decimals: 4,
            interest_rate_decimals: 2,
        };
        let event = format_event(raw, decimals).unwrap();
        assert_eq!(event.given.unwrap().value, "1");
        assert_eq!(event.received.unwrap().value, "0.05");
        assert_eq!(event.interest_rate_given.unwrap().value, "1.5");
        assert_eq!(event.interest_rate_received.unwrap().value, "0");
        assert_eq!(event.amount, None);
    }

    #[tokio::test]
    async fn get_queries_network_events() {
        let mock = MockRelay::new();
        mock_network(&mock);
        let signer = LocalSigner::random();
        mock.on_get(
            &format!(
                "networks/{}/users/{}/events?type=Transfer",
                NETWORK,
                signer.address()
            ),
            json!([raw_transfer("0x")]),
        );
        let events = event_facade(&mock, &signer, polling_config())
            .get(NETWORK, &EventQuery::of_type(TRANSFER_EVENT))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].amount.as_ref().unwrap().raw, "1234");
    }

    #[tokio::test]
    async fn get_all_looks_up_each_network_once() {
        let mock = MockRelay::new();
        mock_network(&mock);
        let signer = LocalSigner::random();
        mock.on_get(
            &format!("users/{}/events", signer.address()),
            json!([raw_transfer("0x"), raw_transfer("0x")]),
        );
        let events = event_facade(&mock, &signer, polling_config())
            .get_all(&EventQuery::default())
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
        let lookups = mock
            .requests()
            .iter()
            .filter(|path| *path == &format!("networks/{}", NETWORK))
            .count();
        assert_eq!(lookups, 1);
    }

    #[tokio::test]
    async fn polling_stream_formats_events() {
        let mock = MockRelay::new();
        mock_network(&mock);
        let signer = LocalSigner::random();
        mock.on_get(
            &format!("users/{}/events?type=Transfer", signer.address()),
            json!([raw_transfer("0x"), {"unexpected": true}]),
        );
        mock.on_get(
            &format!("users/{}/events?type=Transfer&fromBlock=8", signer.address()),
            json!([]),
        );

        let mut stream = event_facade(&mock, &signer, polling_config())
            .stream(Some(TRANSFER_EVENT), None);
        let event = timeout(Duration::from_secs(2), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(event.amount.unwrap().value, "12.34");
        assert_eq!(event.block_number, Some(7));
        stream.unsubscribe().await;
    }
}
