use serde::{Deserialize, Deserializer, Serialize, de};

/// Wrapper for hex-encoded binary data sent to relay endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HexEncodedData {
    pub data: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeePayer {
    #[default]
    Sender,
    Receiver,
}

impl FeePayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeePayer::Sender => "sender",
            FeePayer::Receiver => "receiver",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxInfos {
    #[serde(deserialize_with = "string_or_number")]
    pub gas_price: String,
    #[serde(deserialize_with = "string_or_number")]
    pub balance: String,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub name: String,
    pub abbreviation: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDetails {
    pub name: String,
    pub abbreviation: String,
    pub address: String,
    pub decimals: u8,
    #[serde(default)]
    pub num_users: u64,
    #[serde(default)]
    pub interest_rate_decimals: u8,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub default_interest_rate: Option<String>,
    #[serde(default)]
    pub custom_interests: bool,
    #[serde(default)]
    pub prevent_mediator_interests: bool,
    #[serde(default)]
    pub is_frozen: bool,
}

/// Per-user aggregate over all trustlines of one network, raw units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOverviewRaw {
    #[serde(deserialize_with = "string_or_number")]
    pub balance: String,
    #[serde(deserialize_with = "string_or_number")]
    pub given: String,
    #[serde(deserialize_with = "string_or_number")]
    pub received: String,
    #[serde(deserialize_with = "string_or_number")]
    pub left_given: String,
    #[serde(deserialize_with = "string_or_number")]
    pub left_received: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustlineRaw {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    pub counter_party: String,
    #[serde(deserialize_with = "string_or_number")]
    pub balance: String,
    #[serde(deserialize_with = "string_or_number")]
    pub given: String,
    #[serde(deserialize_with = "string_or_number")]
    pub received: String,
    #[serde(deserialize_with = "string_or_number")]
    pub left_given: String,
    #[serde(deserialize_with = "string_or_number")]
    pub left_received: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub interest_rate_given: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub interest_rate_received: Option<String>,
    #[serde(default)]
    pub is_frozen: bool,
}

/// Route found by the relay; `fees` is the maximum fee in raw units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathResponse {
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub fees: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub value: String,
    #[serde(default)]
    pub fee_payer: Option<FeePayer>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PathQuery {
    pub value: Option<String>,
    pub max_hops: Option<u32>,
    pub max_fees: Option<String>,
    pub fee_payer: Option<FeePayer>,
}

impl PathQuery {
    pub fn to_pairs(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("value", self.value.clone()),
            ("maxHops", self.max_hops.map(|h| h.to_string())),
            ("maxFees", self.max_fees.clone()),
            ("feePayer", self.fee_payer.map(|f| f.as_str().to_string())),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventQuery {
    pub event_type: Option<String>,
    pub from_block: Option<u64>,
}

impl EventQuery {
    pub fn of_type(event_type: &str) -> Self {
        Self {
            event_type: Some(event_type.to_string()),
            from_block: None,
        }
    }

    pub fn to_pairs(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("type", self.event_type.clone()),
            ("fromBlock", self.from_block.map(|b| b.to_string())),
        ]
    }
}

/// Event as delivered by the relay, before amounts are scaled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub network_address: Option<String>,
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub log_index: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub counter_party: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub amount: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub given: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub received: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub interest_rate_given: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub interest_rate_received: Option<String>,
    #[serde(default)]
    pub is_frozen: Option<bool>,
    #[serde(default)]
    pub extra_data: Option<String>,
}

// The relay sends big integers as strings but small ones occasionally as
// plain JSON numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(de::Error::custom(format!(
            "expected a string or number, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tx_infos_accept_numbers_and_strings() {
        let infos: TxInfos =
            serde_json::from_value(json!({"gasPrice": 1000000000, "balance": "5", "nonce": 7}))
                .unwrap();
        assert_eq!(infos.gas_price, "1000000000");
        assert_eq!(infos.balance, "5");
        assert_eq!(infos.nonce, 7);
    }

    #[test]
    fn event_with_missing_fields() {
        let event: RawEvent = serde_json::from_value(json!({
            "type": "Transfer",
            "blockNumber": 12,
            "amount": "100",
            "extraData": "0x",
            "somethingNew": true
        }))
        .unwrap();
        assert_eq!(event.event_type, "Transfer");
        assert_eq!(event.block_number, Some(12));
        assert_eq!(event.amount.as_deref(), Some("100"));
        assert_eq!(event.given, None);
    }

    #[test]
    fn fee_payer_is_lowercase() {
        assert_eq!(serde_json::to_value(FeePayer::Receiver).unwrap(), json!("receiver"));
        let path: PathResponse =
            serde_json::from_value(json!({"path": [], "fees": "0", "value": "1", "feePayer": "sender"}))
                .unwrap();
        assert_eq!(path.fee_payer, Some(FeePayer::Sender));
    }
}
