use crate::amount::{Amount, format_to_amount};
use crate::error::Result;
use crate::relay_module::relay_api::RelayApiClient;
use crate::relay_module::relay_types::{NetworkDetails, NetworkSummary};
use crate::utils::parse_address;
use serde::{Deserialize, Serialize};

/// Decimals used to scale a network's amounts and interest rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDecimals {
    pub network_decimals: u8,
    pub interest_rate_decimals: u8,
}

/// Caller-supplied decimals; when both are set the relay is not asked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecimalsOverride {
    pub decimals: Option<u8>,
    pub interest_rate_decimals: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOverview {
    pub balance: Amount,
    pub given: Amount,
    pub received: Amount,
    pub left_given: Amount,
    pub left_received: Amount,
}

#[derive(Clone)]
pub struct CurrencyNetwork {
    relay: RelayApiClient,
}

impl CurrencyNetwork {
    pub fn new(relay: RelayApiClient) -> Self {
        Self { relay }
    }

    pub async fn get_all(&self) -> Result<Vec<NetworkSummary>> {
        self.relay.networks().await
    }

    pub async fn get_info(&self, network: &str) -> Result<NetworkDetails> {
        parse_address(network, "network address")?;
        self.relay.network(network).await
    }

    pub async fn get_users(&self, network: &str) -> Result<Vec<String>> {
        parse_address(network, "network address")?;
        self.relay.network_users(network).await
    }

    pub async fn get_user_overview(&self, network: &str, user: &str) -> Result<UserOverview> {
        parse_address(network, "network address")?;
        parse_address(user, "user address")?;
        let decimals = self
            .get_decimals(network, DecimalsOverride::default())
            .await?
            .network_decimals;
        let raw = self.relay.user_overview(network, user).await?;
        Ok(UserOverview {
            balance: format_to_amount(&raw.balance, decimals)?,
            given: format_to_amount(&raw.given, decimals)?,
            received: format_to_amount(&raw.received, decimals)?,
            left_given: format_to_amount(&raw.left_given, decimals)?,
            left_received: format_to_amount(&raw.left_received, decimals)?,
        })
    }

    pub async fn get_decimals(
        &self,
        network: &str,
        overrides: DecimalsOverride,
    ) -> Result<NetworkDecimals> {
        if let DecimalsOverride {
            decimals: Some(network_decimals),
            interest_rate_decimals: Some(interest_rate_decimals),
        } = overrides
        {
            return Ok(NetworkDecimals {
                network_decimals,
                interest_rate_decimals,
            });
        }
        let info = self.get_info(network).await?;
        Ok(NetworkDecimals {
            network_decimals: overrides.decimals.unwrap_or(info.decimals),
            interest_rate_decimals: overrides
                .interest_rate_decimals
                .unwrap_or(info.interest_rate_decimals),
        })
    }

    /// Whether `address` is one of the relay's registered networks.
    pub async fn is_network(&self, address: &str) -> Result<bool> {
        let address = parse_address(address, "network address")?;
        let networks = self.relay.networks().await?;
        Ok(networks.iter().any(|network| {
            parse_address(&network.address, "network address")
                .map(|a| a == address)
                .unwrap_or(false)
        }))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::TlError;
    use crate::relay_module::mock_relay::MockRelay;
    use serde_json::json;
    use std::sync::Arc;

    pub(crate) const NETWORK: &str = "0xc5f4ce02d2e0b4e40fdab9f84ef4da4ff7f0e3e1";
    pub(crate) const ALICE: &str = "0xf8e191d2cd72ff35cb8f012685a29b31996614ea";

    pub(crate) fn mock_network(mock: &MockRelay) {
        mock.on_get(
            "networks",
            json!([{"name": "Euro", "abbreviation": "EUR", "address": "0xC5F4CE02D2E0B4E40FDAB9F84EF4DA4FF7F0E3E1"}]),
        );
        mock.on_get(
            &format!("networks/{}", NETWORK),
            json!({
                "name": "Euro",
                "abbreviation": "EUR",
                "address": NETWORK,
                "decimals": 2,
                "numUsers": 3,
                "interestRateDecimals": 2,
                "defaultInterestRate": "0",
                "customInterests": true,
                "preventMediatorInterests": false,
                "isFrozen": false
            }),
        );
    }

    fn currency_network(mock: &MockRelay) -> CurrencyNetwork {
        CurrencyNetwork::new(RelayApiClient::new(Arc::new(mock.clone())))
    }

    #[tokio::test]
    async fn decimals_come_from_the_relay() {
        let mock = MockRelay::new();
        mock_network(&mock);
        let networks = currency_network(&mock);

        let decimals = networks
            .get_decimals(NETWORK, DecimalsOverride::default())
            .await
            .unwrap();
        assert_eq!(decimals.network_decimals, 2);
        assert_eq!(decimals.interest_rate_decimals, 2);

        let decimals = networks
            .get_decimals(
                NETWORK,
                DecimalsOverride {
                    decimals: Some(6),
                    interest_rate_decimals: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(decimals.network_decimals, 6);
    }

    #[tokio::test]
    async fn full_override_skips_the_relay() {
        let mock = MockRelay::new();
        let decimals = currency_network(&mock)
            .get_decimals(
                NETWORK,
                DecimalsOverride {
                    decimals: Some(4),
                    interest_rate_decimals: Some(3),
                },
            )
            .await
            .unwrap();
        assert_eq!(decimals.interest_rate_decimals, 3);
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn user_overview_is_scaled() {
        let mock = MockRelay::new();
        mock_network(&mock);
        mock.on_get(
            &format!("networks/{}/users/{}", NETWORK, ALICE),
            json!({"balance": "-150", "given": "1000", "received": 500, "leftGiven": "1150", "leftReceived": "350"}),
        );
        let overview = currency_network(&mock)
            .get_user_overview(NETWORK, ALICE)
            .await
            .unwrap();
        assert_eq!(overview.balance.value, "-1.5");
        assert_eq!(overview.given.value, "10");
        assert_eq!(overview.received.value, "5");
        assert_eq!(overview.left_given.value, "11.5");
    }

    #[tokio::test]
    async fn network_membership() {
        let mock = MockRelay::new();
        mock_network(&mock);
        let networks = currency_network(&mock);
        assert!(networks.is_network(NETWORK).await.unwrap());
        assert!(!networks.is_network(ALICE).await.unwrap());
        assert!(matches!(
            networks.is_network("euro").await.unwrap_err(),
            TlError::InvalidArgument(_)
        ));
        assert_eq!(networks.get_all().await.unwrap()[0].abbreviation, "EUR");
    }
}
