use crate::amount::{Amount, ETH_DECIMALS, format_to_amount};
use crate::error::Result;
use crate::links::contact_link;
use crate::relay_module::relay_api::RelayApiClient;
use crate::signer::TxSigner;
use log::info;
use serde_json::Value;
use std::sync::Arc;

/// The account behind the signer.
#[derive(Clone)]
pub struct User {
    relay: RelayApiClient,
    signer: Arc<dyn TxSigner>,
}

impl User {
    pub fn new(relay: RelayApiClient, signer: Arc<dyn TxSigner>) -> Self {
        Self { relay, signer }
    }

    /// Checksummed address.
    pub fn address(&self) -> String {
        self.signer.address().to_string()
    }

    /// Native coin balance.
    pub async fn balance(&self) -> Result<Amount> {
        let infos = self.relay.tx_infos(&self.address()).await?;
        format_to_amount(&infos.balance, ETH_DECIMALS)
    }

    /// Contact link for sharing the own address.
    pub fn create_link(&self, name: Option<&str>) -> Result<String> {
        contact_link(&self.address(), name, &[])
    }

    pub async fn sign_message(&self, message: &str) -> Result<String> {
        self.signer.sign_message(message.as_bytes()).await
    }

    /// Ask the relay's faucet for coin to pay gas with. Returns whatever the
    /// relay answered, usually a transaction hash.
    pub async fn request_eth(&self) -> Result<String> {
        let address = self.address();
        info!("requesting coin for {}", address);
        let response = self.relay.request_ether(&address).await?;
        Ok(match response {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }
}
