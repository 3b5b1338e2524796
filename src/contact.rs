use crate::error::Result;
use crate::links::contact_link;
use crate::relay_module::relay_api::RelayApiClient;
use crate::signer::TxSigner;
use crate::utils::parse_address;
use std::sync::Arc;

#[derive(Clone)]
pub struct Contact {
    relay: RelayApiClient,
    signer: Arc<dyn TxSigner>,
}

impl Contact {
    pub fn new(relay: RelayApiClient, signer: Arc<dyn TxSigner>) -> Self {
        Self { relay, signer }
    }

    /// Everyone the signer shares a trustline with in `network`.
    pub async fn get_all(&self, network: &str) -> Result<Vec<String>> {
        parse_address(network, "network address")?;
        self.relay
            .contacts(network, &self.signer.address().to_string())
            .await
    }

    pub fn create_link(&self, address: &str, name: Option<&str>) -> Result<String> {
        contact_link(address, name, &[])
    }
}
