//! One-stop entry point wiring configuration, relay, signer and facades.
//!
//! ```no_run
//! use std::sync::Arc;
//! use trustlines_client::config::TlConfig;
//! use trustlines_client::signer::LocalSigner;
//! use trustlines_client::tl_network::TlNetwork;
//!
//! # async fn example() -> trustlines_client::error::Result<()> {
//! let signer = LocalSigner::random();
//! let tl = TlNetwork::new(TlConfig::from_env(), Arc::new(signer))?;
//! for network in tl.currency_network.get_all().await? {
//!     println!("{} ({})", network.name, network.address);
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::TlConfig;
use crate::contact::Contact;
use crate::currency_network::CurrencyNetwork;
use crate::error::Result;
use crate::event::Event;
use crate::payment::Payment;
use crate::relay_module::relay_api::{HttpRelay, RelayApiClient, RelayGateway};
use crate::signer::TxSigner;
use crate::transaction::TransactionBuilder;
use crate::trustline::TrustlineFacade;
use crate::user::User;
use log::debug;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct TlNetwork {
    pub config: TlConfig,
    pub relay: RelayApiClient,
    pub builder: TransactionBuilder,
    pub currency_network: CurrencyNetwork,
    pub trustline: TrustlineFacade,
    pub payment: Payment,
    pub contact: Contact,
    pub event: Event,
    pub user: User,
}

impl TlNetwork {
    /// Talk to the relay at `config.relay_api_url` over HTTP.
    pub fn new(config: TlConfig, signer: Arc<dyn TxSigner>) -> Result<Self> {
        let gateway = HttpRelay::new(
            &config.relay_api_url,
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Ok(Self::with_gateway(config, Arc::new(gateway), signer))
    }

    /// Use any gateway, e.g. a [`crate::relay_module::mock_relay::MockRelay`].
    pub fn with_gateway(
        config: TlConfig,
        gateway: Arc<dyn RelayGateway>,
        signer: Arc<dyn TxSigner>,
    ) -> Self {
        debug!(
            "relay {} (websockets: {})",
            config.relay_api_url, config.use_websockets
        );
        let relay = RelayApiClient::new(gateway);
        let builder = TransactionBuilder::new(relay.clone(), signer.clone(), config.chain_id);
        let currency_network = CurrencyNetwork::new(relay.clone());
        let event = Event::new(
            relay.clone(),
            currency_network.clone(),
            signer.clone(),
            config.clone(),
        );
        Self {
            trustline: TrustlineFacade::new(
                relay.clone(),
                builder.clone(),
                currency_network.clone(),
                event.clone(),
            ),
            payment: Payment::new(
                relay.clone(),
                builder.clone(),
                currency_network.clone(),
                event.clone(),
            ),
            contact: Contact::new(relay.clone(), signer.clone()),
            user: User::new(relay.clone(), signer),
            config,
            relay,
            builder,
            currency_network,
            event,
        }
    }
}
