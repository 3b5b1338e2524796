use crate::amount::{Amount, calc_raw, format_to_amount};
use crate::currency_network::{CurrencyNetwork, DecimalsOverride, NetworkDecimals};
use crate::error::{Result, TlError};
use crate::event::{
    Event, FormattedEvent, TRUSTLINE_UPDATE_EVENT, TRUSTLINE_UPDATE_REQUEST_EVENT,
};
use crate::relay_module::relay_api::RelayApiClient;
use crate::relay_module::relay_types::{EventQuery, FeePayer, PathQuery, TrustlineRaw};
use crate::transaction::{
    DEFAULT_GAS_LIMIT_CLOSE, DEFAULT_GAS_LIMIT_TRUSTLINE_UPDATE, ICurrencyNetwork, PreparedTx,
    TransactionBuilder, TxOptions, to_int16, to_uint64,
};
use crate::utils::parse_address;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trustline {
    pub id: Option<String>,
    pub user: Option<String>,
    pub counter_party: String,
    pub balance: Amount,
    pub given: Amount,
    pub received: Amount,
    pub left_given: Amount,
    pub left_received: Amount,
    pub interest_rate_given: Option<Amount>,
    pub interest_rate_received: Option<Amount>,
    pub is_frozen: bool,
}

fn format_trustline(raw: TrustlineRaw, decimals: NetworkDecimals) -> Result<Trustline> {
    let d = decimals.network_decimals;
    let rate = |v: &Option<String>| {
        v.as_deref()
            .map(|raw| format_to_amount(raw, decimals.interest_rate_decimals))
            .transpose()
    };
    Ok(Trustline {
        balance: format_to_amount(&raw.balance, d)?,
        given: format_to_amount(&raw.given, d)?,
        received: format_to_amount(&raw.received, d)?,
        left_given: format_to_amount(&raw.left_given, d)?,
        left_received: format_to_amount(&raw.left_received, d)?,
        interest_rate_given: rate(&raw.interest_rate_given)?,
        interest_rate_received: rate(&raw.interest_rate_received)?,
        id: raw.id,
        user: raw.user,
        counter_party: raw.counter_party,
        is_frozen: raw.is_frozen,
    })
}

/// Optional parts of a trustline update. Interest rates are decimal
/// percentages in the network's interest rate decimals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustlineUpdateOptions {
    pub interest_rate_given: Option<String>,
    pub interest_rate_received: Option<String>,
    pub is_frozen: bool,
    pub decimals: DecimalsOverride,
    pub tx: TxOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseOptions {
    pub max_fees: Option<String>,
    pub max_hops: Option<u32>,
    pub decimals: DecimalsOverride,
    pub tx: TxOptions,
}

/// Prepared close, with the route that will settle the balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseTx {
    pub prepared: PreparedTx,
    pub path: Vec<String>,
    pub max_fees: Amount,
    pub value: Amount,
}

#[derive(Clone)]
pub struct TrustlineFacade {
    relay: RelayApiClient,
    builder: TransactionBuilder,
    currency_network: CurrencyNetwork,
    event: Event,
}

impl TrustlineFacade {
    pub fn new(
        relay: RelayApiClient,
        builder: TransactionBuilder,
        currency_network: CurrencyNetwork,
        event: Event,
    ) -> Self {
        Self {
            relay,
            builder,
            currency_network,
            event,
        }
    }

    fn user(&self) -> String {
        self.builder.sender().to_string()
    }

    pub async fn get_all(&self, network: &str) -> Result<Vec<Trustline>> {
        parse_address(network, "network address")?;
        let decimals = self
            .currency_network
            .get_decimals(network, DecimalsOverride::default())
            .await?;
        self.relay
            .trustlines(network, &self.user())
            .await?
            .into_iter()
            .map(|raw| format_trustline(raw, decimals))
            .collect()
    }

    pub async fn get(&self, network: &str, counterparty: &str) -> Result<Trustline> {
        parse_address(network, "network address")?;
        parse_address(counterparty, "counterparty address")?;
        let decimals = self
            .currency_network
            .get_decimals(network, DecimalsOverride::default())
            .await?;
        let raw = self
            .relay
            .trustline(network, &self.user(), counterparty)
            .await?;
        format_trustline(raw, decimals)
    }

    /// Pending update requests, sent and received.
    pub async fn get_requests(
        &self,
        network: &str,
        from_block: Option<u64>,
    ) -> Result<Vec<FormattedEvent>> {
        let query = EventQuery {
            event_type: Some(TRUSTLINE_UPDATE_REQUEST_EVENT.to_string()),
            from_block,
        };
        self.event.get(network, &query).await
    }

    /// Accepted updates.
    pub async fn get_updates(
        &self,
        network: &str,
        from_block: Option<u64>,
    ) -> Result<Vec<FormattedEvent>> {
        let query = EventQuery {
            event_type: Some(TRUSTLINE_UPDATE_EVENT.to_string()),
            from_block,
        };
        self.event.get(network, &query).await
    }

    /// Propose new credit limits to `counterparty`. The update takes effect
    /// once the counterparty proposes matching terms (or lowers them).
    pub async fn prepare_update(
        &self,
        network: &str,
        counterparty: &str,
        given: &str,
        received: &str,
        options: &TrustlineUpdateOptions,
    ) -> Result<PreparedTx> {
        let network_address = parse_address(network, "network address")?;
        let counterparty = parse_address(counterparty, "counterparty address")?;
        let decimals = self
            .currency_network
            .get_decimals(network, options.decimals)
            .await?;

        let rate = |value: &Option<String>, what: &str| -> Result<i16> {
            match value {
                Some(v) => to_int16(calc_raw(v, decimals.interest_rate_decimals)?, what),
                None => Ok(0),
            }
        };
        let call = ICurrencyNetwork::updateTrustlineCall {
            _creditor: counterparty,
            _creditlimitGiven: to_uint64(
                calc_raw(given, decimals.network_decimals)?,
                "credit limit given",
            )?,
            _creditlimitReceived: to_uint64(
                calc_raw(received, decimals.network_decimals)?,
                "credit limit received",
            )?,
            _interestRateGiven: rate(&options.interest_rate_given, "interest rate given")?,
            _interestRateReceived: rate(&options.interest_rate_received, "interest rate received")?,
            _isFrozen: options.is_frozen,
        };
        self.builder
            .prepare_contract_transaction(
                network_address,
                &call,
                DEFAULT_GAS_LIMIT_TRUSTLINE_UPDATE,
                &options.tx,
            )
            .await
    }

    /// Accept a request from `initiator`. `given`/`received` are from the
    /// accepting side, i.e. mirrored relative to the request.
    pub async fn prepare_accept(
        &self,
        network: &str,
        initiator: &str,
        given: &str,
        received: &str,
        options: &TrustlineUpdateOptions,
    ) -> Result<PreparedTx> {
        self.prepare_update(network, initiator, given, received, options)
            .await
    }

    pub async fn prepare_cancel_update(
        &self,
        network: &str,
        counterparty: &str,
        options: &TxOptions,
    ) -> Result<PreparedTx> {
        let network_address = parse_address(network, "network address")?;
        let call = ICurrencyNetwork::cancelTrustlineUpdateCall {
            _counterparty: parse_address(counterparty, "counterparty address")?,
        };
        self.builder
            .prepare_contract_transaction(
                network_address,
                &call,
                DEFAULT_GAS_LIMIT_TRUSTLINE_UPDATE,
                options,
            )
            .await
    }

    /// Close the trustline with `counterparty`, settling its balance by a
    /// triangular transfer along a path found by the relay.
    pub async fn prepare_close(
        &self,
        network: &str,
        counterparty: &str,
        options: &CloseOptions,
    ) -> Result<CloseTx> {
        let network_address = parse_address(network, "network address")?;
        let counterparty_address = parse_address(counterparty, "counterparty address")?;
        let decimals = self
            .currency_network
            .get_decimals(network, options.decimals)
            .await?;
        let d = decimals.network_decimals;

        let query = PathQuery {
            value: None,
            max_hops: options.max_hops,
            max_fees: options
                .max_fees
                .as_deref()
                .map(|fees| calc_raw(fees, d).map(|raw| raw.to_string()))
                .transpose()?,
            fee_payer: Some(FeePayer::Sender),
        };
        let user = self.user();
        let route = self
            .relay
            .close_path(network, &user, counterparty, &query)
            .await?;
        if route.path.is_empty() {
            return Err(TlError::NoPathFound {
                from: user,
                to: counterparty.to_string(),
            });
        }

        let path = route
            .path
            .iter()
            .map(|hop| parse_address(hop, "path address"))
            .collect::<Result<Vec<_>>>()?;
        let max_fees = format_to_amount(raw_or_zero(&route.fees), d)?;
        let call = ICurrencyNetwork::closeTrustlineByTriangularTransferCall {
            _otherParty: counterparty_address,
            _maxFee: to_uint64(max_fees.raw_value()?, "max fees")?,
            _path: path,
        };
        let prepared = self
            .builder
            .prepare_contract_transaction(network_address, &call, DEFAULT_GAS_LIMIT_CLOSE, &options.tx)
            .await?;
        Ok(CloseTx {
            prepared,
            path: route.path,
            max_fees,
            value: format_to_amount(raw_or_zero(&route.value), d)?,
        })
    }

    pub async fn confirm(&self, prepared: &PreparedTx) -> Result<String> {
        self.builder.confirm(&prepared.raw_tx).await
    }
}

/// The relay leaves out amounts it has nothing to report for.
fn raw_or_zero(raw: &str) -> &str {
    if raw.is_empty() { "0" } else { raw }
}
