//! Mediated transfers.
//!
//! A payment always starts with a path lookup: the relay searches the
//! trustline graph for a route with enough capacity. No route means
//! [`TlError::NoPathFound`]; a transfer is never built without one.

use crate::amount::{Amount, ETH_DECIMALS, calc_raw, format_to_amount};
use crate::currency_network::{CurrencyNetwork, DecimalsOverride};
use crate::error::{Result, TlError};
use crate::event::{Event, FormattedEvent, TRANSFER_EVENT};
use crate::extra_data::ExtraData;
use crate::links::payment_request_link;
use crate::relay_module::relay_api::RelayApiClient;
use crate::relay_module::relay_types::{EventQuery, FeePayer, PathQuery};
use crate::transaction::{
    DEFAULT_GAS_LIMIT_TRANSFER, ICurrencyNetwork, PreparedTx, TransactionBuilder, TxOptions,
    extra_data_bytes, to_uint64,
};
use crate::utils::{parse_address, random_hex_id};
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// Length in bytes of generated payment request ids.
pub const PAYMENT_REQUEST_ID_LEN: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentOptions {
    /// Upper bound on fees, as a decimal value.
    pub max_fees: Option<String>,
    pub max_hops: Option<u32>,
    pub fee_payer: FeePayer,
    pub extra_data: Option<ExtraData>,
    pub decimals: DecimalsOverride,
    pub tx: TxOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathInfo {
    pub path: Vec<String>,
    pub max_fees: Amount,
    pub value: Amount,
    pub fee_payer: FeePayer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTx {
    pub prepared: PreparedTx,
    pub path: Vec<String>,
    pub max_fees: Amount,
    pub fee_payer: FeePayer,
}

#[derive(Clone)]
pub struct Payment {
    relay: RelayApiClient,
    builder: TransactionBuilder,
    currency_network: CurrencyNetwork,
    event: Event,
}

impl Payment {
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

    /// Ask the relay for a route moving `value` from the signer to
    /// `receiver`. An empty `path` in the result means there is none.
    pub async fn get_path(
        &self,
        network: &str,
        receiver: &str,
        value: &str,
        options: &PaymentOptions,
    ) -> Result<PathInfo> {
        parse_address(network, "network address")?;
        parse_address(receiver, "receiver address")?;
        let decimals = self
            .currency_network
            .get_decimals(network, options.decimals)
            .await?
            .network_decimals;

        let raw_value = calc_raw(value, decimals)?;
        if raw_value.is_negative() {
            return Err(TlError::invalid_argument(format!(
                "payment value must not be negative, got {}",
                value
            )));
        }
        let query = PathQuery {
            value: Some(raw_value.to_string()),
            max_hops: options.max_hops,
            max_fees: options
                .max_fees
                .as_deref()
                .map(|fees| calc_raw(fees, decimals).map(|raw| raw.to_string()))
                .transpose()?,
            fee_payer: Some(options.fee_payer),
        };
        let sender = self.builder.sender().to_string();
        let route = self
            .relay
            .path(network, &sender, receiver, &query)
            .await?;

        Ok(PathInfo {
            max_fees: format_to_amount(
                if route.fees.is_empty() { "0" } else { route.fees.as_str() },
                decimals,
            )?,
            value: if route.value.is_empty() {
                format_to_amount(&raw_value.to_string(), decimals)?
            } else {
                format_to_amount(&route.value, decimals)?
            },
            fee_payer: route.fee_payer.unwrap_or(options.fee_payer),
            path: route.path,
        })
    }

    /// Prepare a transfer of `value` to `receiver` along a relay-found path,
    /// carrying `options.extra_data` in the transfer's extra data.
    pub async fn prepare(
        &self,
        network: &str,
        receiver: &str,
        value: &str,
        options: &PaymentOptions,
    ) -> Result<PaymentTx> {
        let network_address = parse_address(network, "network address")?;
        let route = self.get_path(network, receiver, value, options).await?;
        if route.path.is_empty() {
            return Err(TlError::NoPathFound {
                from: self.builder.sender().to_string(),
                to: receiver.to_string(),
            });
        }

        let path = route
            .path
            .iter()
            .map(|hop| parse_address(hop, "path address"))
            .collect::<Result<Vec<Address>>>()?;
        let raw_value = to_uint64(route.value.raw_value()?, "payment value")?;
        let max_fee = to_uint64(route.max_fees.raw_value()?, "max fees")?;
        let extra_data = extra_data_bytes(options.extra_data.as_ref())?;

        let prepared = match route.fee_payer {
            FeePayer::Sender => {
                let call = ICurrencyNetwork::transferCall {
                    _value: raw_value,
                    _maxFee: max_fee,
                    _path: path,
                    _extraData: extra_data,
                };
                self.builder
                    .prepare_contract_transaction(
                        network_address,
                        &call,
                        DEFAULT_GAS_LIMIT_TRANSFER,
                        &options.tx,
                    )
                    .await?
            }
            FeePayer::Receiver => {
                let call = ICurrencyNetwork::transferReceiverPaysCall {
                    _value: raw_value,
                    _maxFee: max_fee,
                    _path: path,
                    _extraData: extra_data,
                };
                self.builder
                    .prepare_contract_transaction(
                        network_address,
                        &call,
                        DEFAULT_GAS_LIMIT_TRANSFER,
                        &options.tx,
                    )
                    .await?
            }
        };

        Ok(PaymentTx {
            prepared,
            path: route.path,
            max_fees: route.max_fees,
            fee_payer: route.fee_payer,
        })
    }

    /// Prepare a plain transfer of native coin; `value` is in whole coins.
    pub async fn prepare_eth(
        &self,
        receiver: &str,
        value: &str,
        options: &TxOptions,
    ) -> Result<PreparedTx> {
        let receiver = parse_address(receiver, "receiver address")?;
        let raw = calc_raw(value, ETH_DECIMALS)?;
        if raw.is_negative() {
            return Err(TlError::invalid_argument(format!(
                "value must not be negative, got {}",
                value
            )));
        }
        self.builder
            .prepare_value_transaction(receiver, raw.unsigned_abs(), options)
            .await
    }

    /// Transfers of the signer in `network`.
    pub async fn get(&self, network: &str, from_block: Option<u64>) -> Result<Vec<FormattedEvent>> {
        let query = EventQuery {
            event_type: Some(TRANSFER_EVENT.to_string()),
            from_block,
        };
        self.event.get(network, &query).await
    }

    /// Deep link asking someone to pay the signer.
    pub fn create_request(
        &self,
        network: &str,
        amount: &str,
        subject: Option<&str>,
        id: Option<&str>,
    ) -> Result<String> {
        payment_request_link(
            network,
            &self.builder.sender().to_string(),
            amount,
            subject,
            id,
        )
    }

    pub fn generate_payment_request_id(&self) -> String {
        random_hex_id(PAYMENT_REQUEST_ID_LEN)
    }

    pub async fn confirm(&self, prepared: &PreparedTx) -> Result<String> {
        self.builder.confirm(&prepared.raw_tx).await
    }
}
