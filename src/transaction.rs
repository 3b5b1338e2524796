//! Transaction preparation pipeline.
//!
//! `prepare_*` fetches the sender's nonce and gas price from the relay and
//! returns an unsigned [`RawTx`] together with the fee it will cost, so the
//! caller can review fees before anything is signed. [`TransactionBuilder::confirm`]
//! signs and submits.
//!
//! Nonces are not cached: two overlapping prepares for one sender get the
//! same nonce, and only one of the resulting transactions will be mined.

use crate::amount::{Amount, ETH_DECIMALS};
use crate::error::{Result, TlError};
use crate::extra_data::{self, ExtraData};
use crate::relay_module::relay_api::RelayApiClient;
use crate::signer::TxSigner;
use alloy::primitives::{Address, Bytes, I256, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

sol! {
    interface ICurrencyNetwork {
        function updateTrustline(
            address _creditor,
            uint64 _creditlimitGiven,
            uint64 _creditlimitReceived,
            int16 _interestRateGiven,
            int16 _interestRateReceived,
            bool _isFrozen
        ) external returns (bool);
        function cancelTrustlineUpdate(address _counterparty) external;
        function closeTrustlineByTriangularTransfer(
            address _otherParty,
            uint64 _maxFee,
            address[] _path
        ) external;
        function transfer(
            uint64 _value,
            uint64 _maxFee,
            address[] _path,
            bytes _extraData
        ) external returns (bool);
        function transferReceiverPays(
            uint64 _value,
            uint64 _maxFee,
            address[] _path,
            bytes _extraData
        ) external returns (bool);
    }
}

pub const DEFAULT_GAS_LIMIT_VALUE_TRANSFER: u64 = 21_000;
pub const DEFAULT_GAS_LIMIT_TRUSTLINE_UPDATE: u64 = 300_000;
pub const DEFAULT_GAS_LIMIT_TRANSFER: u64 = 600_000;
pub const DEFAULT_GAS_LIMIT_CLOSE: u64 = 900_000;

/// Unsigned transaction as handed to the signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTx {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub chain_id: Option<u64>,
}

/// Per-call overrides of what the builder would pick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    pub gas_limit: Option<u64>,
    pub gas_price: Option<u128>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxFees {
    pub gas_price: Amount,
    pub gas_limit: u64,
    /// `gas_price * gas_limit`, the most the transaction can cost.
    pub total_fee: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedTx {
    pub raw_tx: RawTx,
    pub fees: TxFees,
}

#[derive(Clone)]
pub struct TransactionBuilder {
    relay: RelayApiClient,
    signer: Arc<dyn TxSigner>,
    chain_id: Option<u64>,
}

impl TransactionBuilder {
    pub fn new(relay: RelayApiClient, signer: Arc<dyn TxSigner>, chain_id: Option<u64>) -> Self {
        Self {
            relay,
            signer,
            chain_id,
        }
    }

    pub fn sender(&self) -> Address {
        self.signer.address()
    }

    pub fn signer(&self) -> Arc<dyn TxSigner> {
        self.signer.clone()
    }

    /// Prepare a call to `contract`.
    pub async fn prepare_contract_transaction<C: SolCall>(
        &self,
        contract: Address,
        call: &C,
        default_gas_limit: u64,
        options: &TxOptions,
    ) -> Result<PreparedTx> {
        self.prepare(
            contract,
            U256::ZERO,
            Bytes::from(call.abi_encode()),
            default_gas_limit,
            options,
        )
        .await
    }

    /// Prepare a plain transfer of native coin.
    pub async fn prepare_value_transaction(
        &self,
        to: Address,
        value: U256,
        options: &TxOptions,
    ) -> Result<PreparedTx> {
        self.prepare(
            to,
            value,
            Bytes::new(),
            DEFAULT_GAS_LIMIT_VALUE_TRANSFER,
            options,
        )
        .await
    }

    async fn prepare(
        &self,
        to: Address,
        value: U256,
        data: Bytes,
        default_gas_limit: u64,
        options: &TxOptions,
    ) -> Result<PreparedTx> {
        let from = self.signer.address();
        let infos = self
            .relay
            .tx_infos(&from.to_string())
            .await
            .map_err(|e| match e {
                TlError::Relay { status, message } => TlError::NetworkUnavailable(format!(
                    "tx infos for {} (status {}): {}",
                    from, status, message
                )),
                other => other,
            })?;

        let gas_price = match options.gas_price {
            Some(price) => price,
            None => infos.gas_price.trim().parse::<u128>().map_err(|e| {
                TlError::Serialization(format!("gas price {:?}: {}", infos.gas_price, e))
            })?,
        };
        let gas_limit = options.gas_limit.unwrap_or(default_gas_limit);
        debug!(
            "prepared tx from {} to {} (nonce {}, gas {} @ {})",
            from, to, infos.nonce, gas_limit, gas_price
        );

        let fees = TxFees {
            gas_price: Amount::from_unsigned(U256::from(gas_price), ETH_DECIMALS)?,
            gas_limit,
            total_fee: Amount::from_unsigned(
                U256::from(gas_price) * U256::from(gas_limit),
                ETH_DECIMALS,
            )?,
        };
        let raw_tx = RawTx {
            from,
            to,
            value,
            data,
            nonce: infos.nonce,
            gas_price,
            gas_limit,
            chain_id: self.chain_id,
        };
        Ok(PreparedTx { raw_tx, fees })
    }

    /// Sign `raw_tx` and submit it through the relay. Returns the
    /// transaction hash.
    pub async fn confirm(&self, raw_tx: &RawTx) -> Result<String> {
        let signed = self.signer.sign_transaction(raw_tx).await?;
        let hash = self.relay.send_signed_transaction(&signed).await?;
        debug!("relayed transaction {}", hash);
        Ok(hash)
    }
}

/// Bytes for the `_extraData` argument; no metadata means empty bytes.
pub fn extra_data_bytes(extra_data: Option<&ExtraData>) -> Result<Bytes> {
    match extra_data {
        Some(data) => Ok(Bytes::from(extra_data::encode_bytes(data)?)),
        None => Ok(Bytes::new()),
    }
}

/// Narrow a raw amount to the contract's `uint64`. `what` names the argument
/// in the error message.
pub fn to_uint64(raw: I256, what: &str) -> Result<u64> {
    if raw.is_negative() {
        return Err(TlError::invalid_argument(format!(
            "{} must not be negative, got {}",
            what, raw
        )));
    }
    u64::try_from(raw.unsigned_abs())
        .map_err(|_| TlError::invalid_argument(format!("{} {} does not fit into uint64", what, raw)))
}

/// Narrow an interest rate to the contract's `int16`.
pub fn to_int16(raw: I256, what: &str) -> Result<i16> {
    i16::try_from(raw)
        .map_err(|_| TlError::invalid_argument(format!("{} {} does not fit into int16", what, raw)))
}
