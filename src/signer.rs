//! Signing capability used by the transaction pipeline.
//!
//! The builder only ever sees [`TxSigner`]; key storage is up to the
//! implementation. [`LocalSigner`] keeps a secp256k1 key in memory.

use crate::error::{Result, TlError};
use crate::transaction::RawTx;
use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, TxKind};
use alloy::signers::SignerSync;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use std::str::FromStr;

#[async_trait]
pub trait TxSigner: Send + Sync {
    fn address(&self) -> Address;

    /// Sign `raw` and return the `0x`-prefixed serialized transaction.
    async fn sign_transaction(&self, raw: &RawTx) -> Result<String>;

    /// Personal-message signature (EIP-191) as `0x`-prefixed hex.
    async fn sign_message(&self, message: &[u8]) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct LocalSigner {
    inner: PrivateKeySigner,
}

impl LocalSigner {
    /// # Arguments
    /// * `private_key_hex` - 32-byte key as hex, with or without `0x`
    pub fn from_hex(private_key_hex: &str) -> Result<Self> {
        let inner = PrivateKeySigner::from_str(private_key_hex.trim())
            .map_err(|e| TlError::invalid_argument(format!("private key: {}", e)))?;
        Ok(Self { inner })
    }

    pub fn random() -> Self {
        Self {
            inner: PrivateKeySigner::random(),
        }
    }
}

#[async_trait]
impl TxSigner for LocalSigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn sign_transaction(&self, raw: &RawTx) -> Result<String> {
        if raw.from != self.inner.address() {
            return Err(TlError::SigningFailed(format!(
                "transaction is from {} but the key belongs to {}",
                raw.from,
                self.inner.address()
            )));
        }
        let mut tx = TxLegacy {
            chain_id: raw.chain_id,
            nonce: raw.nonce,
            gas_price: raw.gas_price,
            gas_limit: raw.gas_limit,
            to: TxKind::Call(raw.to),
            value: raw.value,
            input: raw.data.clone(),
        };
        let signature = self
            .inner
            .sign_transaction_sync(&mut tx)
            .map_err(|e| TlError::SigningFailed(e.to_string()))?;
        let envelope = TxEnvelope::from(tx.into_signed(signature));
        Ok(format!("0x{}", hex::encode(envelope.encoded_2718())))
    }

    async fn sign_message(&self, message: &[u8]) -> Result<String> {
        let signature = self
            .inner
            .sign_message_sync(message)
            .map_err(|e| TlError::SigningFailed(e.to_string()))?;
        Ok(format!("0x{}", hex::encode(signature.as_bytes())))
    }
}
