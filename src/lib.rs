//! Client library for the trustlines relay.
//!
//! Reads go straight to the relay through [`relay_module`]. Writes are two
//! steps: a facade's `prepare_*` builds an unsigned transaction and reports
//! its fees, `confirm` signs it and hands it to the relay.

pub mod amount;
pub mod config;
pub mod contact;
pub mod currency_network;
pub mod error;
pub mod event;
pub mod extra_data;
pub mod links;
pub mod payment;
pub mod relay_module;
pub mod signer;
pub mod tl_network;
pub mod transaction;
pub mod trustline;
pub mod user;
pub mod utils;

pub use error::{Result, TlError};
pub use tl_network::TlNetwork;
