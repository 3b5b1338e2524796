//! Communication with the trustlines relay server.
//!
//! ## Module Organization
//!
//! - [`relay_api`]: the [`relay_api::RelayGateway`] transport trait, its HTTP
//!   implementation and the typed [`relay_api::RelayApiClient`]
//! - [`relay_stream`]: polling and WebSocket event subscriptions
//! - [`relay_types`]: payloads exchanged with the relay
//! - [`mock_relay`]: in-memory gateway for tests and offline use
//!
//! ## Usage
//!
//! ```no_run
//! use std::time::Duration;
//! use trustlines_client::relay_module::relay_api::RelayApiClient;
//!
//! # async fn example() -> trustlines_client::error::Result<()> {
//! let client = RelayApiClient::http("http://localhost:5000/api/v1", Duration::from_secs(30))?;
//! let networks = client.networks().await?;
//! let version = client.version().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! Trustline / Payment / Event / ... facades
//!     ↓ (typed calls)
//! RelayApiClient
//!     ↓ (get_json / post_json)
//! RelayGateway (HttpRelay | MockRelay)
//!     ↓
//! Relay server
//! ```
//!
//! Failed requests are not retried here; callers decide.

pub mod mock_relay;
pub mod relay_api;
pub mod relay_stream;
pub mod relay_types;
