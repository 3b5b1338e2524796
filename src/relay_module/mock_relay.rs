//! In-memory [`RelayGateway`] for tests and offline use.
//!
//! Responses are registered per path (query string included). Every request
//! is recorded so tests can assert on what the client sent.

use super::relay_api::RelayGateway;
use crate::error::{Result, TlError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
enum Reply {
    Json(Value),
    Error { status: u16, message: String },
}

#[derive(Debug, Default)]
struct MockState {
    get_replies: HashMap<String, Reply>,
    post_replies: HashMap<String, Reply>,
    unreachable: bool,
    requests: Vec<String>,
    posted: Vec<(String, Value)>,
}

#[derive(Debug, Clone, Default)]
pub struct MockRelay {
    state: Arc<Mutex<MockState>>,
}

impl MockRelay {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state)
    }

    pub fn on_get(&self, path: &str, response: Value) {
        self.with_state(|s| {
            s.get_replies.insert(path.to_string(), Reply::Json(response));
        });
    }

    pub fn on_get_error(&self, path: &str, status: u16, message: &str) {
        self.with_state(|s| {
            s.get_replies.insert(
                path.to_string(),
                Reply::Error {
                    status,
                    message: message.to_string(),
                },
            );
        });
    }

    pub fn on_post(&self, path: &str, response: Value) {
        self.with_state(|s| {
            s.post_replies.insert(path.to_string(), Reply::Json(response));
        });
    }

    pub fn on_post_error(&self, path: &str, status: u16, message: &str) {
        self.with_state(|s| {
            s.post_replies.insert(
                path.to_string(),
                Reply::Error {
                    status,
                    message: message.to_string(),
                },
            );
        });
    }

    /// Make every request fail as if the relay could not be reached.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.with_state(|s| s.unreachable = unreachable);
    }

    /// Paths of all requests so far, GETs and POSTs, in order.
    pub fn requests(&self) -> Vec<String> {
        self.with_state(|s| s.requests.clone())
    }

    pub fn posted(&self) -> Vec<(String, Value)> {
        self.with_state(|s| s.posted.clone())
    }

    fn answer(reply: Option<Reply>, path: &str) -> Result<Value> {
        match reply {
            Some(Reply::Json(value)) => Ok(value),
            Some(Reply::Error { status, message }) => Err(TlError::Relay { status, message }),
            None => Err(TlError::Relay {
                status: 404,
                message: format!("no mock response for {}", path),
            }),
        }
    }
}

#[async_trait]
impl RelayGateway for MockRelay {
    async fn get_json(&self, path: &str) -> Result<Value> {
        let (unreachable, reply) = self.with_state(|s| {
            s.requests.push(path.to_string());
            (s.unreachable, s.get_replies.get(path).cloned())
        });
        if unreachable {
            return Err(TlError::NetworkUnavailable(format!("GET {}: relay unreachable", path)));
        }
        Self::answer(reply, path)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        let (unreachable, reply) = self.with_state(|s| {
            s.requests.push(path.to_string());
            s.posted.push((path.to_string(), body.clone()));
            (s.unreachable, s.post_replies.get(path).cloned())
        });
        if unreachable {
            return Err(TlError::NetworkUnavailable(format!("POST {}: relay unreachable", path)));
        }
        Self::answer(reply, path)
    }
}
