//! Live event subscriptions.
//!
//! A [`Subscription`] owns one background task that feeds a bounded channel,
//! either by polling a REST endpoint or by keeping a WebSocket open. The
//! task stops when the subscription is unsubscribed or dropped.
//!
//! Items may arrive twice or out of order after a reconnect; consumers
//! deduplicate on `transactionHash`/`logIndex` if they care.

use super::relay_api::{RelayGateway, with_query};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

const CHANNEL_CAPACITY: usize = 256;

pub struct Subscription {
    receiver: mpsc::Receiver<Value>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// GET `path` every `interval`. When items carry `blockNumber`, the next
    /// request asks only for blocks after the newest one seen.
    pub fn polling(
        gateway: Arc<dyn RelayGateway>,
        path: String,
        from_block: Option<u64>,
        interval: Duration,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            gateway,
            path,
            from_block,
            interval,
            sender,
            cancel.clone(),
        ));
        Self {
            receiver,
            cancel,
            task: Some(task),
        }
    }

    /// Connect to `url`, send `subscribe` as a text frame and forward every
    /// event the relay pushes. A dropped connection is retried after
    /// `reconnect_delay`, re-sending the subscribe message.
    pub fn websocket(url: String, subscribe: Value, reconnect_delay: Duration) -> Self {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(ws_loop(
            url,
            subscribe,
            reconnect_delay,
            sender,
            cancel.clone(),
        ));
        Self {
            receiver,
            cancel,
            task: Some(task),
        }
    }

    /// Next event, or `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<Value> {
        self.receiver.recv().await
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .task
                .as_ref()
                .map(|task| !task.is_finished())
                .unwrap_or(false)
    }

    /// Stop the background task and wait until its socket or timer is gone.
    pub async fn unsubscribe(mut self) {
        self.receiver.close();
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("subscription task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_loop(
    gateway: Arc<dyn RelayGateway>,
    path: String,
    mut from_block: Option<u64>,
    interval: Duration,
    sender: mpsc::Sender<Value>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let request = with_query(&path, &[("fromBlock", from_block.map(|b| b.to_string()))]);
        let response = tokio::select! {
            _ = cancel.cancelled() => break,
            response = gateway.get_json(&request) => response,
        };

        let items = match response {
            Ok(Value::Array(items)) => items,
            Ok(Value::Null) => Vec::new(),
            Ok(other) => vec![other],
            Err(e) if e.is_network() => {
                debug!("relay unreachable while polling {}: {}", request, e);
                continue;
            }
            Err(e) => {
                warn!("polling {} failed: {}", request, e);
                continue;
            }
        };

        for item in items {
            if let Some(block) = item.get("blockNumber").and_then(Value::as_u64) {
                from_block = Some(from_block.map_or(block + 1, |b| b.max(block + 1)));
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                sent = sender.send(item) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }
    }
    debug!("stopped polling {}", path);
}

async fn ws_loop(
    url: String,
    subscribe: Value,
    reconnect_delay: Duration,
    sender: mpsc::Sender<Value>,
    cancel: CancellationToken,
) {
    loop {
        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            connected = connect_async(url.as_str()) => connected,
        };

        match connected {
            Ok((ws_stream, _)) => {
                info!("subscribed to {}", url);
                let (mut ws_sender, mut ws_receiver) = ws_stream.split();
                if let Err(e) = ws_sender.send(Message::Text(subscribe.to_string())).await {
                    warn!("sending subscription to {} failed: {}", url, e);
                } else {
                    loop {
                        let frame = tokio::select! {
                            _ = cancel.cancelled() => {
                                let _ = ws_sender.send(Message::Close(None)).await;
                                return;
                            }
                            frame = ws_receiver.next() => frame,
                        };
                        match frame {
                            Some(Ok(Message::Text(text))) => {
                                for event in events_from_frame(&text) {
                                    tokio::select! {
                                        _ = cancel.cancelled() => return,
                                        sent = sender.send(event) => {
                                            if sent.is_err() {
                                                return;
                                            }
                                        }
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if ws_sender.send(Message::Pong(data)).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Err(e)) => {
                                warn!("WebSocket error on {}: {}", url, e);
                                break;
                            }
                            Some(Ok(_)) => {}
                        }
                    }
                }
            }
            Err(e) => warn!("connecting to {} failed: {}", url, e),
        }

        warn!("reconnecting to {} in {:?}", url, reconnect_delay);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }
    debug!("closed subscription to {}", url);
}

/// Unwrap a relay frame into events. Notifications carry the event in
/// `params`; subscription acknowledgements (`result`) carry none.
fn events_from_frame(text: &str) -> Vec<Value> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!("ignoring non-JSON frame: {}", e);
            return Vec::new();
        }
    };
    match value {
        Value::Array(items) => items,
        Value::Object(ref map) if map.contains_key("result") || map.contains_key("error") => {
            if let Some(error) = map.get("error") {
                warn!("relay refused subscription: {}", error);
            }
            Vec::new()
        }
        Value::Object(ref map) if map.contains_key("method") => match map.get("params") {
            Some(Value::Array(items)) => items.clone(),
            Some(params) => vec![params.clone()],
            None => Vec::new(),
        },
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay_module::mock_relay::MockRelay;
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::accept_async;

    #[test]
    fn frames_unwrap_to_events() {
        assert!(events_from_frame(r#"{"jsonrpc":"2.0","id":1,"result":"sub_1"}"#).is_empty());
        assert_eq!(
            events_from_frame(
                r#"{"jsonrpc":"2.0","method":"subscription_sub_1","params":{"type":"Transfer"}}"#
            ),
            vec![json!({"type": "Transfer"})]
        );
        assert_eq!(
            events_from_frame(r#"[{"type":"A"},{"type":"B"}]"#).len(),
            2
        );
        assert!(events_from_frame("garbage").is_empty());
    }

    #[tokio::test]
    async fn polling_advances_from_block() {
        let mock = MockRelay::new();
        mock.on_get(
            "users/0x1/events?type=Transfer",
            json!([{"type": "Transfer", "blockNumber": 10}, {"type": "Transfer", "blockNumber": 12}]),
        );
        mock.on_get(
            "users/0x1/events?type=Transfer&fromBlock=13",
            json!([{"type": "Transfer", "blockNumber": 13}]),
        );

        let mut sub = Subscription::polling(
            Arc::new(mock.clone()),
            "users/0x1/events?type=Transfer".to_string(),
            None,
            Duration::from_millis(10),
        );
        let mut blocks = Vec::new();
        for _ in 0..3 {
            let event = timeout(Duration::from_secs(2), sub.next())
                .await
                .unwrap()
                .unwrap();
            blocks.push(event["blockNumber"].as_u64().unwrap());
        }
        assert_eq!(blocks, vec![10, 12, 13]);
        sub.unsubscribe().await;

        let requests = mock.requests();
        assert_eq!(requests[0], "users/0x1/events?type=Transfer");
        assert_eq!(requests[1], "users/0x1/events?type=Transfer&fromBlock=13");
    }

    #[tokio::test]
    async fn polling_survives_relay_errors() {
        let mock = MockRelay::new();
        mock.set_unreachable(true);
        let mut sub = Subscription::polling(
            Arc::new(mock.clone()),
            "users/0x1/events".to_string(),
            Some(5),
            Duration::from_millis(10),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        mock.set_unreachable(false);
        mock.on_get("users/0x1/events?fromBlock=5", json!([{"type": "Transfer"}]));

        let event = timeout(Duration::from_secs(2), sub.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event["type"], "Transfer");
        assert!(sub.is_active());
        sub.unsubscribe().await;
    }

    #[tokio::test]
    async fn unsubscribe_stops_the_task() {
        let mock = MockRelay::new();
        mock.on_get("users/0x1/events", json!([]));
        let sub = Subscription::polling(
            Arc::new(mock.clone()),
            "users/0x1/events".to_string(),
            None,
            Duration::from_millis(5),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        timeout(Duration::from_secs(2), sub.unsubscribe())
            .await
            .unwrap();

        let seen = mock.requests().len();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(mock.requests().len(), seen);
    }

    #[tokio::test]
    async fn websocket_subscribes_and_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let mut subscriptions = Vec::new();
            for round in 0..2u64 {
                let (stream, _) = listener.accept().await.unwrap();
                let mut ws = accept_async(stream).await.unwrap();
                if let Some(Ok(Message::Text(text))) = ws.next().await {
                    subscriptions.push(text);
                }
                ws.send(Message::Text(
                    json!({"jsonrpc": "2.0", "id": 1, "result": "sub"}).to_string(),
                ))
                .await
                .unwrap();
                ws.send(Message::Text(
                    json!({"jsonrpc": "2.0", "method": "subscription_sub", "params": {"type": "Transfer", "blockNumber": round}})
                        .to_string(),
                ))
                .await
                .unwrap();
                // First connection drops to force a reconnect.
                if round == 0 {
                    ws.close(None).await.unwrap();
                } else {
                    // Hold the socket until the client goes away.
                    while let Some(Ok(_)) = ws.next().await {}
                }
            }
            subscriptions
        });

        let subscribe = json!({"jsonrpc": "2.0", "id": 1, "method": "subscribe", "params": {"type": "all"}});
        let mut sub = Subscription::websocket(
            format!("ws://{}/streams/events", addr),
            subscribe.clone(),
            Duration::from_millis(20),
        );

        for expected in 0..2u64 {
            let event = timeout(Duration::from_secs(5), sub.next())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(event["blockNumber"].as_u64(), Some(expected));
        }
        timeout(Duration::from_secs(5), sub.unsubscribe())
            .await
            .unwrap();

        let subscriptions = timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(subscriptions.len(), 2);
        for text in subscriptions {
            assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), subscribe);
        }
    }
}
