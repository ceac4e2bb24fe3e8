//! Shared utilities for integration testing: a programmable JSON-RPC WebSocket vendor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use chain_providers::config::schema::ProviderConfig;
use chain_providers::providers::helius::{HeliusProvider, MonitorSettings};
use chain_providers::providers::NetworkInfo;

/// Server ids are offset so they never equal the client's request ids.
pub const SERVER_ID_OFFSET: u64 = 1000;

/// A step the vendor performs in reply to a subscribe request.
#[allow(dead_code)]
pub enum Action {
    Send(Value),
    Raw(String),
    Sleep(Duration),
    Close,
}

/// Handle on a running mock vendor.
pub struct MockVendor {
    pub url: String,
    connections: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Value>>>,
}

#[allow(dead_code)]
impl MockVendor {
    /// Number of WebSocket connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Number of connections that have ended.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Every request frame received, in order.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_ids(&self) -> Vec<u64> {
        self.requests()
            .iter()
            .filter_map(|r| r["id"].as_u64())
            .collect()
    }
}

/// Start a vendor on an ephemeral port. `script` maps (request id, signature) to replies.
pub async fn start_vendor<F>(script: F) -> MockVendor
where
    F: Fn(u64, &str) -> Vec<Action> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let script = Arc::new(script);
    let connections = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));

    let (conns, done, reqs) = (connections.clone(), closed.clone(), requests.clone());
    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            let ws = match accept_async(tcp).await {
                Ok(ws) => ws,
                Err(_) => continue,
            };
            conns.fetch_add(1, Ordering::SeqCst);

            let (script, done, reqs) = (script.clone(), done.clone(), reqs.clone());
            tokio::spawn(async move {
                let (sink, mut source) = ws.split();
                let sink = Arc::new(tokio::sync::Mutex::new(sink));

                while let Some(Ok(message)) = source.next().await {
                    let text = match message {
                        Message::Text(text) => text.as_str().to_owned(),
                        Message::Close(_) => break,
                        _ => continue,
                    };
                    let request: Value = serde_json::from_str(&text).unwrap();
                    reqs.lock().unwrap().push(request.clone());

                    let id = request["id"].as_u64().unwrap();
                    let signature = request["params"][0].as_str().unwrap_or_default().to_string();
                    let actions = script(id, &signature);

                    let sink = sink.clone();
                    tokio::spawn(async move {
                        for action in actions {
                            let mut sink = sink.lock().await;
                            let result = match action {
                                Action::Send(value) => sink.send(Message::text(value.to_string())).await,
                                Action::Raw(text) => sink.send(Message::text(text)).await,
                                Action::Sleep(delay) => {
                                    drop(sink);
                                    tokio::time::sleep(delay).await;
                                    Ok(())
                                }
                                Action::Close => sink.close().await,
                            };
                            if result.is_err() {
                                break;
                            }
                        }
                    });
                }
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
    });

    MockVendor {
        url: format!("ws://{}", addr),
        connections,
        closed,
        requests,
    }
}

pub fn ack(id: u64) -> Action {
    Action::Send(json!({"jsonrpc": "2.0", "result": id + SERVER_ID_OFFSET, "id": id}))
}

pub fn notify(id: u64, err: Value) -> Action {
    Action::Send(json!({
        "jsonrpc": "2.0",
        "method": "signatureNotification",
        "params": {
            "result": {"context": {"slot": 5207624}, "value": {"err": err}},
            "subscription": id + SERVER_ID_OFFSET
        }
    }))
}

pub fn rpc_error(id: u64, code: i64, message: &str) -> Action {
    Action::Send(json!({"jsonrpc": "2.0", "error": {"code": code, "message": message}, "id": id}))
}

pub fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Helius provider pointed at the mock vendor.
pub fn provider_for(vendor: &MockVendor, idle_timeout: Duration) -> HeliusProvider {
    let mut config = ProviderConfig::with_api_key("test-key");
    config.websocket_endpoint = Some(vendor.url.clone());
    let settings = MonitorSettings {
        idle_timeout,
        connect_timeout: Duration::from_secs(2),
        ..MonitorSettings::default()
    };
    HeliusProvider::new(config, NetworkInfo::new("solana", "localnet", 0), settings)
}
