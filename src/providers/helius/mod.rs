//! Helius provider for Solana with push-based confirmation monitoring.
//!
//! # Connection State Machine
//! ```text
//!   Disconnected ──monitor_transaction──▶ Connecting ──open ok──▶ Connected
//!        ▲                                   │                       │
//!        └──────────── open failed ──────────┘                       │
//!        └──── disconnect() / idle timeout / transport close ────────┘
//! ```
//!
//! # Concurrency Model
//! - All mutable state (connection, subscription table, id counter, idle timer) sits
//!   behind one mutex that is never held across an await
//! - Callers arriving while `Connecting` await the same shared connect attempt
//! - Reader frames, subscription timers and the idle timer all funnel through the
//!   same lock, so each settlement is decided and removed atomically
//! - Background tasks hold `Weak` references; dropping the provider tears down the
//!   connection and fails pending waiters
//!
//! # Assumptions
//! - The vendor acknowledges a subscribe before notifying on it; a notification for
//!   an unknown server id is dropped
//! - The vendor auto-unsubscribes after the single notification; no unsubscribe is sent

pub mod connection;
pub mod protocol;
pub mod subscriptions;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::schema::MonitorConfig;
use crate::observability::metrics;
use crate::providers::types::{
    is_usable_api_key, MonitorOutcome, NetworkInfo, ProviderConfig, ProviderError, ProviderKind,
    ProviderResult,
};
use crate::providers::RpcProvider;

use self::connection::{Connection, ConnectionEvent};
use self::protocol::{parse_frame, InboundMessage, SubscribeRequest};
use self::subscriptions::{Promotion, Subscription, SubscriptionKey, SubscriptionTable};

/// Timing and commitment settings for the push channel.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub commitment: String,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
    pub default_timeout: Duration,
    pub health_timeout: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for MonitorSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            commitment: config.commitment.clone(),
            idle_timeout: Duration::from_millis(config.idle_timeout_ms),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            default_timeout: Duration::from_millis(config.default_timeout_ms),
            health_timeout: Duration::from_secs(config.health_timeout_secs),
        }
    }
}

/// Solana provider backed by Helius.
pub struct HeliusProvider {
    config: ProviderConfig,
    network: NetworkInfo,
    http: reqwest::Client,
    initialized: AtomicBool,
    monitor: Arc<Monitor>,
}

impl HeliusProvider {
    pub fn new(config: ProviderConfig, network: NetworkInfo, settings: MonitorSettings) -> Self {
        let monitor = Arc::new(Monitor::new(settings, network.to_string()));
        Self {
            config,
            network,
            http: reqwest::Client::new(),
            initialized: AtomicBool::new(false),
            monitor,
        }
    }

    /// Whether the configured API key can be used.
    pub fn has_valid_api_key(&self) -> bool {
        is_usable_api_key(&self.config.api_key)
    }

    /// Helius Sender fast-submit endpoint, when a region is configured.
    pub fn sender_url(&self) -> Option<String> {
        self.config
            .sender_region
            .as_deref()
            .map(str::trim)
            .filter(|region| !region.is_empty())
            .map(|region| format!("https://{}-sender.helius-rpc.com/fast", region))
    }

    /// Number of subscriptions awaiting a notification.
    pub fn pending_subscriptions(&self) -> usize {
        self.monitor.lock().subscriptions.len()
    }

    fn subdomain(&self) -> &'static str {
        if self.network.network.contains("devnet") {
            "devnet"
        } else {
            "mainnet"
        }
    }
}

#[async_trait]
impl RpcProvider for HeliusProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Helius
    }

    fn network_info(&self) -> &NetworkInfo {
        &self.network
    }

    async fn initialize(&self) -> ProviderResult<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if !self.has_valid_api_key() {
            tracing::warn!(
                network = %self.network,
                "Helius API key missing or placeholder, push monitoring disabled"
            );
        }
        tracing::info!(
            network = %self.network,
            monitoring = self.supports_transaction_monitoring(),
            sender = self.sender_url().is_some(),
            "Helius provider initialized"
        );
        Ok(())
    }

    fn http_url(&self) -> String {
        if let Some(endpoint) = &self.config.http_endpoint {
            return endpoint.clone();
        }
        format!(
            "https://{}.helius-rpc.com/?api-key={}",
            self.subdomain(),
            self.config.api_key
        )
    }

    fn websocket_url(&self) -> Option<String> {
        if !self.config.use_websocket || !self.has_valid_api_key() {
            return None;
        }
        if let Some(endpoint) = &self.config.websocket_endpoint {
            return Some(endpoint.clone());
        }
        Some(format!(
            "wss://{}.helius-rpc.com/?api-key={}",
            self.subdomain(),
            self.config.api_key
        ))
    }

    async fn health_check(&self) -> bool {
        let request = json!({"jsonrpc": "2.0", "id": 1, "method": "getHealth"});
        let response = self
            .http
            .post(self.http_url())
            .timeout(self.monitor.settings.health_timeout)
            .json(&request)
            .send()
            .await;

        let healthy = match response {
            Ok(response) if response.status().is_success() => match response.json::<Value>().await {
                Ok(body) if body.get("result").and_then(Value::as_str) == Some("ok") => true,
                Ok(body) => {
                    tracing::warn!(network = %self.network, body = %body, "Health check failed: node unhealthy");
                    false
                }
                Err(e) => {
                    tracing::warn!(network = %self.network, error = %e, "Health check failed: invalid body");
                    false
                }
            },
            Ok(response) => {
                tracing::warn!(network = %self.network, status = %response.status(), "Health check failed: non-success status");
                false
            }
            Err(e) => {
                tracing::warn!(network = %self.network, error = %e, "Health check failed: request error");
                false
            }
        };

        metrics::record_provider_health("helius", &self.monitor.label, healthy);
        healthy
    }

    fn supports_transaction_monitoring(&self) -> bool {
        self.websocket_url().is_some()
    }

    /// A zero `timeout` falls back to the configured default.
    async fn monitor_transaction(
        &self,
        signature: &str,
        timeout: Duration,
    ) -> ProviderResult<MonitorOutcome> {
        let url = self.websocket_url().ok_or_else(|| {
            ProviderError::Unavailable("no usable WebSocket endpoint".to_string())
        })?;
        let timeout = if timeout.is_zero() {
            self.monitor.settings.default_timeout
        } else {
            timeout
        };

        self.monitor.ensure_connected(&url).await?;
        let waiter = self.monitor.subscribe(signature, timeout)?;

        match waiter.await {
            Ok(result) => result,
            // Responder dropped without settling: the provider itself went away
            Err(_) => Err(ProviderError::Disconnected {
                signature: signature.to_string(),
            }),
        }
    }

    fn is_websocket_connected(&self) -> bool {
        self.monitor.lock().connection.is_connected()
    }

    fn disconnect(&self) {
        self.monitor.shutdown("disconnect requested");
    }
}

impl Drop for HeliusProvider {
    fn drop(&mut self) {
        self.monitor.shutdown("provider dropped");
    }
}

impl std::fmt::Debug for HeliusProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeliusProvider")
            .field("network", &self.network)
            .field("has_api_key", &self.has_valid_api_key())
            .field("use_websocket", &self.config.use_websocket)
            .finish()
    }
}

type SharedConnect = Shared<BoxFuture<'static, Result<(), String>>>;

enum ConnectionState {
    Disconnected,
    Connecting { generation: u64, attempt: SharedConnect },
    Connected(Connection),
}

impl ConnectionState {
    fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    fn is_current(&self, generation: u64) -> bool {
        match self {
            Self::Connecting { generation: g, .. } => *g == generation,
            Self::Connected(conn) => conn.generation() == generation,
            Self::Disconnected => false,
        }
    }
}

struct IdleTimer {
    epoch: u64,
    handle: JoinHandle<()>,
}

struct MonitorState {
    connection: ConnectionState,
    subscriptions: SubscriptionTable,
    next_local_id: u64,
    next_generation: u64,
    idle: Option<IdleTimer>,
    idle_epoch: u64,
}

/// Push-channel state shared between the provider and its background tasks.
struct Monitor {
    settings: MonitorSettings,
    /// `chain/network`, used as the metrics label.
    label: String,
    state: Mutex<MonitorState>,
}

impl Monitor {
    fn new(settings: MonitorSettings, label: String) -> Self {
        Self {
            settings,
            label,
            state: Mutex::new(MonitorState {
                connection: ConnectionState::Disconnected,
                subscriptions: SubscriptionTable::new(),
                next_local_id: 1,
                next_generation: 1,
                idle: None,
                idle_epoch: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reuse the open connection or join the single in-flight connect attempt.
    async fn ensure_connected(self: &Arc<Self>, url: &str) -> ProviderResult<()> {
        let attempt = {
            let mut guard = self.lock();
            let state = &mut *guard;
            match &state.connection {
                ConnectionState::Connected(_) => return Ok(()),
                ConnectionState::Connecting { attempt, .. } => attempt.clone(),
                ConnectionState::Disconnected => {
                    let generation = state.next_generation;
                    state.next_generation += 1;
                    let attempt = self.spawn_connect(url.to_string(), generation);
                    state.connection = ConnectionState::Connecting {
                        generation,
                        attempt: attempt.clone(),
                    };
                    attempt
                }
            }
        };

        attempt.await.map_err(ProviderError::Unavailable)
    }

    /// Run the connect on its own task so an abandoned caller cannot strand `Connecting`.
    fn spawn_connect(self: &Arc<Self>, url: String, generation: u64) -> SharedConnect {
        let monitor = Arc::clone(self);
        let task = tokio::spawn(async move { monitor.connect(url, generation).await });
        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(format!("connect task failed: {}", e)),
            }
        }
        .boxed()
        .shared()
    }

    async fn connect(self: Arc<Self>, url: String, generation: u64) -> Result<(), String> {
        tracing::debug!(generation, "Opening WebSocket connection");
        let opened = connection::open(&url, self.settings.connect_timeout).await;

        let mut state = self.lock();
        let wanted = matches!(
            &state.connection,
            ConnectionState::Connecting { generation: g, .. } if *g == generation
        );

        let stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                if wanted {
                    state.connection = ConnectionState::Disconnected;
                }
                let result = match &e {
                    connection::ConnectError::Timeout(_) => "timeout",
                    connection::ConnectError::Transport(_) => "error",
                };
                metrics::record_connect_attempt(&self.label, result);
                tracing::warn!(generation, error = %e, "WebSocket connection failed");
                return Err(e.to_string());
            }
        };

        if !wanted {
            // disconnect() ran while the socket was opening
            tracing::debug!(generation, "Discarding WebSocket opened after disconnect");
            return Err("disconnected while connecting".to_string());
        }

        let weak = Arc::downgrade(&self);
        let conn = Connection::start(stream, generation, move |event| {
            if let Some(monitor) = weak.upgrade() {
                monitor.on_event(generation, event);
            }
        });
        state.connection = ConnectionState::Connected(conn);
        self.arm_idle_if_unused(&mut state);

        metrics::record_connect_attempt(&self.label, "ok");
        metrics::record_websocket_connected(&self.label, true);
        tracing::info!(generation, "WebSocket connected");
        Ok(())
    }

    /// Register a subscription and send the subscribe request.
    fn subscribe(
        self: &Arc<Self>,
        signature: &str,
        timeout: Duration,
    ) -> ProviderResult<oneshot::Receiver<ProviderResult<MonitorOutcome>>> {
        let mut state = self.lock();
        let state = &mut *state;

        let conn = match &state.connection {
            ConnectionState::Connected(conn) => conn,
            _ => {
                return Err(ProviderError::Unavailable(
                    "connection closed before subscribe".to_string(),
                ))
            }
        };

        let local_id = state.next_local_id;
        state.next_local_id += 1;

        let request = SubscribeRequest::new(local_id, signature, &self.settings.commitment)
            .to_text()
            .map_err(|e| ProviderError::Unavailable(format!("encode subscribe: {}", e)))?;
        conn.send_text(request)
            .map_err(|e| ProviderError::Unavailable(format!("send subscribe: {}", e)))?;

        let (tx, rx) = oneshot::channel();
        let mut subscription = Subscription::new(local_id, signature, tx);
        let weak = Arc::downgrade(self);
        subscription.set_timer(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(monitor) = weak.upgrade() {
                monitor.on_timeout(local_id);
            }
        }));
        state.subscriptions.insert(subscription);
        cancel_idle(state);

        metrics::record_active_subscriptions(&self.label, state.subscriptions.len());
        tracing::debug!(signature, local_id, timeout_ms = timeout.as_millis() as u64, "Subscribed to signature");
        Ok(rx)
    }

    fn on_event(self: &Arc<Self>, generation: u64, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Frame(text) => self.on_frame(generation, &text),
            ConnectionEvent::Closed(reason) => self.on_closed(generation, &reason),
        }
    }

    fn on_frame(self: &Arc<Self>, generation: u64, text: &str) {
        let message = parse_frame(text);

        let mut state = self.lock();
        if !state.connection.is_current(generation) {
            return;
        }

        match message {
            InboundMessage::Ack { id, subscription } => {
                match state.subscriptions.promote(id, subscription) {
                    Promotion::Promoted => {
                        tracing::debug!(local_id = id, subscription, "Subscription acknowledged");
                    }
                    Promotion::Displaced(old) => {
                        tracing::warn!(
                            subscription,
                            signature = %old.signature,
                            "Server reused a live subscription id"
                        );
                        metrics::record_subscription_outcome(&self.label, "error");
                        old.settle(Err(ProviderError::Server {
                            code: 0,
                            message: format!("subscription id {} reassigned", subscription),
                        }));
                    }
                    Promotion::Unknown => {
                        tracing::debug!(local_id = id, subscription, "Ack for settled subscription");
                    }
                }
            }
            InboundMessage::Notification {
                subscription,
                result,
                failed,
            } => match state.subscriptions.take(SubscriptionKey::Remote(subscription)) {
                Some(sub) => {
                    tracing::info!(
                        signature = %sub.signature,
                        subscription,
                        confirmed = !failed,
                        "Signature notification received"
                    );
                    metrics::record_subscription_outcome(&self.label, if failed { "failed" } else { "confirmed" });
                    sub.settle(Ok(MonitorOutcome::reported(!failed, result)));
                }
                None => {
                    tracing::debug!(subscription, "Dropping notification for unknown subscription");
                }
            },
            InboundMessage::Error { id, error } => {
                // Before or after the ack, the request id still names the waiter
                match id.and_then(|id| state.subscriptions.take_by_local_id(id)) {
                    Some(sub) => {
                        tracing::warn!(
                            signature = %sub.signature,
                            code = error.code,
                            message = %error.message,
                            "Subscription rejected by server"
                        );
                        metrics::record_subscription_outcome(&self.label, "error");
                        sub.settle(Err(ProviderError::Server {
                            code: error.code,
                            message: error.message,
                        }));
                    }
                    None if error.is_invalid_subscription() => {
                        tracing::debug!(?id, "Ignoring invalid subscription id for settled subscription");
                    }
                    None => {
                        tracing::warn!(?id, code = error.code, message = %error.message, "Server error for untracked request");
                    }
                }
            }
            InboundMessage::Malformed(reason) => {
                tracing::warn!(reason = %reason, "Ignoring unrecognized WebSocket frame");
            }
        }

        metrics::record_active_subscriptions(&self.label, state.subscriptions.len());
        self.arm_idle_if_unused(&mut state);
    }

    fn on_closed(&self, generation: u64, reason: &str) {
        let mut state = self.lock();
        if !state.connection.is_current(generation) {
            return;
        }

        tracing::warn!(
            generation,
            reason,
            pending = state.subscriptions.len(),
            "WebSocket connection lost"
        );
        state.connection = ConnectionState::Disconnected;
        cancel_idle(&mut state);
        fail_pending(&mut state, &self.label);
        metrics::record_websocket_connected(&self.label, false);
    }

    fn on_timeout(self: &Arc<Self>, local_id: u64) {
        let mut state = self.lock();
        if let Some(sub) = state.subscriptions.take_by_local_id(local_id) {
            tracing::info!(signature = %sub.signature, local_id, "Signature monitor timed out");
            metrics::record_subscription_outcome(&self.label, "timeout");
            sub.settle(Ok(MonitorOutcome::timed_out()));
            metrics::record_active_subscriptions(&self.label, state.subscriptions.len());
            self.arm_idle_if_unused(&mut state);
        }
    }

    /// Arm the idle timer when the connection is open and nothing is pending.
    fn arm_idle_if_unused(self: &Arc<Self>, state: &mut MonitorState) {
        if !state.subscriptions.is_empty() || !state.connection.is_connected() || state.idle.is_some() {
            return;
        }

        state.idle_epoch += 1;
        let epoch = state.idle_epoch;
        let delay = self.settings.idle_timeout;
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(monitor) = weak.upgrade() {
                monitor.on_idle(epoch);
            }
        });
        state.idle = Some(IdleTimer { epoch, handle });
    }

    fn on_idle(&self, epoch: u64) {
        let mut state = self.lock();
        if !matches!(&state.idle, Some(timer) if timer.epoch == epoch) {
            return;
        }
        state.idle = None;
        if !state.subscriptions.is_empty() {
            return;
        }

        if let ConnectionState::Connected(conn) =
            std::mem::replace(&mut state.connection, ConnectionState::Disconnected)
        {
            tracing::info!(generation = conn.generation(), "Closing idle WebSocket connection");
            conn.close();
            metrics::record_websocket_connected(&self.label, false);
        }
    }

    /// Close any connection and fail every pending subscription. Idempotent.
    fn shutdown(&self, reason: &str) {
        let mut state = self.lock();
        cancel_idle(&mut state);

        match std::mem::replace(&mut state.connection, ConnectionState::Disconnected) {
            ConnectionState::Connected(conn) => {
                tracing::info!(generation = conn.generation(), reason, "Closing WebSocket connection");
                conn.close();
                metrics::record_websocket_connected(&self.label, false);
            }
            ConnectionState::Connecting { generation, .. } => {
                tracing::info!(generation, reason, "Abandoning WebSocket connect attempt");
            }
            ConnectionState::Disconnected => {}
        }

        fail_pending(&mut state, &self.label);
    }
}

fn cancel_idle(state: &mut MonitorState) {
    if let Some(timer) = state.idle.take() {
        timer.handle.abort();
    }
}

fn fail_pending(state: &mut MonitorState, label: &str) {
    let pending = state.subscriptions.drain();
    if pending.is_empty() {
        return;
    }

    for sub in pending {
        metrics::record_subscription_outcome(label, "disconnected");
        let signature = sub.signature.clone();
        sub.settle(Err(ProviderError::Disconnected { signature }));
    }
    metrics::record_active_subscriptions(label, 0);
}
