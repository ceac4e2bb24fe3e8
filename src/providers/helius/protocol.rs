//! JSON-RPC 2.0 frames exchanged over the Helius push channel.
//!
//! Outbound: `signatureSubscribe` requests correlated by a client-chosen id.
//! Inbound frames are classified into [`InboundMessage`] so the dispatcher can match
//! exhaustively instead of probing fields ad hoc.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SUBSCRIBE_METHOD: &str = "signatureSubscribe";
pub const NOTIFY_METHOD: &str = "signatureNotification";

/// Request subscribing to a single signature's status.
#[derive(Debug, Serialize)]
pub struct SubscribeRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: (&'a str, CommitmentParams<'a>),
}

#[derive(Debug, Serialize)]
struct CommitmentParams<'a> {
    commitment: &'a str,
}

impl<'a> SubscribeRequest<'a> {
    pub fn new(id: u64, signature: &'a str, commitment: &'a str) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: SUBSCRIBE_METHOD,
            params: (signature, CommitmentParams { commitment }),
        }
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl RpcErrorBody {
    /// Error the vendor sends when a subscription it already dropped is referenced.
    pub fn is_invalid_subscription(&self) -> bool {
        self.message
            .to_ascii_lowercase()
            .contains("invalid subscription id")
    }
}

/// Classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Subscribe acknowledged; `subscription` is the server-assigned id.
    Ack { id: u64, subscription: u64 },
    /// Status update for a server subscription. `failed` is set when the
    /// transaction carried an on-chain error.
    Notification {
        subscription: u64,
        result: Value,
        failed: bool,
    },
    /// Error response, correlated by request id when one is present.
    Error { id: Option<u64>, error: RpcErrorBody },
    /// Anything else. Carries the reason for logging.
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Classify a text frame received from the vendor.
pub fn parse_frame(text: &str) -> InboundMessage {
    let frame: RawFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => return InboundMessage::Malformed(format!("invalid JSON: {}", e)),
    };

    let id = frame.id.as_ref().and_then(Value::as_u64);

    if let Some(error) = frame.error {
        return match serde_json::from_value::<RpcErrorBody>(error) {
            Ok(error) => InboundMessage::Error { id, error },
            Err(e) => InboundMessage::Malformed(format!("invalid error object: {}", e)),
        };
    }

    if let Some(params) = frame.params {
        return classify_notification(frame.method.as_deref(), params);
    }

    match (id, frame.result) {
        (Some(id), Some(result)) => match result.as_u64() {
            Some(subscription) => InboundMessage::Ack { id, subscription },
            None => InboundMessage::Malformed(format!("non-numeric result for id {}", id)),
        },
        _ => InboundMessage::Malformed("unrecognized frame".to_string()),
    }
}

fn classify_notification(method: Option<&str>, mut params: Value) -> InboundMessage {
    if method != Some(NOTIFY_METHOD) {
        return InboundMessage::Malformed(format!("unexpected method {:?}", method));
    }

    let subscription = match params.get("subscription").and_then(Value::as_u64) {
        Some(subscription) => subscription,
        None => return InboundMessage::Malformed("notification without subscription".to_string()),
    };

    let result = match params.get_mut("result").map(Value::take) {
        Some(result) if !result.is_null() => result,
        _ => return InboundMessage::Malformed("notification without result".to_string()),
    };

    let failed = result
        .pointer("/value/err")
        .map(|err| !err.is_null())
        .unwrap_or(false);

    InboundMessage::Notification {
        subscription,
        result,
        failed,
    }
}
