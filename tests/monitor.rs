//! Push-channel monitoring against a scripted vendor.

use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde_json::{json, Value};

use chain_providers::config::schema::ProviderConfig;
use chain_providers::providers::helius::{HeliusProvider, MonitorSettings};
use chain_providers::providers::{NetworkInfo, ProviderError, RpcProvider};

mod common;
use common::{ack, ms, notify, provider_for, rpc_error, start_vendor, Action};

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_success_notification_confirms() {
    let vendor = start_vendor(|id, _| vec![ack(id), notify(id, Value::Null)]).await;
    let provider = provider_for(&vendor, ms(5_000));

    let outcome = provider.monitor_transaction("sig-ok", WAIT).await.unwrap();

    assert!(outcome.confirmed);
    let details = outcome.details.expect("details populated");
    assert_eq!(details["value"]["err"], Value::Null);
    assert_eq!(details["context"]["slot"], 5207624);
    assert_eq!(provider.pending_subscriptions(), 0);

    let requests = vendor.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["method"], "signatureSubscribe");
    assert_eq!(requests[0]["params"][0], "sig-ok");
    assert_eq!(requests[0]["params"][1]["commitment"], "confirmed");
}

#[tokio::test]
async fn test_failure_notification_reports_error() {
    let err = json!({"InstructionError": [0, {"Custom": 6001}]});
    let reported = err.clone();
    let vendor = start_vendor(move |id, _| vec![ack(id), notify(id, reported.clone())]).await;
    let provider = provider_for(&vendor, ms(5_000));

    let outcome = provider.monitor_transaction("sig-failed", WAIT).await.unwrap();

    assert!(!outcome.confirmed);
    assert_eq!(outcome.details.unwrap()["value"]["err"], err);
}

#[tokio::test]
async fn test_timeout_resolves_unconfirmed() {
    let vendor = start_vendor(|id, _| vec![ack(id)]).await;
    let provider = provider_for(&vendor, ms(5_000));

    let started = Instant::now();
    let outcome = provider.monitor_transaction("sig-slow", ms(200)).await.unwrap();
    let elapsed = started.elapsed();

    assert!(outcome.is_timeout());
    assert!(elapsed >= ms(200), "resolved early: {:?}", elapsed);
    assert!(elapsed < ms(2_000), "resolved late: {:?}", elapsed);
    assert_eq!(provider.pending_subscriptions(), 0);
}

#[tokio::test]
async fn test_close_after_ack_rejects_pending() {
    let vendor = start_vendor(|id, _| vec![ack(id), Action::Sleep(ms(50)), Action::Close]).await;
    let provider = provider_for(&vendor, ms(5_000));

    let err = provider.monitor_transaction("sig-dropped", WAIT).await.unwrap_err();

    assert_eq!(
        err,
        ProviderError::Disconnected {
            signature: "sig-dropped".to_string()
        }
    );
    assert_eq!(provider.pending_subscriptions(), 0);
    assert!(!provider.is_websocket_connected());
}

#[tokio::test]
async fn test_concurrent_monitors_share_one_connection() {
    let vendor = start_vendor(|id, _| vec![ack(id), Action::Sleep(ms(50)), notify(id, Value::Null)]).await;
    let provider = provider_for(&vendor, ms(5_000));

    let signatures: Vec<String> = (0..10).map(|i| format!("sig-{}", i)).collect();
    let results = join_all(
        signatures
            .iter()
            .map(|sig| provider.monitor_transaction(sig, WAIT)),
    )
    .await;

    for result in results {
        assert!(result.unwrap().confirmed);
    }
    assert_eq!(vendor.connections(), 1);

    // Every request carries a distinct id
    let mut ids = vendor.request_ids();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 10);
}

#[tokio::test]
async fn test_idle_connection_closes() {
    let vendor = start_vendor(|id, _| vec![ack(id), notify(id, Value::Null)]).await;
    let provider = provider_for(&vendor, ms(200));

    provider.monitor_transaction("sig-a", WAIT).await.unwrap();
    assert!(provider.is_websocket_connected());

    tokio::time::sleep(ms(500)).await;
    assert!(!provider.is_websocket_connected());
    assert_eq!(vendor.closed(), 1);
}

#[tokio::test]
async fn test_new_subscription_cancels_idle_close() {
    let vendor = start_vendor(|id, sig| {
        if sig == "sig-late" {
            vec![ack(id), Action::Sleep(ms(400)), notify(id, Value::Null)]
        } else {
            vec![ack(id), notify(id, Value::Null)]
        }
    })
    .await;
    let provider = provider_for(&vendor, ms(300));

    provider.monitor_transaction("sig-early", WAIT).await.unwrap();
    tokio::time::sleep(ms(100)).await;

    let late = provider.monitor_transaction("sig-late", WAIT);
    let mid_flight = async {
        // Past the first idle deadline while the late subscription is pending
        tokio::time::sleep(ms(300)).await;
        provider.is_websocket_connected()
    };
    let (outcome, connected_mid_flight) = tokio::join!(late, mid_flight);

    assert!(connected_mid_flight);
    assert!(outcome.unwrap().confirmed);
    assert_eq!(vendor.connections(), 1);

    tokio::time::sleep(ms(600)).await;
    assert!(!provider.is_websocket_connected());
}

#[tokio::test]
async fn test_local_ids_not_reused_across_reconnects() {
    let vendor = start_vendor(|id, _| vec![ack(id), notify(id, Value::Null)]).await;
    let provider = provider_for(&vendor, ms(100));

    provider.monitor_transaction("sig-1", WAIT).await.unwrap();
    tokio::time::sleep(ms(300)).await;
    assert!(!provider.is_websocket_connected());

    provider.monitor_transaction("sig-2", WAIT).await.unwrap();

    assert_eq!(vendor.connections(), 2);
    assert_eq!(vendor.request_ids(), vec![1, 2]);
}

#[tokio::test]
async fn test_server_error_rejects_only_that_waiter() {
    let vendor = start_vendor(|id, sig| {
        if sig == "bad-sig" {
            vec![rpc_error(id, -32602, "Invalid params: invalid signature")]
        } else {
            vec![ack(id), Action::Sleep(ms(100)), notify(id, Value::Null)]
        }
    })
    .await;
    let provider = provider_for(&vendor, ms(5_000));

    let (good, bad) = tokio::join!(
        provider.monitor_transaction("good-sig", WAIT),
        provider.monitor_transaction("bad-sig", WAIT),
    );

    assert!(good.unwrap().confirmed);
    assert_eq!(
        bad.unwrap_err(),
        ProviderError::Server {
            code: -32602,
            message: "Invalid params: invalid signature".to_string()
        }
    );
}

#[tokio::test]
async fn test_server_error_after_ack_rejects_waiter() {
    let vendor = start_vendor(|id, _| vec![ack(id), Action::Sleep(ms(50)), rpc_error(id, -32000, "server boom")]).await;
    let provider = provider_for(&vendor, ms(5_000));

    let started = Instant::now();
    let err = provider.monitor_transaction("sig-acked", ms(2_000)).await.unwrap_err();

    assert_eq!(
        err,
        ProviderError::Server {
            code: -32000,
            message: "server boom".to_string()
        }
    );
    assert!(started.elapsed() < ms(1_000), "fell through to the timeout");
    assert_eq!(provider.pending_subscriptions(), 0);
    assert!(provider.is_websocket_connected());
}

#[tokio::test]
async fn test_invalid_subscription_after_settle_is_swallowed() {
    let vendor = start_vendor(|id, _| {
        vec![
            ack(id),
            notify(id, Value::Null),
            rpc_error(id, -32602, "Invalid subscription id."),
        ]
    })
    .await;
    let provider = provider_for(&vendor, ms(5_000));

    assert!(provider.monitor_transaction("sig-1", WAIT).await.unwrap().confirmed);
    tokio::time::sleep(ms(50)).await;

    assert!(provider.is_websocket_connected());
    assert!(provider.monitor_transaction("sig-2", WAIT).await.unwrap().confirmed);
    assert_eq!(vendor.connections(), 1);
}

#[tokio::test]
async fn test_duplicate_notification_settles_once() {
    let vendor = start_vendor(|id, _| {
        vec![ack(id), notify(id, Value::Null), notify(id, json!({"late": true}))]
    })
    .await;
    let provider = provider_for(&vendor, ms(5_000));

    let outcome = provider.monitor_transaction("sig-dup", WAIT).await.unwrap();
    assert!(outcome.confirmed);

    tokio::time::sleep(ms(50)).await;
    assert_eq!(provider.pending_subscriptions(), 0);
    assert!(provider.is_websocket_connected());
}

#[tokio::test]
async fn test_malformed_frames_are_ignored() {
    let vendor = start_vendor(|id, _| {
        vec![
            Action::Raw("definitely not json".to_string()),
            Action::Send(json!({"jsonrpc": "2.0", "method": "slotNotification", "params": {"subscription": 1}})),
            Action::Send(json!({"jsonrpc": "2.0", "result": "weird", "id": id})),
            ack(id),
            Action::Raw("{\"jsonrpc\":".to_string()),
            notify(id, Value::Null),
        ]
    })
    .await;
    let provider = provider_for(&vendor, ms(5_000));

    let outcome = provider.monitor_transaction("sig-noisy", WAIT).await.unwrap();
    assert!(outcome.confirmed);
    assert!(provider.is_websocket_connected());
}

#[tokio::test]
async fn test_notification_before_ack_is_dropped() {
    let vendor = start_vendor(|id, _| vec![notify(id, Value::Null), ack(id)]).await;
    let provider = provider_for(&vendor, ms(5_000));

    let outcome = provider.monitor_transaction("sig-race", ms(300)).await.unwrap();
    assert!(outcome.is_timeout());
}

#[tokio::test]
async fn test_disconnect_rejects_pending_and_is_idempotent() {
    let vendor = start_vendor(|id, _| vec![ack(id)]).await;
    let provider = provider_for(&vendor, ms(5_000));

    let pending = provider.monitor_transaction("sig-pending", WAIT);
    let stop = async {
        tokio::time::sleep(ms(150)).await;
        provider.disconnect();
        provider.disconnect();
    };
    let (result, _) = tokio::join!(pending, stop);

    assert!(matches!(result, Err(ProviderError::Disconnected { .. })));
    assert!(!provider.is_websocket_connected());
    assert_eq!(provider.pending_subscriptions(), 0);

    // A later monitor reconnects on demand
    let outcome = provider.monitor_transaction("sig-after", ms(200)).await.unwrap();
    assert!(outcome.is_timeout());
    assert_eq!(vendor.connections(), 2);
}

#[tokio::test]
async fn test_unreachable_vendor_is_unavailable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut config = ProviderConfig::with_api_key("test-key");
    config.websocket_endpoint = Some(format!("ws://{}", addr));
    let provider = HeliusProvider::new(
        config,
        NetworkInfo::new("solana", "localnet", 0),
        MonitorSettings::default(),
    );

    let results = join_all((0..3).map(|_| provider.monitor_transaction("sig", WAIT))).await;
    for result in results {
        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
    }
    assert!(!provider.is_websocket_connected());
}

#[tokio::test]
async fn test_stalled_handshake_hits_connect_timeout() {
    // Accept TCP but never answer the WebSocket upgrade
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((tcp, _)) = listener.accept().await {
            held.push(tcp);
        }
    });

    let mut config = ProviderConfig::with_api_key("test-key");
    config.websocket_endpoint = Some(format!("ws://{}", addr));
    let settings = MonitorSettings {
        connect_timeout: ms(200),
        ..MonitorSettings::default()
    };
    let provider = HeliusProvider::new(config, NetworkInfo::new("solana", "localnet", 0), settings);

    let started = Instant::now();
    let err = provider.monitor_transaction("sig-stalled", WAIT).await.unwrap_err();
    let elapsed = started.elapsed();

    match err {
        ProviderError::Unavailable(reason) => assert!(reason.contains("timed out"), "{}", reason),
        other => panic!("unexpected {:?}", other),
    }
    assert!(elapsed >= ms(200), "resolved early: {:?}", elapsed);
    assert!(elapsed < ms(2_000), "resolved late: {:?}", elapsed);
    assert!(!provider.is_websocket_connected());
}
