use std::time::Duration;

use axum::{
    extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    routing::get,
    Router,
};
use serde_json::json;
use shared::{
    domain::{Category, Indicator, Tank},
    protocol::{EMERGENCY, DATA_MONITOR},
};
use tokio::{net::TcpListener, sync::mpsc, time::timeout};

use super::*;
use crate::{panel::GaugeView, CommandEmitter, EmergencyOutcome, Panel, StateProjector};

/// Test feed: forwards every text frame it receives and answers each one with
/// the scripted replies.
async fn spawn_feed(replies: Vec<String>) -> (String, mpsc::UnboundedReceiver<String>) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let app = Router::new().route(
        "/ws",
        get(move |ws: WebSocketUpgrade| {
            let inbound_tx = inbound_tx.clone();
            let replies = replies.clone();
            async move { ws.on_upgrade(move |socket| feed(socket, replies, inbound_tx)) }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("http://{addr}"), inbound_rx)
}

async fn feed(mut socket: WebSocket, replies: Vec<String>, inbound: mpsc::UnboundedSender<String>) {
    while let Some(Ok(msg)) = socket.recv().await {
        let WsMessage::Text(text) = msg else {
            continue;
        };
        let _ = inbound.send(text);
        for reply in &replies {
            if socket.send(WsMessage::Text(reply.clone())).await.is_err() {
                return;
            }
        }
    }
}

async fn wait_for_view(panel: &Panel, done: impl Fn(&crate::panel::PanelView) -> bool) {
    timeout(Duration::from_secs(5), async {
        loop {
            if done(&panel.view()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("panel never reached expected state");
}

#[test]
fn endpoint_follows_server_url_scheme() {
    assert_eq!(
        ws_endpoint("http://127.0.0.1:5000").expect("url").as_str(),
        "ws://127.0.0.1:5000/ws"
    );
    assert_eq!(
        ws_endpoint("https://plant.example/dash/").expect("url").as_str(),
        "wss://plant.example/dash/ws"
    );
    assert_eq!(
        ws_endpoint("ws://10.0.0.2:9000/feed").expect("url").as_str(),
        "ws://10.0.0.2:9000/feed"
    );
    assert!(ws_endpoint("ftp://plant.example").is_err());
    assert!(ws_endpoint("not a url").is_err());
}

#[tokio::test]
async fn emergency_reaches_the_feed_and_snapshots_reach_the_panel() {
    let replies = vec![
        json!({ "event": DATA_MONITOR, "data": { "level1": 40, "pump1": 1 } }).to_string(),
        "this is not an envelope".to_string(),
        json!({ "event": DATA_MONITOR, "data": { "level1": 55, "foo": 1 } }).to_string(),
    ];
    let (server_url, mut inbound) = spawn_feed(replies).await;

    let channel = Arc::new(WsChannel::connect(&server_url).await.expect("connect"));
    let panel = Panel::new();
    StateProjector::new(panel.bindings()).attach(channel.as_ref());

    let emitter = CommandEmitter::new(channel.clone(), |_: &str| true);
    assert_eq!(emitter.trigger_emergency(), EmergencyOutcome::Sent);

    let received = timeout(Duration::from_secs(5), inbound.recv())
        .await
        .expect("feed timed out")
        .expect("feed closed");
    let received: Envelope = serde_json::from_str(&received).expect("envelope");
    assert_eq!(received, Envelope::new(EMERGENCY, json!({ "status": "emergency" })));

    wait_for_view(&panel, |view| {
        view.gauges.get(&Tank::Level1).and_then(|g| g.label.as_deref()) == Some("55%")
    })
    .await;

    let view = panel.view();
    assert_eq!(
        view.gauges.get(&Tank::Level1),
        Some(&GaugeView {
            fill: Some("55%".into()),
            label: Some("55%".into()),
        })
    );
    assert_eq!(view.lamps.get(&Indicator::Pump1), Some(&Category::Active));
    assert!(!channel.is_closed());
}

#[tokio::test]
async fn closed_resolves_when_the_feed_goes_away() {
    let app = Router::new().route(
        "/ws",
        get(|ws: WebSocketUpgrade| async move {
            ws.on_upgrade(|mut socket: WebSocket| async move {
                let _ = socket.send(WsMessage::Close(None)).await;
            })
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    let channel = WsChannel::connect(&format!("http://{addr}"))
        .await
        .expect("connect");
    timeout(Duration::from_secs(5), channel.closed())
        .await
        .expect("close not observed");
    assert!(channel.is_closed());

    channel.emit(EMERGENCY, json!({ "status": "emergency" }));
}

#[tokio::test]
async fn connect_fails_without_a_listener() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = WsChannel::connect(&format!("http://{addr}"))
        .await
        .err()
        .expect("connect should fail");
    assert!(err.to_string().contains("failed to connect websocket"));
}
