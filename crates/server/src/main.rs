use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use shared::protocol::ClientRequest;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;
mod telemetry;

use app_state::{AppState, StatusResponse};
use config::load_settings;
use telemetry::{open_source, run_feed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = load_settings();
    let source = open_source(&settings).await.map_err(|error| {
        error!(
            device = %settings.device_path,
            %error,
            "failed to open telemetry source; check the device path and permissions"
        );
        error
    })?;

    let (events, _) = broadcast::channel(256);
    let state = AppState::new(events.clone());

    let status = Arc::clone(&state.status);
    let heights = settings.tank_heights();
    let feed = tokio::spawn(async move {
        if let Err(error) = run_feed(source, events, status, heights).await {
            error!(%error, "telemetry feed stopped");
        }
    });

    let app = build_router(Arc::new(state));
    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, source = ?settings.source, "plant feed listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    feed.abort();
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(state.status.snapshot())
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws_connection(state, socket))
}

async fn ws_connection(state: Arc<AppState>, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = BroadcastStream::new(state.events.subscribe());
    info!("dashboard connected");

    let send_task = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let event = match event {
                Ok(event) => event,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "dashboard fell behind; readings skipped");
                    continue;
                }
            };
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        if let Message::Text(text) = msg {
            handle_client_frame(&state, &text);
        }
    }

    send_task.abort();
    info!("dashboard disconnected");
}

fn handle_client_frame(state: &AppState, text: &str) {
    match serde_json::from_str::<ClientRequest>(text) {
        Ok(ClientRequest::Emergency(command)) if command.is_emergency() => {
            state.status.record_emergency(Utc::now());
            warn!("emergency stop requested from dashboard");
        }
        Ok(ClientRequest::Emergency(command)) => {
            debug!(status = %command.status, "ignoring emergency event with unexpected status");
        }
        Err(err) => debug!(%err, "ignoring unrecognised dashboard frame"),
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
