//! WebSocket realisation of [`EventChannel`].
//!
//! Each text frame carries one [`Envelope`]. A single reader task dispatches
//! inbound envelopes in arrival order; a writer task drains emitted ones.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use shared::protocol::Envelope;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::{EventChannel, EventHandler, HandlerTable};

pub struct WsChannel {
    handlers: Arc<HandlerTable>,
    outbound: mpsc::UnboundedSender<Envelope>,
    closed: watch::Receiver<bool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl WsChannel {
    pub async fn connect(server_url: &str) -> Result<Self> {
        let endpoint = ws_endpoint(server_url)?;
        let (ws_stream, _) = connect_async(endpoint.as_str())
            .await
            .with_context(|| format!("failed to connect websocket: {endpoint}"))?;
        info!(%endpoint, "connected to plant feed");
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        let handlers = Arc::new(HandlerTable::default());
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Envelope>();
        let (closed_tx, closed) = watch::channel(false);

        let reader_handlers = Arc::clone(&handlers);
        let reader = tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<Envelope>(&text) {
                        Ok(envelope) => {
                            reader_handlers.dispatch(envelope);
                        }
                        Err(err) => warn!(%err, "ignoring malformed event frame"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!(%err, "websocket read failed");
                        break;
                    }
                }
            }
            info!("plant feed closed");
            let _ = closed_tx.send(true);
        });

        let writer = tokio::spawn(async move {
            while let Some(envelope) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&envelope) {
                    Ok(text) => text,
                    Err(err) => {
                        warn!(%err, event = %envelope.event, "failed to encode event");
                        continue;
                    }
                };
                if let Err(err) = ws_writer.send(Message::Text(text)).await {
                    warn!(%err, event = %envelope.event, "websocket write failed");
                    break;
                }
            }
        });

        Ok(Self {
            handlers,
            outbound,
            closed,
            reader,
            writer,
        })
    }

    /// Resolves once the server side has gone away.
    pub async fn closed(&self) {
        let mut closed = self.closed.clone();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

impl EventChannel for WsChannel {
    fn on_event(&self, tag: &str, handler: EventHandler) {
        self.handlers.register(tag, handler);
    }

    fn emit(&self, tag: &str, payload: Value) {
        if self.outbound.send(Envelope::new(tag, payload)).is_err() {
            debug!(event = tag, "websocket writer stopped; dropping event");
        }
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

/// WebSocket endpoint for a dashboard server URL.
///
/// `http(s)://host[/base]` maps to `ws(s)://host[/base]/ws`; `ws(s)://` URLs
/// are taken as the endpoint itself.
pub fn ws_endpoint(server_url: &str) -> Result<Url> {
    let mut url =
        Url::parse(server_url).with_context(|| format!("invalid server url: {server_url}"))?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        "ws" | "wss" => return Ok(url),
        other => {
            return Err(anyhow!(
                "server url must start with http://, https://, ws:// or wss://, got {other}://"
            ))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("cannot switch {server_url} to {scheme}://"))?;
    let path = format!("{}/ws", url.path().trim_end_matches('/'));
    url.set_path(&path);
    Ok(url)
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
