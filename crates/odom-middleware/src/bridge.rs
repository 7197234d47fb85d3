//! WebSocket bridge between external clients and the internal [`EventBus`].
//!
//! [`RosBridge`]:
//!
//! 1. **Ingests** rosbridge publish frames on the encoder topic and puts the
//!    decoded [`SensorSample`]s onto [`Topic::MotorEncoder`].
//! 2. **Serves** every velocity estimate and absolute count published on the
//!    bus to all connected clients, encoded with [`wire`][crate::wire].
//!
//! The bridge never interprets the data it routes.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use odom_types::{Event, EventPayload, OdomError, SensorSample};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::bus::{EventBus, Topic};
use crate::wire;

const SOURCE: &str = "odom-middleware::bridge";

/// External topic names used on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeTopics {
    /// Topic encoder clients publish samples on.
    pub encoder: String,
    /// Topic velocity estimates are published on.
    pub odom: String,
    /// Topic absolute counts are published on.
    pub encoder_abs: String,
}

impl Default for BridgeTopics {
    fn default() -> Self {
        Self {
            encoder: "/motor_encoder".to_string(),
            odom: "motor_odom".to_string(),
            encoder_abs: "motor_encoder_abs".to_string(),
        }
    }
}

/// Bridge between rosbridge WebSocket clients and the internal [`EventBus`].
#[derive(Clone)]
pub struct RosBridge {
    bus: Arc<EventBus>,
    topics: Arc<BridgeTopics>,
}

impl RosBridge {
    pub fn new(bus: Arc<EventBus>, topics: BridgeTopics) -> Self {
        Self {
            bus,
            topics: Arc::new(topics),
        }
    }

    /// Publish one encoder sample onto [`Topic::MotorEncoder`].
    pub fn ingest_sample(&self, sample: SensorSample) -> Result<usize, OdomError> {
        let event = Event::now(
            format!("{SOURCE}/{}", self.topics.encoder.trim_start_matches('/')),
            EventPayload::EncoderSample(sample),
        );
        self.bus.publish_to(Topic::MotorEncoder, event)
    }

    /// Bind `addr` and serve clients until a fatal error.
    ///
    /// # Errors
    ///
    /// Returns [`OdomError::Transport`] if the TCP listener cannot be bound.
    pub async fn run_ws_server(self, addr: SocketAddr) -> Result<(), OdomError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| OdomError::Transport(format!("ws bind error on {addr}: {e}")))?;
        info!(%addr, "rosbridge websocket server listening");
        self.serve(listener).await
    }

    /// Serve clients on an already bound `listener`.
    pub async fn serve(self, listener: TcpListener) -> Result<(), OdomError> {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let bridge = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = bridge.handle_ws_client(stream, peer).await {
                            error!(peer = %peer, error = %e, "ws client error");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "ws accept error");
                }
            }
        }
    }

    async fn handle_ws_client(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), OdomError> {
        let ws_stream = accept_async(stream)
            .await
            .map_err(|e| OdomError::Transport(format!("ws handshake from {peer}: {e}")))?;
        debug!(peer = %peer, "ws client connected");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let mut odom_rx = self.bus.subscribe_to(Topic::MotorOdom);
        let mut abs_rx = self.bus.subscribe_to(Topic::MotorEncoderAbs);

        loop {
            let outbound = tokio::select! {
                result = odom_rx.recv() => result,
                result = abs_rx.recv() => result,
                msg = ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(_)) => break,
                        Some(Ok(Message::Text(text))) => {
                            self.handle_incoming_ws_message(text.as_str());
                        }
                        _ => {}
                    }
                    continue;
                }
            };

            match outbound {
                Ok(event) => {
                    let Some(json) = self.encode_event(&event)? else {
                        continue;
                    };
                    if ws_tx.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(peer = %peer, lagged_by = n, "ws client lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }

        debug!(peer = %peer, "ws client disconnected");
        Ok(())
    }

    /// Turn an outbound bus event into a wire frame.
    ///
    /// Returns `Ok(None)` for payloads that are not published to clients.
    fn encode_event(&self, event: &Event) -> Result<Option<String>, OdomError> {
        match &event.payload {
            EventPayload::Odometry(estimate) => wire::encode_odom(&self.topics.odom, estimate).map(Some),
            EventPayload::EncoderAbsolute(value) => {
                wire::encode_encoder_abs(&self.topics.encoder_abs, *value).map(Some)
            }
            EventPayload::EncoderSample(_) => Ok(None),
        }
    }

    /// Handle one text frame from a client.
    ///
    /// Encoder publishes are forwarded to the bus; everything else is
    /// ignored. Undecodable frames are logged and dropped.
    ///
    /// Returns `true` when a sample was forwarded.
    fn handle_incoming_ws_message(&self, text: &str) -> bool {
        match wire::decode_sample(text, &self.topics.encoder) {
            Ok(Some(sample)) => match self.ingest_sample(sample) {
                Ok(_) => true,
                Err(e) => {
                    warn!(error = %e, "encoder sample dropped");
                    false
                }
            },
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "undecodable frame from ws client");
                false
            }
        }
    }
}
