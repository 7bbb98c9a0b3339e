//! Proxima integration test harness.
//!
//! Every test starts its own in-process server on a loopback port and
//! drives it with real WebSocket clients:
//!
//!   cargo test --test integration
//!
//! Cross-client ordering is only guaranteed per socket, so tests wait for a
//! client's `peers-in-range` snapshot before moving another client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use proxima_core::config::ProximaConfig;
use proxima_core::{ClientHandle, ServerEvent};
use proxima_services::{hub, DeliveryStats, Registry, SignalingHub};

mod proximity;

/// How long a test waits for an expected event.
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(3);
/// How long a test listens before concluding nothing is coming.
pub const QUIET_PERIOD: Duration = Duration::from_millis(300);

// ── Server ────────────────────────────────────────────────────────────────────

pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: Registry,
    pub stats: DeliveryStats,
    shutdown: broadcast::Sender<()>,
    hub_task: JoinHandle<()>,
    server_task: JoinHandle<anyhow::Result<()>>,
}

pub async fn start_server() -> Result<TestServer> {
    start_server_with(ProximaConfig::default()).await
}

pub async fn start_server_with(config: ProximaConfig) -> Result<TestServer> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let config = Arc::new(config);

    let (shutdown, _) = broadcast::channel(1);
    let signaling = SignalingHub::new(&config);
    let registry = signaling.registry();
    let stats = signaling.stats();
    let (handle, commands) = hub::channel(config.limits.hub_queue_depth);
    let hub_task = tokio::spawn(signaling.run(commands, shutdown.subscribe()));

    let state = proxima_api::ApiState {
        hub: handle,
        registry: registry.clone(),
        stats: stats.clone(),
        config,
        started_at: Instant::now(),
    };
    let server_task = tokio::spawn(proxima_api::serve(state, listener, shutdown.subscribe()));

    Ok(TestServer {
        addr,
        registry,
        stats,
        shutdown,
        hub_task,
        server_task,
    })
}

impl TestServer {
    pub async fn client(&self) -> Result<TestClient> {
        TestClient::connect(self.addr).await
    }

    /// Poll until `check` holds or the timeout passes.
    pub async fn wait_until(&self, what: &str, check: impl Fn(&TestServer) -> bool) -> Result<()> {
        let deadline = Instant::now() + EVENT_TIMEOUT;
        while !check(self) {
            if Instant::now() > deadline {
                bail!("timed out waiting for {what}");
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        Ok(())
    }

    /// Kill the hub task without running its shutdown, leaving the API up.
    pub async fn abort_hub(&mut self) {
        self.hub_task.abort();
        let _ = (&mut self.hub_task).await;
    }

    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(());
        self.hub_task.await?;
        self.server_task.abort();
        Ok(())
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

pub struct TestClient {
    pub id: ClientHandle,
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    /// Open a socket and wait for the `connected` greeting.
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .context("websocket handshake failed")?;
        let mut client = Self {
            id: ClientHandle::from_raw(0),
            ws,
        };
        match client.next_event().await? {
            ServerEvent::Connected { id, .. } => client.id = id,
            other => bail!("expected connected, got {other:?}"),
        }
        Ok(client)
    }

    pub async fn send_raw(&mut self, text: &str) -> Result<()> {
        self.ws.send(Message::Text(text.to_string().into())).await?;
        Ok(())
    }

    pub async fn send(&mut self, frame: Value) -> Result<()> {
        self.send_raw(&frame.to_string()).await
    }

    pub async fn update_location(
        &mut self,
        latitude: f64,
        longitude: f64,
        radius: f64,
    ) -> Result<()> {
        self.send(json!({
            "event": "update-location",
            "data": {
                "location": { "latitude": latitude, "longitude": longitude },
                "radius": radius
            }
        }))
        .await
    }

    /// Move and wait for the resulting snapshot, collecting anything before it.
    pub async fn move_to(
        &mut self,
        latitude: f64,
        longitude: f64,
        radius: f64,
    ) -> Result<(Vec<ServerEvent>, Vec<ClientHandle>)> {
        self.update_location(latitude, longitude, radius).await?;
        let mut before = Vec::new();
        loop {
            match self.next_event().await? {
                ServerEvent::PeersInRange(peers) => return Ok((before, peers)),
                other => before.push(other),
            }
        }
    }

    pub async fn signal(&mut self, event: &str, to: ClientHandle, payload: Value) -> Result<()> {
        self.send(json!({ "event": event, "data": { "to": to, "payload": payload } }))
            .await
    }

    pub async fn next_event(&mut self) -> Result<ServerEvent> {
        let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
        loop {
            let msg = tokio::time::timeout_at(deadline, self.ws.next())
                .await
                .context("timed out waiting for event")?
                .context("socket closed")??;
            match msg {
                Message::Text(text) => return Ok(serde_json::from_str(text.as_str())?),
                Message::Close(_) => bail!("socket closed by server"),
                _ => continue,
            }
        }
    }

    /// Fail if any event arrives within the quiet period.
    pub async fn expect_silence(&mut self) -> Result<()> {
        match tokio::time::timeout(QUIET_PERIOD, self.next_event()).await {
            Err(_) => Ok(()),
            Ok(Ok(ev)) => bail!("expected silence, got {ev:?}"),
            Ok(Err(e)) => Err(e),
        }
    }

    /// Wait for the server to close the socket.
    pub async fn expect_closed(&mut self) -> Result<()> {
        let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
        loop {
            match tokio::time::timeout_at(deadline, self.ws.next()).await {
                Err(_) => bail!("socket still open"),
                Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return Ok(()),
                Ok(Some(Ok(_))) => continue,
            }
        }
    }

    pub async fn close(mut self) -> Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}

// ── Smoke ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_assigns_distinct_handles() -> Result<()> {
    let server = start_server().await?;
    let a = server.client().await?;
    let b = server.client().await?;

    assert_ne!(a.id, b.id);
    server.wait_until("two clients registered", |s| s.registry.len() == 2).await?;

    server.stop().await
}

#[tokio::test]
async fn test_connected_event_carries_hints() -> Result<()> {
    let server = start_server().await?;
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", server.addr)).await?;

    let msg = ws.next().await.context("no greeting")??;
    let greeting: Value = serde_json::from_str(msg.to_text()?)?;
    assert_eq!(greeting["event"], "connected");
    assert_eq!(greeting["data"]["hints"]["default_radius_km"], 1.0);
    assert_eq!(greeting["data"]["hints"]["max_radius_km"], 5.0);
    assert!(greeting["data"]["id"].as_str().is_some_and(|id| id.len() == 16));

    server.stop().await
}
