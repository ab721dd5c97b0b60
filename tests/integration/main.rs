//! simlive integration test harness.
//!
//! Every test boots its own in-process API server on an ephemeral
//! loopback port, backed by the reference engines, and drives it over HTTP
//! and WebSocket exactly as a browser client would.
//!
//!   cargo test --test integration

use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use simlive_api::ApiState;
use simlive_services::{Engines, SessionSettings, SessionStore};

mod model;
mod sessions;

// ── Harness ───────────────────────────────────────────────────────────────────

/// Two-species decay with one conserved moiety.
pub const DECAY_MODEL: &str = "\
compartment cell = 1
species A = 10 in cell
species B = 0 in cell
param k1 = 0.5
reaction J0: A -> B ; k1
";

/// Overflows on the first step.
pub const DIVERGENT_MODEL: &str = "species A = 1e200\nreaction J: 2 A -> 3 A ; 1e200\n";

pub struct TestServer {
    pub base: String,
    pub ws_base: String,
    pub store: SessionStore,
    _shutdown: tokio::sync::broadcast::Sender<()>,
}

pub async fn spawn_server() -> Result<TestServer> {
    spawn_server_with(SessionSettings::default()).await
}

pub async fn spawn_server_with(settings: SessionSettings) -> Result<TestServer> {
    let store = SessionStore::new(Engines::reference(50), settings);
    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let state = ApiState::new(store.clone(), shutdown_tx.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = simlive_api::router(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(TestServer {
        base: format!("http://{addr}/api"),
        ws_base: format!("ws://{addr}/api"),
        store,
        _shutdown: shutdown_tx,
    })
}

impl TestServer {
    pub async fn get(&self, path: &str) -> Result<(u16, Value)> {
        let resp = reqwest::get(format!("{}{}", self.base, path))
            .await
            .with_context(|| format!("GET {path}"))?;
        decode(resp).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<(u16, Value)> {
        let resp = reqwest::Client::new()
            .post(format!("{}{}", self.base, path))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {path}"))?;
        decode(resp).await
    }

    pub async fn delete(&self, path: &str) -> Result<(u16, Value)> {
        let resp = reqwest::Client::new()
            .delete(format!("{}{}", self.base, path))
            .send()
            .await
            .with_context(|| format!("DELETE {path}"))?;
        decode(resp).await
    }

    /// Create a session and return its id.
    pub async fn load(&self) -> Result<String> {
        let resp = reqwest::Client::new()
            .post(format!("{}/sessions", self.base))
            .send()
            .await?;
        let (status, body) = decode(resp).await?;
        if status != 201 {
            bail!("load failed ({status}): {body}");
        }
        body["session_id"]
            .as_str()
            .map(str::to_string)
            .context("missing session_id")
    }

    pub async fn upload(&self, id: &str, model: &str) -> Result<(u16, Value)> {
        use reqwest::multipart;

        let form = multipart::Form::new()
            .part(
                "sbml",
                multipart::Part::text(model.to_string()).file_name("model.txt"),
            )
            .text("width", "400")
            .text("height", "300")
            .text("gravity", "1")
            .text("stiffness", "1");
        let resp = reqwest::Client::new()
            .post(format!("{}/sessions/{}/upload", self.base, id))
            .multipart(form)
            .send()
            .await?;
        decode(resp).await
    }

    /// A session with `DECAY_MODEL` loaded.
    pub async fn loaded_session(&self) -> Result<String> {
        let id = self.load().await?;
        let (status, body) = self.upload(&id, DECAY_MODEL).await?;
        if status != 200 {
            bail!("upload failed ({status}): {body}");
        }
        Ok(id)
    }

    pub async fn run_state(&self, id: &str) -> Result<String> {
        let (_, body) = self.get(&format!("/sessions/{id}")).await?;
        body["run_state"]
            .as_str()
            .map(str::to_string)
            .context("missing run_state")
    }

    /// Poll until the session reaches `state`.
    pub async fn wait_for_state(&self, id: &str, state: &str) -> Result<()> {
        for _ in 0..100 {
            if self.run_state(id).await? == state {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        bail!("session {id} never reached {state}")
    }

    pub async fn connect_live(&self, id: &str) -> Result<Live> {
        let (ws, _) = tokio_tungstenite::connect_async(format!("{}/sessions/{}/live", self.ws_base, id))
            .await
            .context("live connection failed")?;
        Ok(Live { ws })
    }
}

async fn decode(resp: reqwest::Response) -> Result<(u16, Value)> {
    let status = resp.status().as_u16();
    let text = resp.text().await?;
    let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
    Ok((status, body))
}

/// Client side of a session's live connection.
pub struct Live {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Live {
    pub async fn send(&mut self, frame: Value) -> Result<()> {
        self.ws.send(Message::Text(frame.to_string().into())).await?;
        Ok(())
    }

    /// Next push frame, or `None` if nothing arrives within `wait`.
    pub async fn next_event(&mut self, wait: Duration) -> Result<Option<Value>> {
        loop {
            let frame = match tokio::time::timeout(wait, self.ws.next()).await {
                Err(_) => return Ok(None),
                Ok(None) => bail!("live connection closed"),
                Ok(Some(frame)) => frame?,
            };
            if let Message::Text(text) = frame {
                return Ok(Some(serde_json::from_str(text.as_str())?));
            }
        }
    }

    /// Next push frame; fails if none arrives within two seconds.
    pub async fn expect_event(&mut self) -> Result<Value> {
        self.next_event(Duration::from_secs(2))
            .await?
            .context("no push event within 2s")
    }

    /// Swallow frames until the connection has been quiet for `quiet`.
    pub async fn drain(&mut self, quiet: Duration) -> Result<Vec<Value>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next_event(quiet).await? {
            frames.push(frame);
        }
        Ok(frames)
    }

    pub async fn close(mut self) -> Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}
