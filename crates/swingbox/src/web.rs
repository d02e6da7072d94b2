//! HTTP and WebSocket control surface.
//!
//! Every control is a GET with query parameters returning JSON. The `/ws`
//! socket carries pan/swing commands in and gain updates out.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        FromRequestParts, Query, State,
    },
    http::request::Parts,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use swingdeck::{StereoGain, SwingPlayer};
use tokio::sync::mpsc;

use crate::error::{check_range, ApiError};
use crate::fetcher::MediaFetcher;
use crate::library::Library;

/// Interval used when a socket `swing` message omits one.
pub const DEFAULT_WS_SWING_INTERVAL: f64 = 0.1;

/// Shared state for web handlers
#[derive(Clone)]
pub struct AppState {
    pub player: SwingPlayer,
    pub library: Arc<Library>,
    pub fetcher: Arc<dyn MediaFetcher>,
    pub start_time: Instant,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(serve_ui))
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/download", get(download))
        .route("/list", get(list))
        .route("/load", get(load))
        .route("/play", get(play))
        .route("/stop", get(stop))
        .route("/set_pan", get(set_pan))
        .route("/set_volume", get(set_volume))
        .route("/set_min_volume", get(set_min_volume))
        .route("/set_loop", get(set_loop))
        .route("/set_pattern", get(set_pattern))
        .route("/toggle_swing", get(toggle_swing))
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

/// `Query` whose rejections are reported as JSON `{"error"}` bodies.
struct ApiQuery<T>(T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(ApiQuery(value))
    }
}

async fn serve_ui() -> Html<&'static str> {
    Html(UI_HTML)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn status(State(state): State<AppState>) -> Json<swingdeck::PlayerSnapshot> {
    Json(state.player.snapshot())
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    url: String,
    name: String,
}

#[tracing::instrument(name = "http.download", skip(state))]
async fn download(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DownloadQuery>,
) -> Result<Json<Value>, ApiError> {
    let files = state
        .library
        .download(state.fetcher.as_ref(), &query.url, &query.name)
        .await?;
    Ok(Json(json!({"status": "downloaded", "files": files})))
}

#[tracing::instrument(name = "http.list", skip(state))]
async fn list(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let files = state.library.list()?;
    Ok(Json(json!({"files": files})))
}

#[derive(Debug, Deserialize)]
struct LoadQuery {
    file: String,
}

#[tracing::instrument(name = "http.load", skip(state))]
async fn load(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LoadQuery>,
) -> Result<Json<Value>, ApiError> {
    let path = state.library.resolve(&query.file)?;
    let player = state.player.clone();

    // Decoding a whole track is CPU-bound
    tokio::task::spawn_blocking(move || player.load(&path))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(json!({"status": "loaded", "file": query.file})))
}

#[tracing::instrument(name = "http.play", skip(state))]
async fn play(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let player = state.player.clone();

    // Opening a device stream blocks until the sound card is ready
    tokio::task::spawn_blocking(move || player.play())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(json!({"status": "playing"})))
}

#[tracing::instrument(name = "http.stop", skip(state))]
async fn stop(State(state): State<AppState>) -> Json<Value> {
    state.player.stop();
    Json(json!({"status": "stopped"}))
}

#[derive(Debug, Deserialize)]
struct ValueQuery {
    value: f32,
}

#[tracing::instrument(name = "http.set_pan", skip(state))]
async fn set_pan(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ValueQuery>,
) -> Result<Json<Value>, ApiError> {
    let value = check_range("pan", query.value, -1.0..=1.0)?;
    state.player.set_pan(value);
    Ok(Json(json!({"status": "pan set", "value": value})))
}

#[tracing::instrument(name = "http.set_volume", skip(state))]
async fn set_volume(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ValueQuery>,
) -> Result<Json<Value>, ApiError> {
    let value = check_range("volume", query.value, 0.0..=1.0)?;
    state.player.set_volume(value);
    Ok(Json(json!({"status": "volume set", "value": value})))
}

#[tracing::instrument(name = "http.set_min_volume", skip(state))]
async fn set_min_volume(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ValueQuery>,
) -> Result<Json<Value>, ApiError> {
    let value = check_range("min volume", query.value, 0.0..=1.0)?;
    state.player.set_min_volume(value);
    Ok(Json(json!({"status": "min volume set", "value": value})))
}

#[derive(Debug, Deserialize)]
struct LoopQuery {
    enable: bool,
}

#[tracing::instrument(name = "http.set_loop", skip(state))]
async fn set_loop(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LoopQuery>,
) -> Json<Value> {
    state.player.set_loop(query.enable);
    Json(json!({"loop": query.enable}))
}

#[derive(Debug, Deserialize)]
struct PatternQuery {
    name: String,
}

#[tracing::instrument(name = "http.set_pattern", skip(state))]
async fn set_pattern(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PatternQuery>,
) -> Result<Json<Value>, ApiError> {
    let pattern = state.player.set_pattern(&query.name)?;
    Ok(Json(json!({"pattern": pattern})))
}

#[tracing::instrument(name = "http.toggle_swing", skip(state))]
async fn toggle_swing(State(state): State<AppState>) -> Json<Value> {
    let swinging = state.player.toggle_swing();
    Json(json!({"swinging": swinging}))
}

/// Messages accepted on the socket.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    Pan { value: f32 },
    Swing {
        #[serde(default)]
        interval: Option<f64>,
    },
    StopSwing,
    Pattern { name: String },
    Volume { value: f32 },
}

/// Messages pushed to the socket.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ServerMessage {
    VolumeUpdate { left: f32, right: f32 },
    Error { error: String },
}

impl From<StereoGain> for ServerMessage {
    fn from(gain: StereoGain) -> Self {
        ServerMessage::VolumeUpdate {
            left: gain.left,
            right: gain.right,
        }
    }
}

/// Apply one socket command to the player.
pub fn apply_client_message(player: &SwingPlayer, message: ClientMessage) -> Result<(), ApiError> {
    match message {
        ClientMessage::Pan { value } => {
            player.set_pan(check_range("pan", value, -1.0..=1.0)?);
        }
        ClientMessage::Swing { interval } => {
            player.enable_auto_swing(interval.unwrap_or(DEFAULT_WS_SWING_INTERVAL))?;
        }
        ClientMessage::StopSwing => player.disable_auto_swing(),
        ClientMessage::Pattern { name } => {
            player.set_pattern(&name)?;
        }
        ClientMessage::Volume { value } => {
            player.set_volume(check_range("volume", value, 0.0..=1.0)?);
        }
    }
    Ok(())
}

/// Parse and apply a text frame; `Some` is the error to send back.
fn handle_text(player: &SwingPlayer, text: &str) -> Option<ServerMessage> {
    let result = serde_json::from_str::<ClientMessage>(text)
        .map_err(|e| ApiError::Validation(format!("invalid message: {}", e)))
        .and_then(|message| apply_client_message(player, message));

    match result {
        Ok(()) => None,
        Err(e) => Some(ServerMessage::Error {
            error: e.to_string(),
        }),
    }
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.player))
}

async fn handle_socket(socket: WebSocket, player: SwingPlayer) {
    let (sender, receiver) = socket.split();

    let outgoing = sender.with(|text: String| {
        future::ready(Ok::<_, axum::Error>(Message::Text(text.into())))
    });
    let incoming = receiver
        .take_while(|frame| {
            future::ready(matches!(frame, Ok(message) if !matches!(message, Message::Close(_))))
        })
        .filter_map(|frame| {
            future::ready(match frame {
                Ok(Message::Text(text)) => Some(text.as_str().to_owned()),
                _ => None,
            })
        });

    run_control_session(player, outgoing, incoming).await;
}

/// Drive one control session over text frames.
///
/// Attaches as the player's listener, applies every incoming frame and
/// forwards gain updates and error replies to `outgoing`. Returns once
/// either direction closes. The listener is then detached and auto-swing
/// disabled, unless a newer session has already taken over the listener.
pub async fn run_control_session<O, I>(player: SwingPlayer, mut outgoing: O, mut incoming: I)
where
    O: Sink<String> + Unpin + Send + 'static,
    I: Stream<Item = String> + Unpin + Send + 'static,
{
    let (listener_id, mut updates) = player.attach_listener();
    tracing::info!(listener = %listener_id, "control socket connected");

    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMessage>(16);

    let mut send_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                Some(gain) = updates.recv() => ServerMessage::from(gain),
                Some(reply) = reply_rx.recv() => reply,
                else => break,
            };

            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Failed to serialize socket message: {}", e);
                    continue;
                }
            };
            if outgoing.send(text).await.is_err() {
                break;
            }
        }
    });

    let recv_player = player.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(text) = incoming.next().await {
            if let Some(reply) = handle_text(&recv_player, &text) {
                if reply_tx.send(reply).await.is_err() {
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // A newer socket may have taken over; leave its swing alone
    if player.detach_listener(listener_id) {
        player.disable_auto_swing();
    }
    tracing::info!(listener = %listener_id, "control socket disconnected");
}

/// Single-page control UI
const UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>SwingBox</title>
  <style>
    :root { --bg: #1a1a2e; --card: #16213e; --accent: #e94560; --text: #eee; --muted: #888; }
    * { box-sizing: border-box; margin: 0; padding: 0; }
    body { font-family: system-ui, -apple-system, sans-serif; background: var(--bg); color: var(--text); padding: 1rem; max-width: 40rem; margin: auto; }
    h1 { font-size: 1.5rem; margin-bottom: 1rem; }
    section { background: var(--card); border-radius: 6px; padding: 1rem; margin-bottom: 1rem; }
    h2 { font-size: 1rem; color: var(--muted); margin-bottom: 0.5rem; }
    button { background: var(--accent); border: none; color: white; padding: 0.4rem 0.9rem; border-radius: 4px; cursor: pointer; margin: 0.2rem 0.2rem 0.2rem 0; }
    input[type=text], select { background: var(--bg); color: var(--text); border: 1px solid var(--muted); padding: 0.3rem; border-radius: 4px; }
    input[type=range] { width: 100%; }
    label { display: block; margin-top: 0.5rem; font-size: 0.9rem; }
    .meters { display: flex; gap: 1rem; }
    .meter { flex: 1; height: 0.8rem; background: var(--bg); border-radius: 4px; overflow: hidden; }
    .meter div { height: 100%; background: var(--accent); width: 0; transition: width 40ms linear; }
    #files li { cursor: pointer; list-style: none; padding: 0.2rem 0; }
    #files li:hover { color: var(--accent); }
    #msg { color: var(--muted); font-size: 0.85rem; min-height: 1.2rem; }
  </style>
</head>
<body>
  <h1>SwingBox</h1>

  <section>
    <h2>Download</h2>
    <input type="text" id="url" placeholder="URL" size="30">
    <input type="text" id="name" placeholder="name" size="12">
    <button onclick="download()">Fetch</button>
  </section>

  <section>
    <h2>Library</h2>
    <ul id="files"></ul>
  </section>

  <section>
    <h2>Transport</h2>
    <button onclick="call('/play')">Play</button>
    <button onclick="call('/stop')">Stop</button>
    <label><input type="checkbox" id="loop" onchange="call('/set_loop?enable=' + this.checked)"> Loop</label>
    <label>Volume <input type="range" id="volume" min="0" max="1" step="0.01" value="1" oninput="call('/set_volume?value=' + this.value)"></label>
    <label>Floor <input type="range" id="floor" min="0" max="1" step="0.01" value="0.2" oninput="call('/set_min_volume?value=' + this.value)"></label>
  </section>

  <section>
    <h2>Swing</h2>
    <label>Pan <input type="range" id="pan" min="-1" max="1" step="0.01" value="0" oninput="send({action: 'pan', value: parseFloat(this.value)})"></label>
    <label>Interval (s) <input type="range" id="interval" min="0.1" max="10" step="0.1" value="2"></label>
    <label>Pattern
      <select id="pattern" onchange="send({action: 'pattern', name: this.value})">
        <option>sine</option><option>parabola</option><option>cubic</option>
        <option>triangle</option><option>exponential</option><option>logarithmic</option>
      </select>
    </label>
    <button onclick="send({action: 'swing', interval: parseFloat(document.getElementById('interval').value)})">Swing</button>
    <button onclick="send({action: 'stop_swing'})">Stop swing</button>
    <div class="meters" style="margin-top: 0.8rem">
      <div class="meter"><div id="left"></div></div>
      <div class="meter"><div id="right"></div></div>
    </div>
  </section>

  <div id="msg"></div>

  <script>
    const msg = (t) => document.getElementById('msg').textContent = t;

    async function call(path) {
      const res = await fetch(path);
      const body = await res.json();
      msg(body.error ? 'error: ' + body.error : JSON.stringify(body));
      return body;
    }

    async function refresh() {
      const body = await call('/list');
      const list = document.getElementById('files');
      list.innerHTML = '';
      for (const f of body.files || []) {
        const li = document.createElement('li');
        li.textContent = f;
        li.onclick = () => call('/load?file=' + encodeURIComponent(f));
        list.appendChild(li);
      }
    }

    async function download() {
      const url = document.getElementById('url').value;
      const name = document.getElementById('name').value;
      msg('downloading...');
      await call('/download?url=' + encodeURIComponent(url) + '&name=' + encodeURIComponent(name));
      refresh();
    }

    let ws;
    function connect() {
      const proto = location.protocol === 'https:' ? 'wss' : 'ws';
      ws = new WebSocket(proto + '://' + location.host + '/ws');
      ws.onmessage = (ev) => {
        const m = JSON.parse(ev.data);
        if (m.action === 'volume_update') {
          document.getElementById('left').style.width = (m.left * 100) + '%';
          document.getElementById('right').style.width = (m.right * 100) + '%';
        } else if (m.action === 'error') {
          msg('error: ' + m.error);
        }
      };
      ws.onclose = () => setTimeout(connect, 1000);
    }
    function send(obj) {
      if (ws && ws.readyState === WebSocket.OPEN) ws.send(JSON.stringify(obj));
    }

    connect();
    refresh();
  </script>
</body>
</html>
"##;
