//! HTTP handlers for the control API.

use super::AppState;
use crate::cec::{CommandKind, CommandOutcome};
use crate::dispatch::Source;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, Json},
};
use serde::Deserialize;
use serde_json::{json, Value};

type ApiResponse = (StatusCode, Json<Value>);

/// Map an outcome to an HTTP status and the `{status, result}` body.
fn respond(outcome: CommandOutcome) -> ApiResponse {
    let code = match outcome {
        CommandOutcome::Success { .. } => StatusCode::OK,
        CommandOutcome::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        CommandOutcome::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        CommandOutcome::Error { .. } => StatusCode::BAD_GATEWAY,
    };
    (
        code,
        Json(json!({
            "status": outcome.status(),
            "result": outcome.text(),
        })),
    )
}

async fn run(state: &AppState, kind: CommandKind) -> ApiResponse {
    respond(state.dispatcher.dispatch(kind, Source::Api).await)
}

/// Scan for CEC devices.
pub async fn scan(State(state): State<AppState>) -> ApiResponse {
    run(&state, CommandKind::Scan).await
}

/// Power on all devices.
pub async fn power_on(State(state): State<AppState>) -> ApiResponse {
    run(&state, CommandKind::PowerOn).await
}

/// Put all devices in standby.
pub async fn power_off(State(state): State<AppState>) -> ApiResponse {
    run(&state, CommandKind::PowerOff).await
}

/// Query the TV power status.
pub async fn status(State(state): State<AppState>) -> ApiResponse {
    run(&state, CommandKind::Status).await
}

#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: Option<String>,
}

/// Send a custom command line.
pub async fn custom_command(
    State(state): State<AppState>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> ApiResponse {
    let command = payload
        .ok()
        .and_then(|Json(req)| req.command)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    match command {
        Some(command) => run(&state, CommandKind::Custom(command)).await,
        None => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "error", "message": "Command is required" })),
        ),
    }
}

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let dispatcher = &state.dispatcher;
    Json(json!({
        "status": "ok",
        "service": "cec-remote",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "connection": dispatcher.channel().connection_state(),
        "gpio_enabled": state.gpio_enabled,
        "cooldown_remaining_ms": dispatcher.limiter().remaining().as_millis() as u64,
    }))
}

/// Serve the built-in control page when no static files are available.
pub async fn default_index() -> Html<&'static str> {
    Html(DEFAULT_INDEX_HTML)
}

const DEFAULT_INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>CEC Remote</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
               background: #1e1e2e; color: #eee; max-width: 640px; margin: 0 auto; padding: 20px; }
        h1 { text-align: center; }
        .buttons { display: grid; grid-template-columns: 1fr 1fr; gap: 12px; margin-bottom: 16px; }
        button { font-size: 1.1rem; padding: 16px; border: none; border-radius: 10px; cursor: pointer; }
        .on { background: #3fb950; } .off { background: #f85149; }
        .query { background: #58a6ff; }
        form { display: flex; gap: 8px; margin-bottom: 16px; }
        input { flex: 1; padding: 10px; border-radius: 8px; border: none; }
        pre { background: #111; padding: 12px; border-radius: 8px; white-space: pre-wrap; min-height: 120px; }
        #log div { font-size: 0.85rem; border-bottom: 1px solid #333; padding: 4px 0; }
    </style>
</head>
<body>
    <h1>CEC Remote</h1>
    <div class="buttons">
        <button class="on" onclick="send('POST', '/api/power/on')">Power ON</button>
        <button class="off" onclick="send('POST', '/api/power/off')">Power OFF</button>
        <button class="query" onclick="send('GET', '/api/status')">Status</button>
        <button class="query" onclick="send('GET', '/api/scan')">Scan</button>
    </div>
    <form onsubmit="custom(event)">
        <input id="command" placeholder="custom command, e.g. tx 10:04">
        <button class="query" type="submit">Send</button>
    </form>
    <pre id="result">Ready.</pre>
    <h3>Activity</h3>
    <div id="log"></div>
    <script>
        async function send(method, url, body) {
            document.getElementById('result').textContent = 'Waiting for ' + url + '...';
            const opts = { method, headers: { 'Content-Type': 'application/json' } };
            if (body) opts.body = JSON.stringify(body);
            try {
                const res = await fetch(url, opts);
                const data = await res.json();
                document.getElementById('result').textContent =
                    '[' + data.status + '] ' + (data.result || data.message || '');
            } catch (e) {
                document.getElementById('result').textContent = 'Request failed: ' + e;
            }
        }
        function custom(ev) {
            ev.preventDefault();
            send('POST', '/api/command', { command: document.getElementById('command').value });
        }
        function connect() {
            const proto = location.protocol === 'https:' ? 'wss:' : 'ws:';
            const ws = new WebSocket(proto + '//' + location.host + '/ws');
            ws.onmessage = (msg) => {
                const ev = JSON.parse(msg.data);
                const row = document.createElement('div');
                const who = ev.source.source === 'button' ? ev.source.button + ' button' : 'web';
                row.textContent = ev.timestamp + '  ' + ev.kind.kind + ' (' + who + '): ' + ev.outcome.status;
                document.getElementById('log').prepend(row);
            };
            ws.onclose = () => setTimeout(connect, 3000);
        }
        connect();
    </script>
</body>
</html>"#;
