use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;

use super::ServerState;
use crate::watch::{ReloadKind, ReloadSink};

/// Websocket path the injected client connects to.
pub const RELOAD_PATH: &str = "/__sitepipe/reload";

/// Broadcasts reload requests to every connected browser.
#[derive(Clone, Debug)]
pub struct LiveReload {
    tx: broadcast::Sender<ReloadKind>,
}

impl Default for LiveReload {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveReload {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadKind> {
        self.tx.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl ReloadSink for LiveReload {
    fn reload(&self, kind: ReloadKind) {
        // No receivers just means no browser is connected.
        if self.tx.send(kind).is_ok() {
            tracing::debug!(?kind, clients = self.client_count(), "reload sent");
        }
    }
}

/// Wire message for a reload kind.
pub fn message(kind: ReloadKind) -> &'static str {
    match kind {
        ReloadKind::Full => "reload",
        ReloadKind::Styles => "css",
    }
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    let live = state.live.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, live))
}

async fn handle_socket(socket: WebSocket, live: LiveReload) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = live.subscribe();

    let mut send_task = tokio::spawn(async move {
        loop {
            let kind = match rx.recv().await {
                Ok(kind) => kind,
                // Dropped messages collapse into one full reload.
                Err(broadcast::error::RecvError::Lagged(_)) => ReloadKind::Full,
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if sender.send(Message::Text(message(kind).into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            if matches!(msg, Ok(Message::Close(_)) | Err(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}

/// Client script injected into served pages.
pub fn reload_script() -> String {
    format!(
        r#"<script>
(function() {{
    if (typeof WebSocket === 'undefined') return;

    function refreshStyles() {{
        var links = document.querySelectorAll('link[rel="stylesheet"]');
        for (var i = 0; i < links.length; i++) {{
            var url = new URL(links[i].href);
            url.searchParams.set('sitepipe', Date.now());
            links[i].href = url.toString();
        }}
    }}

    function connect() {{
        var protocol = window.location.protocol === 'https:' ? 'wss:' : 'ws:';
        var ws = new WebSocket(protocol + '//' + window.location.host + '{path}');

        ws.onmessage = function(event) {{
            if (event.data === 'css') {{
                refreshStyles();
            }} else if (event.data === 'reload') {{
                window.location.reload();
            }}
        }};

        ws.onclose = function() {{
            setTimeout(connect, 1000);
        }};
    }}

    connect();
}})();
</script>
"#,
        path = RELOAD_PATH
    )
}

/// Insert the reload client before the last `</body>`, or append it.
pub fn inject(html: &str) -> String {
    let script = reload_script();
    match html.rfind("</body>") {
        Some(idx) => format!("{}{}{}", &html[..idx], script, &html[idx..]),
        None => format!("{}{}", html, script),
    }
}
