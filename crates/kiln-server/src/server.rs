//! Development server implementation.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use kiln_pipeline::Pipeline;
use tokio::sync::{broadcast, mpsc};
use tower_http::services::ServeDir;

use crate::routes::{WatchAction, WatchRoutes};
use crate::watcher::{FileWatcher, WatchEvent};
use crate::websocket::{livereload_client_script, LiveReloadHub, LiveReloadMessage};

const LIVERELOAD_PATH: &str = "/__livereload";
const SCRIPT_PATH: &str = "/__livereload.js";

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Directory served at `/`
    pub root: PathBuf,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("app"),
            port: 3000,
            host: "127.0.0.1".to_string(),
            open: true,
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),

    #[error("Invalid watch pattern: {0}")]
    Route(String),
}

#[derive(Clone)]
struct AppState {
    hub: LiveReloadHub,
}

/// Static file server with live reload, optionally driving a pipeline.
pub struct DevServer {
    config: DevServerConfig,
    pipeline: Option<Arc<Pipeline>>,
    hub: LiveReloadHub,
}

impl DevServer {
    /// A server that only serves `config.root`.
    pub fn new(config: DevServerConfig) -> Self {
        Self {
            config,
            pipeline: None,
            hub: LiveReloadHub::new(),
        }
    }

    /// Watch the served directory and re-run `pipeline` stages on change.
    pub fn with_pipeline(mut self, pipeline: Arc<Pipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Hub that reaches every connected browser.
    pub fn hub(&self) -> LiveReloadHub {
        self.hub.clone()
    }

    /// Start the server. Runs until the listener fails.
    pub async fn start(self) -> Result<(), ServerError> {
        let host_port = format!("{}:{}", self.config.host, self.config.port);
        let addr: SocketAddr = host_port
            .parse()
            .map_err(|_| ServerError::InvalidAddress(host_port.clone()))?;

        if let Some(pipeline) = &self.pipeline {
            let root = self
                .config
                .root
                .canonicalize()
                .map_err(|e| {
                    ServerError::WatchError(format!("{}: {}", self.config.root.display(), e))
                })?;
            let routes = WatchRoutes::from_config(pipeline.config())
                .map_err(|e| ServerError::Route(e.to_string()))?;
            let (watcher, rx) = FileWatcher::new(std::slice::from_ref(&root))
                .map_err(|e| ServerError::WatchError(e.to_string()))?;

            let pipeline = Arc::clone(pipeline);
            let hub = self.hub.clone();
            tokio::spawn(async move {
                dispatch(rx, &root, &routes, pipeline, hub).await;
                // Keep watcher alive
                drop(watcher);
            });
        }

        let app = router(&self.config.root, self.hub.clone());

        tracing::info!("Serving {} at http://{}", self.config.root.display(), addr);

        if self.config.open {
            let url = format!("http://{}", addr);
            let _ = open::that(&url);
        }

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }
}

fn router(root: &Path, hub: LiveReloadHub) -> Router {
    Router::new()
        .route(LIVERELOAD_PATH, get(ws_handler))
        .route(SCRIPT_PATH, get(script_handler))
        .fallback_service(ServeDir::new(root))
        .layer(middleware::from_fn(inject_reload_script))
        .with_state(AppState { hub })
}

/// Route watch events to stage runs and reloads.
///
/// Every trigger runs independently on the blocking pool; a failed run is
/// logged and the loop keeps going.
async fn dispatch(
    mut rx: mpsc::Receiver<WatchEvent>,
    root: &Path,
    routes: &WatchRoutes,
    pipeline: Arc<Pipeline>,
    hub: LiveReloadHub,
) {
    while let Some(event) = rx.recv().await {
        let Ok(relative) = event.path().strip_prefix(root) else {
            continue;
        };

        for action in routes.route(relative, &event) {
            match action {
                WatchAction::Reload => {
                    tracing::info!("Changed: {}", relative.display());
                    hub.send(LiveReloadMessage::Reload);
                }
                WatchAction::Run(kind) => {
                    tracing::info!("Changed: {} -> {}", relative.display(), kind);
                    let pipeline = Arc::clone(&pipeline);
                    let sink = hub.clone();
                    tokio::spawn(async move {
                        let result =
                            tokio::task::spawn_blocking(move || pipeline.run(kind, &sink)).await;

                        match result {
                            Ok(Ok(_)) => {}
                            Ok(Err(e)) => tracing::error!("{} failed: {}", kind, e),
                            Err(e) => tracing::error!("{} panicked: {}", kind, e),
                        }
                    });
                }
            }
        }
    }
}

/// Inject the live reload script into every HTML response.
async fn inject_reload_script(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));
    if !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to buffer HTML response: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_script_tag(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

/// Insert the script tag before the last `</body>`, or append it.
pub fn inject_script_tag(html: &str) -> String {
    let tag = format!(r#"<script src="{}"></script>"#, SCRIPT_PATH);
    match html.rfind("</body>") {
        Some(at) => format!("{}{}{}", &html[..at], tag, &html[at..]),
        None => format!("{}{}", html, tag),
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state.hub))
}

async fn handle_ws(mut socket: WebSocket, hub: LiveReloadHub) {
    let mut rx = hub.subscribe();

    if send_message(&mut socket, &LiveReloadMessage::Connected)
        .await
        .is_err()
    {
        return;
    }

    loop {
        match rx.recv().await {
            Ok(msg) => {
                if send_message(&mut socket, &msg).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!("Live reload client lagged by {} messages", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn send_message(socket: &mut WebSocket, msg: &LiveReloadMessage) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    socket.send(Message::Text(json.into())).await
}

async fn script_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        livereload_client_script(),
    )
}
