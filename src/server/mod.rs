//! Development server.
//!
//! Serves the build folder over HTTP, injects the live-reload client into
//! HTML pages and runs the watch orchestrator alongside.

pub mod live_reload;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode, Uri},
    middleware::{self, Next},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use percent_encoding::percent_decode_str;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::build::{BuildContext, TaskRunner};
use crate::watch::{WatchError, WatchOrchestrator};
pub use live_reload::{LiveReload, RELOAD_PATH};

/// Error while running the dev server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to start async runtime: {0}")]
    Runtime(std::io::Error),
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: std::io::Error },
    #[error("server error: {0}")]
    Serve(std::io::Error),
    #[error(transparent)]
    Watch(#[from] WatchError),
}

/// Shared state of the HTTP handlers.
#[derive(Debug, Clone)]
pub struct ServerState {
    pub root: PathBuf,
    pub index: String,
    pub extension: String,
    pub live: LiveReload,
}

impl ServerState {
    pub fn new(ctx: &BuildContext, live: LiveReload) -> Self {
        let server = &ctx.config().server;
        Self {
            root: ctx.paths().build_dest().to_path_buf(),
            index: server.index.clone(),
            extension: server.extension.trim_start_matches('.').to_string(),
            live,
        }
    }

    /// Percent-decode a request path and map it below the root.
    ///
    /// Returns `None` for invalid UTF-8 and for paths that try to leave the
    /// root.
    fn relative(request_path: &str) -> Option<PathBuf> {
        let decoded = percent_decode_str(request_path).decode_utf8().ok()?;
        let mut relative = PathBuf::new();
        for component in Path::new(decoded.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(relative)
    }

    /// Map a request path to a file under the served root.
    ///
    /// Directory requests get the index document; extensionless routes fall
    /// back to `<route>.<extension>`. Returns `None` for paths that try to
    /// leave the root.
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let candidate = self.root.join(Self::relative(request_path)?);
        if request_path.ends_with('/') || candidate.is_dir() {
            return Some(candidate.join(&self.index));
        }
        if candidate.extension().is_none() {
            let with_ext = candidate.with_extension(&self.extension);
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }
        Some(candidate)
    }

    /// Whether a directory was requested without its trailing slash.
    pub fn needs_trailing_slash(&self, request_path: &str) -> bool {
        !request_path.ends_with('/')
            && Self::relative(request_path).is_some_and(|rel| self.root.join(rel).is_dir())
    }
}

fn is_html(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).as_deref(),
        Some("html") | Some("htm")
    )
}

/// Serve HTML pages with the reload client; everything else falls through
/// to the static file service.
async fn html_pages(State(state): State<Arc<ServerState>>, uri: Uri, request: Request, next: Next) -> Response {
    // Relative links in an index page resolve against its directory.
    if state.needs_trailing_slash(uri.path()) {
        let location = match uri.query() {
            Some(query) => format!("{}/?{}", uri.path(), query),
            None => format!("{}/", uri.path()),
        };
        return Redirect::temporary(&location).into_response();
    }

    let Some(path) = state.resolve(uri.path()) else {
        return StatusCode::FORBIDDEN.into_response();
    };

    if !is_html(&path) {
        return next.run(request).await;
    }

    match tokio::fs::read_to_string(&path).await {
        Ok(html) => (
            [(header::CACHE_CONTROL, "no-cache")],
            Html(live_reload::inject(&html)),
        )
            .into_response(),
        Err(_) => next.run(request).await,
    }
}

/// Build the router for a state.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route(RELOAD_PATH, get(live_reload::websocket_handler))
        .fallback_service(ServeDir::new(&state.root))
        .layer(middleware::from_fn_with_state(state.clone(), html_pages))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

/// Serve the build folder and watch sources until interrupted.
pub async fn run(runner: TaskRunner) -> Result<(), ServerError> {
    let live = LiveReload::new();
    let watch = WatchOrchestrator::new(runner.clone(), Arc::new(live.clone())).start()?;

    let ctx = runner.context();
    let state = Arc::new(ServerState::new(ctx, live));
    let app = router(state.clone());

    let server = &ctx.config().server;
    let addr = format!("{}:{}", server.host, server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr: addr.clone(), source })?;

    println!("Serving {} at http://localhost:{}", state.root.display(), server.port);
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;

    watch.stop();
    Ok(())
}

/// Blocking entry point used by the `server` task.
pub fn serve(runner: TaskRunner) -> Result<(), ServerError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(ServerError::Runtime)?;
    runtime.block_on(run(runner))
}
