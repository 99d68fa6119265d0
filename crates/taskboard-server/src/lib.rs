//! HTTP API for the task board: a thin CRUD layer over one `tasks` table.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod table;

use std::fmt;
use std::future::Future;
use std::io;

use anyhow::Context;
use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, put};
use taskboard_shared::{API_HEALTH_PATH, API_TASKS_PATH};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use crate::config::ServerConfig;
pub use crate::state::AppState;
pub use crate::table::{MemoryTaskTable, PgTaskTable, TableError, TaskTable};

pub fn app(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route(API_HEALTH_PATH, get(routes::health))
        .route(
            API_TASKS_PATH,
            get(routes::list_tasks).post(routes::create_task),
        )
        .route(
            &format!("{API_TASKS_PATH}/:id"),
            put(routes::update_task).delete(routes::delete_task),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Allows `client_url` only, or any origin when unset.
pub fn cors_layer(client_url: Option<&str>) -> anyhow::Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    match client_url {
        Some(origin) => {
            let origin = HeaderValue::from_str(origin.trim_end_matches('/'))
                .with_context(|| format!("invalid CLIENT_URL origin: {origin}"))?;
            Ok(cors.allow_origin(AllowOrigin::exact(origin)))
        }
        None => Ok(cors.allow_origin(Any)),
    }
}

/// Why the server stopped taking requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Interrupt,
    Terminate,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Interrupt => f.write_str("interrupt"),
            StopReason::Terminate => f.write_str("terminate"),
        }
    }
}

/// Resolves on ctrl-c, or on SIGTERM where the platform has it.
#[cfg(unix)]
pub async fn stop_signal() -> StopReason {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => tokio::select! {
            reason = interrupt() => reason,
            _ = terminate.recv() => StopReason::Terminate,
        },
        Err(error) => {
            tracing::warn!(%error, "SIGTERM not available; only ctrl-c stops the server");
            interrupt().await
        }
    }
}

#[cfg(not(unix))]
pub async fn stop_signal() -> StopReason {
    interrupt().await
}

async fn interrupt() -> StopReason {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    StopReason::Interrupt
}

/// Serves `router` until `stop` resolves, then drains open requests.
pub async fn serve<F>(listener: TcpListener, router: Router, stop: F) -> io::Result<()>
where
    F: Future<Output = StopReason> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "taskboard server listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let reason = stop.await;
            tracing::warn!(%reason, "stopping task API; draining open requests");
        })
        .await
}
