//! HTTP API over the Switchyard tool proxy.
//!
//! Routes live under `/api/v1`:
//! - `GET /tools` lists the merged catalog
//! - `POST /discover` ranks the catalog against a query
//! - `POST /use/{tool}` routes one call to the owning provider
//! - `POST /refresh` rebuilds every provider session
//! - `GET /health` answers `OK`

pub mod error;
pub mod handlers;

pub use error::ApiError;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::{Method, header};
use axum::routing::{get, post};
use switchyard_mcp::ToolProxy;
use switchyard_rank::Ranker;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Time limits applied per request kind.
#[derive(Debug, Clone, Copy)]
pub struct Budgets {
    pub list: Duration,
    pub discover: Duration,
    pub call: Duration,
    pub refresh: Duration,
}

impl Default for Budgets {
    fn default() -> Self {
        Self {
            list: Duration::from_secs(30),
            discover: Duration::from_secs(30),
            call: Duration::from_secs(60),
            refresh: Duration::from_secs(60),
        }
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub proxy: ToolProxy,
    /// `None` disables `/discover`.
    pub ranker: Option<Arc<dyn Ranker>>,
    pub budgets: Budgets,
}

impl AppState {
    pub fn new(proxy: ToolProxy, ranker: Option<Arc<dyn Ranker>>) -> Self {
        Self {
            proxy,
            ranker,
            budgets: Budgets::default(),
        }
    }

    pub fn with_budgets(mut self, budgets: Budgets) -> Self {
        self.budgets = budgets;
        self
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/tools", get(handlers::list_tools))
        .route("/discover", post(handlers::discover))
        .route("/use/{tool}", post(handlers::use_tool))
        .route("/refresh", post(handlers::refresh))
        .route("/health", get(handlers::health))
        .with_state(state);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .nest("/api/v1", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("Listening on http://{addr}/api/v1");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
