//! Management API over the configuration store.
//!
//! # Routes
//! ```text
//! GET    /v1/status
//! GET    /v1/version                       ?transaction_id=
//! GET    /v1/raw                           ?transaction_id=
//! POST   /v1/raw                           ?version= | ?transaction_id=
//! GET    /v1/transactions                  ?status=in_progress|outdated
//! POST   /v1/transactions                  ?version= | ?id=
//! GET    /v1/transactions/{id}
//! PUT    /v1/transactions/{id}             (commit)
//! DELETE /v1/transactions/{id}             (discard)
//! GET    /v1/sections/{kind}
//! POST   /v1/sections/{kind}
//! GET    /v1/sections/{kind}/{name}        (`_` names an unnamed section)
//! PUT    /v1/sections/{kind}/{name}
//! DELETE /v1/sections/{kind}/{name}
//! GET    /v1/backends/{backend}/servers
//! POST   /v1/backends/{backend}/servers
//! GET    /v1/backends/{backend}/servers/{name}
//! PUT    /v1/backends/{backend}/servers/{name}
//! DELETE /v1/backends/{backend}/servers/{name}
//! ```
//!
//! Every response that refers to a configuration state carries it in the
//! `Configuration-Version` header.
//!
//! Only the read routes run under the request timeout. A mutation runs on a
//! blocking thread that a timeout cannot stop, so answering 408 while the
//! commit still lands would report a failure for a change that was applied.

pub mod auth;
pub mod error;
pub mod handlers;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AdminConfig;
use crate::store::ConfigStore;

use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ConfigStore>,
    pub api_key: Arc<str>,
}

impl AppState {
    pub fn new(store: Arc<ConfigStore>, api_key: &str) -> Self {
        Self {
            store,
            api_key: Arc::from(api_key),
        }
    }
}

/// Read-only routes; safe to abandon on timeout.
fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/status", get(get_status))
        .route("/v1/version", get(get_version))
        .route("/v1/raw", get(get_raw))
        .route("/v1/transactions", get(list_transactions))
        .route("/v1/transactions/{id}", get(get_transaction))
        .route("/v1/sections/{kind}", get(list_sections))
        .route("/v1/sections/{kind}/{name}", get(get_section))
        .route("/v1/backends/{backend}/servers", get(list_servers))
        .route("/v1/backends/{backend}/servers/{name}", get(get_server))
}

/// Routes that open, edit, commit or discard transactions.
fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/raw", post(post_raw))
        .route("/v1/transactions", post(open_transaction))
        .route(
            "/v1/transactions/{id}",
            put(commit_transaction).delete(discard_transaction),
        )
        .route("/v1/sections/{kind}", post(create_section))
        .route(
            "/v1/sections/{kind}/{name}",
            put(replace_section).delete(delete_section),
        )
        .route("/v1/backends/{backend}/servers", post(create_server))
        .route(
            "/v1/backends/{backend}/servers/{name}",
            put(replace_server).delete(delete_server),
        )
}

/// Build the management router with all middleware layers.
#[allow(deprecated)]
pub fn setup_admin_router(state: AppState, config: &AdminConfig) -> Router {
    read_routes()
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .merge(write_routes())
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
