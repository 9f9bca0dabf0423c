use axum::{
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::error::ApiError;
use crate::admin::AppState;
use crate::entities::{section, server, Section, Server};
use crate::parser::SectionKind;
use crate::store::{ConfigStore, StoreResult, Target, TxnStatus};

/// Response header carrying the configuration version an answer refers to.
pub const VERSION_HEADER: &str = "configuration-version";

/// Path segment standing for an unnamed section (`global`, anonymous `defaults`).
pub const UNNAMED: &str = "_";

#[derive(Debug, Default, Deserialize)]
pub struct ReadParams {
    pub transaction_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WriteParams {
    pub transaction_id: Option<String>,
    pub version: Option<i64>,
}

impl WriteParams {
    fn target(&self) -> StoreResult<Target> {
        Target::from_params(self.transaction_id.clone(), self.version)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerParams {
    pub transaction_id: Option<String>,
    pub version: Option<i64>,
    /// Section kind holding the servers; defaults to `backend`.
    pub parent_type: Option<SectionKind>,
}

impl ServerParams {
    fn parent(&self) -> SectionKind {
        self.parent_type.unwrap_or(SectionKind::Backend)
    }

    fn target(&self) -> StoreResult<Target> {
        Target::from_params(self.transaction_id.clone(), self.version)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenParams {
    /// Start a fresh transaction only if this version is current.
    pub version: Option<i64>,
    /// Open or resume a transaction with a caller-chosen id.
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<TxnStatus>,
}

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub configuration_version: i64,
    pub open_transactions: usize,
}

#[derive(Serialize)]
pub struct VersionBody {
    pub version: i64,
}

#[derive(Serialize)]
pub struct CommitBody {
    pub id: String,
    pub version: i64,
}

fn section_name(name: &str) -> String {
    if name == UNNAMED {
        String::new()
    } else {
        name.to_string()
    }
}

/// Run a blocking store call off the async executor.
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&ConfigStore) -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(ApiError::from)
}

fn versioned<T: Serialize>(status: StatusCode, version: i64, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(VERSION_HEADER, HeaderValue::from(version));
    response
}

pub async fn get_status(State(state): State<AppState>) -> Result<Json<SystemStatus>, ApiError> {
    let (configuration_version, open_transactions) =
        blocking(&state, |store| Ok((store.version(None)?, store.transactions(None).len()))).await?;
    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        configuration_version,
        open_transactions,
    }))
}

pub async fn get_version(
    State(state): State<AppState>,
    Query(params): Query<ReadParams>,
) -> Result<Response, ApiError> {
    let version = blocking(&state, move |store| store.version(params.transaction_id.as_deref())).await?;
    Ok(versioned(StatusCode::OK, version, VersionBody { version }))
}

pub async fn get_raw(
    State(state): State<AppState>,
    Query(params): Query<ReadParams>,
) -> Result<Response, ApiError> {
    let (version, text) = blocking(&state, move |store| store.raw(params.transaction_id.as_deref())).await?;
    let mut response = (StatusCode::OK, text).into_response();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
        .headers_mut()
        .insert(VERSION_HEADER, HeaderValue::from(version));
    Ok(response)
}

pub async fn post_raw(
    State(state): State<AppState>,
    Query(params): Query<WriteParams>,
    body: String,
) -> Result<Response, ApiError> {
    let target = params.target()?;
    let version = blocking(&state, move |store| store.replace_raw(&target, &body)).await?;
    Ok(versioned(StatusCode::ACCEPTED, version, VersionBody { version }))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, ApiError> {
    let (version, transactions) =
        blocking(&state, move |store| Ok((store.version(None)?, store.transactions(params.status)))).await?;
    Ok(versioned(StatusCode::OK, version, transactions))
}

pub async fn open_transaction(
    State(state): State<AppState>,
    Query(params): Query<OpenParams>,
) -> Result<Response, ApiError> {
    let info = blocking(&state, move |store| match (params.version, params.id.as_deref()) {
        (Some(version), None) => store.start_transaction(version),
        (_, id) => store.open_transaction(id),
    })
    .await?;
    Ok(versioned(StatusCode::CREATED, info.base_version, info))
}

pub async fn get_transaction(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let info = blocking(&state, move |store| store.transaction(&id)).await?;
    Ok(versioned(StatusCode::OK, info.base_version, info))
}

pub async fn commit_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let committed = id.clone();
    let version = blocking(&state, move |store| store.commit(&committed)).await?;
    Ok(versioned(StatusCode::OK, version, CommitBody { id, version }))
}

pub async fn discard_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    blocking(&state, move |store| store.discard(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_sections(
    State(state): State<AppState>,
    Path(kind): Path<SectionKind>,
    Query(params): Query<ReadParams>,
) -> Result<Response, ApiError> {
    let (version, sections) = blocking(&state, move |store| {
        section::list_sections(store, kind, params.transaction_id.as_deref())
    })
    .await?;
    Ok(versioned(StatusCode::OK, version, sections))
}

pub async fn get_section(
    State(state): State<AppState>,
    Path((kind, name)): Path<(SectionKind, String)>,
    Query(params): Query<ReadParams>,
) -> Result<Response, ApiError> {
    let name = section_name(&name);
    let (version, found) = blocking(&state, move |store| {
        section::get_section(store, kind, &name, params.transaction_id.as_deref())
    })
    .await?;
    Ok(versioned(StatusCode::OK, version, found))
}

pub async fn create_section(
    State(state): State<AppState>,
    Path(kind): Path<SectionKind>,
    Query(params): Query<WriteParams>,
    Json(body): Json<Section>,
) -> Result<Response, ApiError> {
    let target = params.target()?;
    let (version, created) =
        blocking(&state, move |store| section::create_section(store, kind, &body, &target)).await?;
    Ok(versioned(StatusCode::CREATED, version, created))
}

pub async fn replace_section(
    State(state): State<AppState>,
    Path((kind, name)): Path<(SectionKind, String)>,
    Query(params): Query<WriteParams>,
    Json(body): Json<Section>,
) -> Result<Response, ApiError> {
    let target = params.target()?;
    let name = section_name(&name);
    let (version, replaced) = blocking(&state, move |store| {
        section::replace_section(store, kind, &name, &body, &target)
    })
    .await?;
    Ok(versioned(StatusCode::OK, version, replaced))
}

pub async fn delete_section(
    State(state): State<AppState>,
    Path((kind, name)): Path<(SectionKind, String)>,
    Query(params): Query<WriteParams>,
) -> Result<Response, ApiError> {
    let target = params.target()?;
    let name = section_name(&name);
    let version = blocking(&state, move |store| section::delete_section(store, kind, &name, &target)).await?;
    let mut response = StatusCode::NO_CONTENT.into_response();
    response
        .headers_mut()
        .insert(VERSION_HEADER, HeaderValue::from(version));
    Ok(response)
}

pub async fn list_servers(
    State(state): State<AppState>,
    Path(backend): Path<String>,
    Query(params): Query<ServerParams>,
) -> Result<Response, ApiError> {
    let (version, servers) = blocking(&state, move |store| {
        server::list_servers(store, params.parent(), &backend, params.transaction_id.as_deref())
    })
    .await?;
    Ok(versioned(StatusCode::OK, version, servers))
}

pub async fn get_server(
    State(state): State<AppState>,
    Path((backend, name)): Path<(String, String)>,
    Query(params): Query<ServerParams>,
) -> Result<Response, ApiError> {
    let (version, found) = blocking(&state, move |store| {
        server::get_server(store, params.parent(), &backend, &name, params.transaction_id.as_deref())
    })
    .await?;
    Ok(versioned(StatusCode::OK, version, found))
}

pub async fn create_server(
    State(state): State<AppState>,
    Path(backend): Path<String>,
    Query(params): Query<ServerParams>,
    Json(body): Json<Server>,
) -> Result<Response, ApiError> {
    let target = params.target()?;
    let (version, created) = blocking(&state, move |store| {
        server::create_server(store, params.parent(), &backend, &body, &target)
    })
    .await?;
    Ok(versioned(StatusCode::CREATED, version, created))
}

pub async fn replace_server(
    State(state): State<AppState>,
    Path((backend, name)): Path<(String, String)>,
    Query(params): Query<ServerParams>,
    Json(body): Json<Server>,
) -> Result<Response, ApiError> {
    let target = params.target()?;
    let (version, replaced) = blocking(&state, move |store| {
        server::replace_server(store, params.parent(), &backend, &name, &body, &target)
    })
    .await?;
    Ok(versioned(StatusCode::OK, version, replaced))
}

pub async fn delete_server(
    State(state): State<AppState>,
    Path((backend, name)): Path<(String, String)>,
    Query(params): Query<ServerParams>,
) -> Result<Response, ApiError> {
    let target = params.target()?;
    let version = blocking(&state, move |store| {
        server::delete_server(store, params.parent(), &backend, &name, &target)
    })
    .await?;
    let mut response = StatusCode::NO_CONTENT.into_response();
    response
        .headers_mut()
        .insert(VERSION_HEADER, HeaderValue::from(version));
    Ok(response)
}
