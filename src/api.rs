//! HTTP API over the store.
//!
//! Provides `ApiContext` (shared state) and a router exposing the CRUD
//! surface: boards, columns, items, relationships, links, leads and the
//! tenancy procedures. Every store error is converted into a response;
//! nothing here aborts the process.
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex as TokioMutex;
use tracing::{error, info};

use crate::config::Config;
use crate::error::StoreError;
use crate::store::Store;
use crate::store::models::*;

/// Shared application context available to all handlers.
#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<TokioMutex<Store>>,
    pub config: Arc<Config>,
}

/// Bind and serve until interrupted.
pub async fn serve(ctx: ApiContext) -> Result<()> {
    let addr: SocketAddr = ctx
        .config
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen_addr: {}", ctx.config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {addr}");

    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutting down");
}

pub fn router(ctx: ApiContext) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/boards", get(list_boards).post(create_board))
        .route(
            "/boards/:id",
            get(get_board).patch(patch_board).delete(delete_board),
        )
        .route("/boards/:id/columns", get(list_columns).post(create_column))
        .route("/columns/:id", axum::routing::patch(patch_column).delete(delete_column))
        .route("/boards/:id/items", get(list_items).post(create_item))
        .route("/boards/:id/items/linked", post(create_linked_item))
        .route("/boards/:id/relationships", get(board_relationships))
        .route("/boards/:id/permissions", post(grant_permission))
        .route("/boards/:id/permission", get(check_permission))
        .route("/boards/:id/export", get(export_board_csv))
        .route(
            "/items/:id",
            get(get_item).patch(patch_item).delete(delete_item),
        )
        .route("/items/:id/links", get(item_links))
        .route("/relationships", post(create_relationship))
        .route("/relationships/:id", axum::routing::delete(delete_relationship))
        .route("/links", post(create_link))
        .route("/links/:source_id/:target_id", axum::routing::delete(delete_link))
        .route("/leads", get(list_leads).post(create_lead))
        .route(
            "/leads/:id",
            get(get_lead).patch(patch_lead).delete(delete_lead),
        )
        .route("/leads/:id/convert", post(convert_lead))
        .route("/organizations", post(create_organization))
        .route("/organizations/:id/tenants", post(create_tenant))
        .route("/tenants/:subdomain", get(get_tenant))
        .route("/templates", post(create_template))
        .route("/templates/:id/use", post(use_template))
        .with_state(ctx)
}

// ── Error mapping ────────────────────────────────────────────────────

struct ApiError(StoreError);

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err)
    }
}

fn status_for(err: &StoreError) -> StatusCode {
    match err {
        StoreError::MissingRequired { .. }
        | StoreError::InvalidValue { .. }
        | StoreError::DanglingLinkedBoard(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::LeadAlreadyConverted(_) | StoreError::CardinalityViolation { .. } => {
            StatusCode::CONFLICT
        }
        StoreError::Sqlite(_) | StoreError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = match &self.0 {
            StoreError::MissingRequired { missing } => {
                json!({ "error": self.0.to_string(), "missing": missing })
            }
            err if status == StatusCode::INTERNAL_SERVER_ERROR => {
                error!("Storage error: {err}");
                json!({ "error": "internal storage error" })
            }
            err => json!({ "error": err.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// ── Request bodies ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateBoardBody {
    name: String,
    description: Option<String>,
}

#[derive(Deserialize)]
struct PatchBoardBody {
    name: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct CreateColumnBody {
    name: String,
    column_type: ColumnType,
    #[serde(default)]
    options: ColumnOptions,
    #[serde(default)]
    is_required: bool,
    column_order: Option<i64>,
}

#[derive(Deserialize)]
struct PatchColumnBody {
    name: Option<String>,
    options: Option<ColumnOptions>,
    is_required: Option<bool>,
    column_order: Option<i64>,
}

#[derive(Deserialize)]
struct ItemBody {
    data: DataMap,
}

#[derive(Deserialize)]
struct SeedBody {
    seed_text: String,
}

#[derive(Deserialize)]
struct ItemsQuery {
    q: Option<String>,
}

#[derive(Deserialize)]
struct LinksQuery {
    #[serde(default)]
    direction: LinkDirection,
}

#[derive(Deserialize)]
struct CreateRelationshipBody {
    source_board_id: i64,
    target_board_id: i64,
    relationship_type: RelationshipType,
    source_field_name: String,
    target_field_name: String,
}

#[derive(Deserialize)]
struct CreateLinkBody {
    relationship_id: i64,
    source_item_id: i64,
    target_item_id: i64,
}

#[derive(Deserialize)]
struct CreateLeadBody {
    name: String,
    source: String,
    rating: Option<i64>,
    notes: Option<String>,
}

#[derive(Deserialize)]
struct PatchLeadBody {
    status: Option<LeadStatus>,
    rating: Option<i64>,
    notes: Option<String>,
}

#[derive(Deserialize)]
struct ConvertLeadBody {
    target_board_id: i64,
    #[serde(default)]
    data: DataMap,
}

#[derive(Deserialize)]
struct GrantBody {
    user: String,
    permission: Permission,
}

#[derive(Deserialize)]
struct CheckQuery {
    user: String,
    required: Permission,
}

#[derive(Deserialize)]
struct CreateOrganizationBody {
    name: String,
    subdomain: String,
}

#[derive(Deserialize)]
struct CreateTemplateBody {
    name: String,
}

// ── Handlers ─────────────────────────────────────────────────────────

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn list_boards(State(ctx): State<ApiContext>) -> ApiResult<Json<Vec<Board>>> {
    let store = ctx.store.lock().await;
    Ok(Json(store.list_boards()?))
}

async fn create_board(
    State(ctx): State<ApiContext>,
    Json(body): Json<CreateBoardBody>,
) -> ApiResult<(StatusCode, Json<Board>)> {
    let store = ctx.store.lock().await;
    let board = store.create_board(&body.name, body.description.as_deref())?;
    Ok((StatusCode::CREATED, Json(board)))
}

async fn get_board(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Board>> {
    let store = ctx.store.lock().await;
    Ok(Json(store.get_board(id)?))
}

async fn patch_board(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
    Json(body): Json<PatchBoardBody>,
) -> ApiResult<Json<Board>> {
    let store = ctx.store.lock().await;
    Ok(Json(store.update_board(
        id,
        body.name.as_deref(),
        body.description.as_deref(),
    )?))
}

async fn delete_board(State(ctx): State<ApiContext>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    let store = ctx.store.lock().await;
    if store.delete_board(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StoreError::not_found("board", id).into())
    }
}

async fn list_columns(
    State(ctx): State<ApiContext>,
    Path(board_id): Path<i64>,
) -> ApiResult<Json<Vec<ColumnDef>>> {
    let store = ctx.store.lock().await;
    Ok(Json(store.list_columns(board_id)?))
}

async fn create_column(
    State(ctx): State<ApiContext>,
    Path(board_id): Path<i64>,
    Json(body): Json<CreateColumnBody>,
) -> ApiResult<(StatusCode, Json<ColumnDef>)> {
    let store = ctx.store.lock().await;
    let column = store.create_column(
        board_id,
        &body.name,
        body.column_type,
        body.options,
        body.is_required,
        body.column_order,
    )?;
    Ok((StatusCode::CREATED, Json(column)))
}

async fn patch_column(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
    Json(body): Json<PatchColumnBody>,
) -> ApiResult<Json<ColumnDef>> {
    let store = ctx.store.lock().await;
    Ok(Json(store.update_column(
        id,
        body.name.as_deref(),
        body.options.as_ref(),
        body.is_required,
        body.column_order,
    )?))
}

async fn delete_column(State(ctx): State<ApiContext>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    let store = ctx.store.lock().await;
    if store.delete_column(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StoreError::not_found("column", id).into())
    }
}

/// `GET /boards/:id/items` lists a board; `?q=` switches to substring search,
/// capped at `search_limit` rows.
async fn list_items(
    State(ctx): State<ApiContext>,
    Path(board_id): Path<i64>,
    Query(query): Query<ItemsQuery>,
) -> ApiResult<Json<Vec<Item>>> {
    let store = ctx.store.lock().await;
    let mut items = match query.q {
        Some(q) => store.search_items(board_id, &q)?,
        None => store.list_items(board_id)?,
    };
    items.truncate(ctx.config.search_limit);
    Ok(Json(items))
}

async fn create_item(
    State(ctx): State<ApiContext>,
    Path(board_id): Path<i64>,
    Json(body): Json<ItemBody>,
) -> ApiResult<(StatusCode, Json<Item>)> {
    let store = ctx.store.lock().await;
    let item = store.create_item(board_id, body.data)?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn create_linked_item(
    State(ctx): State<ApiContext>,
    Path(board_id): Path<i64>,
    Json(body): Json<SeedBody>,
) -> ApiResult<(StatusCode, Json<Item>)> {
    let store = ctx.store.lock().await;
    let item = store.create_linked_item(board_id, &body.seed_text)?;
    Ok((StatusCode::CREATED, Json(item)))
}

async fn get_item(State(ctx): State<ApiContext>, Path(id): Path<i64>) -> ApiResult<Json<Item>> {
    let store = ctx.store.lock().await;
    Ok(Json(store.get_item(id)?))
}

async fn patch_item(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
    Json(body): Json<ItemBody>,
) -> ApiResult<Json<Item>> {
    let store = ctx.store.lock().await;
    Ok(Json(store.update_item(id, body.data)?))
}

async fn delete_item(State(ctx): State<ApiContext>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    let store = ctx.store.lock().await;
    if store.delete_item(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StoreError::not_found("item", id).into())
    }
}

async fn item_links(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
    Query(query): Query<LinksQuery>,
) -> ApiResult<Json<Vec<Item>>> {
    let store = ctx.store.lock().await;
    Ok(Json(store.linked_items(id, query.direction)?))
}

async fn board_relationships(
    State(ctx): State<ApiContext>,
    Path(board_id): Path<i64>,
) -> ApiResult<Json<Vec<Relationship>>> {
    let store = ctx.store.lock().await;
    Ok(Json(store.relationships_for_board(board_id)?))
}

async fn create_relationship(
    State(ctx): State<ApiContext>,
    Json(body): Json<CreateRelationshipBody>,
) -> ApiResult<(StatusCode, Json<Relationship>)> {
    let store = ctx.store.lock().await;
    let rel = store.create_relationship(
        body.source_board_id,
        body.target_board_id,
        body.relationship_type,
        &body.source_field_name,
        &body.target_field_name,
    )?;
    Ok((StatusCode::CREATED, Json(rel)))
}

async fn delete_relationship(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    let store = ctx.store.lock().await;
    if store.delete_relationship(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StoreError::not_found("relationship", id).into())
    }
}

async fn create_link(
    State(ctx): State<ApiContext>,
    Json(body): Json<CreateLinkBody>,
) -> ApiResult<(StatusCode, Json<ItemRelationship>)> {
    let store = ctx.store.lock().await;
    let link = store.create_item_relationship(
        body.relationship_id,
        body.source_item_id,
        body.target_item_id,
    )?;
    Ok((StatusCode::CREATED, Json(link)))
}

async fn delete_link(
    State(ctx): State<ApiContext>,
    Path((source_id, target_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    let store = ctx.store.lock().await;
    if store.delete_item_relationship(source_id, target_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StoreError::not_found("link", source_id).into())
    }
}

async fn list_leads(State(ctx): State<ApiContext>) -> ApiResult<Json<Vec<Lead>>> {
    let store = ctx.store.lock().await;
    Ok(Json(store.list_leads()?))
}

async fn create_lead(
    State(ctx): State<ApiContext>,
    Json(body): Json<CreateLeadBody>,
) -> ApiResult<(StatusCode, Json<Lead>)> {
    let store = ctx.store.lock().await;
    let lead = store.create_lead(&body.name, &body.source, body.rating, body.notes.as_deref())?;
    Ok((StatusCode::CREATED, Json(lead)))
}

async fn get_lead(State(ctx): State<ApiContext>, Path(id): Path<i64>) -> ApiResult<Json<Lead>> {
    let store = ctx.store.lock().await;
    Ok(Json(store.get_lead(id)?))
}

async fn patch_lead(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
    Json(body): Json<PatchLeadBody>,
) -> ApiResult<Json<Lead>> {
    let store = ctx.store.lock().await;
    Ok(Json(store.update_lead(id, body.status, body.rating, body.notes.as_deref())?))
}

async fn delete_lead(State(ctx): State<ApiContext>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    let store = ctx.store.lock().await;
    if store.delete_lead(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StoreError::not_found("lead", id).into())
    }
}

async fn convert_lead(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
    Json(body): Json<ConvertLeadBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut store = ctx.store.lock().await;
    let (lead, item) = store.convert_lead(id, body.target_board_id, body.data)?;
    Ok(Json(json!({ "lead": lead, "item": item })))
}

async fn grant_permission(
    State(ctx): State<ApiContext>,
    Path(board_id): Path<i64>,
    Json(body): Json<GrantBody>,
) -> ApiResult<StatusCode> {
    let store = ctx.store.lock().await;
    store.grant_board_permission(board_id, &body.user, body.permission)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn check_permission(
    State(ctx): State<ApiContext>,
    Path(board_id): Path<i64>,
    Query(query): Query<CheckQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let store = ctx.store.lock().await;
    let allowed = store.check_board_permission(board_id, &query.user, query.required)?;
    Ok(Json(json!({ "allowed": allowed })))
}

async fn export_board_csv(
    State(ctx): State<ApiContext>,
    Path(board_id): Path<i64>,
) -> ApiResult<Response> {
    let store = ctx.store.lock().await;
    let mut out = Vec::new();
    if let Err(e) = crate::export::export_board(&store, board_id, &mut out) {
        return match e.downcast::<StoreError>() {
            Ok(store_err) => Err(ApiError(store_err)),
            Err(other) => {
                error!("CSV export failed: {other}");
                Ok((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal storage error" })),
                )
                    .into_response())
            }
        };
    }
    Ok(([("content-type", "text/csv")], out).into_response())
}

async fn create_organization(
    State(ctx): State<ApiContext>,
    Json(body): Json<CreateOrganizationBody>,
) -> ApiResult<(StatusCode, Json<Organization>)> {
    let store = ctx.store.lock().await;
    let org = store.create_organization(&body.name, &body.subdomain)?;
    Ok((StatusCode::CREATED, Json(org)))
}

async fn create_tenant(
    State(ctx): State<ApiContext>,
    Path(organization_id): Path<i64>,
) -> ApiResult<(StatusCode, Json<Tenant>)> {
    let store = ctx.store.lock().await;
    let tenant = store.create_tenant(organization_id)?;
    Ok((StatusCode::CREATED, Json(tenant)))
}

async fn get_tenant(
    State(ctx): State<ApiContext>,
    Path(subdomain): Path<String>,
) -> ApiResult<Json<Tenant>> {
    let store = ctx.store.lock().await;
    store
        .get_tenant_by_subdomain(&subdomain)?
        .map(Json)
        .ok_or_else(|| StoreError::not_found("tenant", 0).into())
}

async fn create_template(
    State(ctx): State<ApiContext>,
    Json(body): Json<CreateTemplateBody>,
) -> ApiResult<(StatusCode, Json<BoardTemplate>)> {
    let store = ctx.store.lock().await;
    let template = store.create_template(&body.name)?;
    Ok((StatusCode::CREATED, Json(template)))
}

async fn use_template(
    State(ctx): State<ApiContext>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let store = ctx.store.lock().await;
    let usage_count = store.increment_template_usage(id)?;
    Ok(Json(json!({ "usage_count": usage_count })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&StoreError::MissingRequired { missing: vec!["Name".into()] }),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&StoreError::not_found("board", 1)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&StoreError::LeadAlreadyConverted(3)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&StoreError::CardinalityViolation {
                relationship_id: 1,
                cardinality: "one_to_one",
                reason: "an endpoint is already linked".into(),
            }),
            StatusCode::CONFLICT
        );
    }
}
