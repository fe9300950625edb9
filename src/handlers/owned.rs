//! Handlers for ownership-authorized routes. Each resolves claims through the
//! router's authenticator, then applies owner-or-scope authorization before
//! touching the store.

use crate::auth::{authorize, list_scope, resource_path, ListScope};
use crate::error::AppError;
use crate::extractors::TenantId;
use crate::handlers::entity::{check_patch_keys, not_found, object_body, parse_page_params};
use crate::model::{Document, Model};
use crate::response::PaginatedResponse;
use crate::routes::owned::{Authenticated, OwnedContext};
use crate::service::{CrudService, RequestValidator};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Owner field value of a stored document, read from the serialized payload.
fn owner_field_value<M: Model>(doc: &Document<M>, field: &str) -> Result<Option<String>, AppError> {
    let payload = serde_json::to_value(&doc.data)?;
    Ok(payload
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string))
}

pub async fn list<M: Model>(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<OwnedContext>>,
    Authenticated(claims): Authenticated,
    TenantId(header_tenant): TenantId,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<PaginatedResponse<Document<M>>>, AppError> {
    let tenant = claims.tenant_id.clone().or(header_tenant);
    let resource = resource_path(&state.settings, ctx.resource());
    let (mut filters, offset, limit) = parse_page_params(params, &state.settings)?;
    match list_scope(&claims, &resource, ctx.owner_attr, ctx.options.self_access)? {
        ListScope::All => {}
        ListScope::Owner(owner) => filters.push((ctx.owner_attr.field().to_string(), owner)),
    }
    let (items, total) =
        CrudService::list::<M>(&state.pool, &filters, tenant.as_deref(), offset, limit).await?;
    Ok(Json(PaginatedResponse::new(items, total, offset, limit)))
}

pub async fn get_one<M: Model>(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<OwnedContext>>,
    Authenticated(claims): Authenticated,
    TenantId(header_tenant): TenantId,
    Path(uid): Path<Uuid>,
) -> Result<Json<Document<M>>, AppError> {
    let tenant = claims.tenant_id.clone().or(header_tenant);
    let resource = resource_path(&state.settings, ctx.resource());
    let doc = CrudService::get::<M>(&state.pool, uid, tenant.as_deref(), false)
        .await?
        .ok_or_else(|| not_found(ctx.collection))?;
    let owner = owner_field_value(&doc, ctx.owner_attr.field())?;
    authorize(&claims, "read", &resource, ctx.owner_attr, owner.as_deref())?;
    Ok(Json(doc))
}

pub async fn create<M: Model>(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<OwnedContext>>,
    Authenticated(claims): Authenticated,
    TenantId(header_tenant): TenantId,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Document<M>>), AppError> {
    let tenant = claims.tenant_id.clone().or(header_tenant);
    let resource = resource_path(&state.settings, ctx.resource());
    let mut body = object_body(body)?;
    RequestValidator::validate(&body, &ctx.validation)?;
    // Creating for yourself is always self-owned; naming another owner in the
    // body requires a create scope.
    let own = ctx.owner_attr.owner_id(&claims);
    let owner_value = body
        .get(ctx.owner_attr.field())
        .and_then(|v| v.as_str())
        .unwrap_or(&own)
        .to_string();
    authorize(&claims, "create", &resource, ctx.owner_attr, Some(&owner_value))?;
    body.insert(
        ctx.owner_attr.field().to_string(),
        Value::String(owner_value),
    );
    let data: M = serde_json::from_value(Value::Object(body))
        .map_err(|e| AppError::Validation(format!("invalid {} payload: {}", ctx.collection, e)))?;
    let doc = CrudService::create(&state.pool, Document::new(data, tenant)).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

pub async fn update<M: Model>(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<OwnedContext>>,
    Authenticated(claims): Authenticated,
    TenantId(header_tenant): TenantId,
    Path(uid): Path<Uuid>,
    Json(body): Json<Value>,
) -> Result<Json<Document<M>>, AppError> {
    let tenant = claims.tenant_id.clone().or(header_tenant);
    let resource = resource_path(&state.settings, ctx.resource());
    let patch = object_body(body)?;
    check_patch_keys(&patch)?;
    RequestValidator::validate_partial(&patch, &ctx.validation)?;
    let current = CrudService::get::<M>(&state.pool, uid, tenant.as_deref(), false)
        .await?
        .ok_or_else(|| not_found(ctx.collection))?;
    let owner = owner_field_value(&current, ctx.owner_attr.field())?;
    authorize(&claims, "update", &resource, ctx.owner_attr, owner.as_deref())?;
    let doc = CrudService::update::<M>(&state.pool, uid, tenant.as_deref(), &patch)
        .await?
        .ok_or_else(|| not_found(ctx.collection))?;
    Ok(Json(doc))
}

pub async fn delete<M: Model>(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<OwnedContext>>,
    Authenticated(claims): Authenticated,
    TenantId(header_tenant): TenantId,
    Path(uid): Path<Uuid>,
) -> Result<Json<Document<M>>, AppError> {
    let tenant = claims.tenant_id.clone().or(header_tenant);
    let resource = resource_path(&state.settings, ctx.resource());
    let current = CrudService::get::<M>(&state.pool, uid, tenant.as_deref(), false)
        .await?
        .ok_or_else(|| not_found(ctx.collection))?;
    let owner = owner_field_value(&current, ctx.owner_attr.field())?;
    authorize(&claims, "delete", &resource, ctx.owner_attr, owner.as_deref())?;
    let doc = CrudService::delete::<M>(&state.pool, uid, tenant.as_deref())
        .await?
        .ok_or_else(|| not_found(ctx.collection))?;
    Ok(Json(doc))
}

/// GET /mine: the caller's own documents. With `create_mine_if_missing`, an
/// empty owned document is created when none exists; with `unique_per_user`,
/// the single document is returned instead of a page.
pub async fn mine<M: Model>(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<OwnedContext>>,
    Authenticated(claims): Authenticated,
    TenantId(header_tenant): TenantId,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let tenant = claims.tenant_id.clone().or(header_tenant);
    let owner = ctx.owner_attr.owner_id(&claims);
    let (mut filters, offset, limit) = parse_page_params(params, &state.settings)?;
    filters.push((ctx.owner_attr.field().to_string(), owner.clone()));
    let (mut items, mut total) =
        CrudService::list::<M>(&state.pool, &filters, tenant.as_deref(), offset, limit).await?;
    if total == 0 && ctx.options.create_mine_if_missing {
        let mut seed = serde_json::Map::new();
        seed.insert(ctx.owner_attr.field().to_string(), Value::String(owner));
        let data: M = serde_json::from_value(Value::Object(seed)).map_err(|e| {
            AppError::Validation(format!(
                "cannot create default {}: {}",
                ctx.collection, e
            ))
        })?;
        let doc = CrudService::create(&state.pool, Document::new(data, tenant)).await?;
        items = vec![doc];
        total = 1;
    }
    if ctx.options.unique_per_user {
        let doc = items
            .into_iter()
            .next()
            .ok_or_else(|| not_found(ctx.collection))?;
        return Ok(Json(doc).into_response());
    }
    Ok(Json(PaginatedResponse::new(items, total, offset, limit)).into_response())
}
