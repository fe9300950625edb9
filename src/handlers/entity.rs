//! Generated CRUD handlers: list, get, create, update, delete.

use crate::error::AppError;
use crate::extractors::TenantId;
use crate::model::{Document, Model};
use crate::response::PaginatedResponse;
use crate::routes::crud::CrudContext;
use crate::service::{clamp_limit, CrudService, RequestValidator};
use crate::settings::Settings;
use crate::sql::is_safe_ident;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_LIMIT: u32 = 10;

/// "widgets" -> "Widgets not found".
pub(crate) fn not_found(collection: &str) -> AppError {
    let mut name = collection.to_string();
    if let Some(first) = name.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    AppError::NotFound(format!("{} not found", name))
}

pub(crate) fn object_body(value: Value) -> Result<serde_json::Map<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

/// Patch bodies may only touch plainly-named fields; anything else is a bad
/// request, not a server error.
pub(crate) fn check_patch_keys(patch: &serde_json::Map<String, Value>) -> Result<(), AppError> {
    for k in patch.keys() {
        if !is_safe_ident(k) {
            return Err(AppError::BadRequest(format!("invalid field: {}", k)));
        }
    }
    Ok(())
}

/// Split query params into pagination and exact-match payload filters.
/// Unknown keys become filters; unsafe field names are rejected up front.
pub(crate) fn parse_page_params(
    params: HashMap<String, String>,
    settings: &Settings,
) -> Result<(Vec<(String, String)>, u32, u32), AppError> {
    let mut limit: Option<u32> = None;
    let mut offset: u32 = 0;
    let mut filters: Vec<(String, String)> = Vec::new();
    for (k, v) in params {
        match k.as_str() {
            "limit" => {
                limit = v.parse().ok();
            }
            "offset" => {
                offset = v.parse().unwrap_or(0);
            }
            _ => {
                if !is_safe_ident(&k) {
                    return Err(AppError::BadRequest(format!("invalid filter field: {}", k)));
                }
                filters.push((k, v));
            }
        }
    }
    filters.sort_by(|a, b| a.0.cmp(&b.0));
    let limit = clamp_limit(limit, DEFAULT_LIMIT, settings.page_max_limit);
    Ok((filters, offset, limit))
}

pub async fn list<M: Model>(
    State(state): State<AppState>,
    TenantId(tenant): TenantId,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<PaginatedResponse<Document<M>>>, AppError> {
    let (filters, offset, limit) = parse_page_params(params, &state.settings)?;
    let (items, total) =
        CrudService::list::<M>(&state.pool, &filters, tenant.as_deref(), offset, limit).await?;
    Ok(Json(PaginatedResponse::new(items, total, offset, limit)))
}

pub async fn get_one<M: Model>(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<CrudContext>>,
    TenantId(tenant): TenantId,
    Path(uid): Path<Uuid>,
) -> Result<Json<Document<M>>, AppError> {
    let doc = CrudService::get::<M>(&state.pool, uid, tenant.as_deref(), false)
        .await?
        .ok_or_else(|| not_found(ctx.collection))?;
    Ok(Json(doc))
}

pub async fn create<M: Model>(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<CrudContext>>,
    TenantId(tenant): TenantId,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Document<M>>), AppError> {
    let body = object_body(body)?;
    RequestValidator::validate(&body, &ctx.validation)?;
    let data: M = serde_json::from_value(Value::Object(body))
        .map_err(|e| AppError::Validation(format!("invalid {} payload: {}", ctx.collection, e)))?;
    let doc = CrudService::create(&state.pool, Document::new(data, tenant)).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

pub async fn update<M: Model>(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<CrudContext>>,
    TenantId(tenant): TenantId,
    Path(uid): Path<Uuid>,
    Json(body): Json<Value>,
) -> Result<Json<Document<M>>, AppError> {
    let patch = object_body(body)?;
    check_patch_keys(&patch)?;
    RequestValidator::validate_partial(&patch, &ctx.validation)?;
    let doc = CrudService::update::<M>(&state.pool, uid, tenant.as_deref(), &patch)
        .await?
        .ok_or_else(|| not_found(ctx.collection))?;
    Ok(Json(doc))
}

pub async fn delete<M: Model>(
    State(state): State<AppState>,
    Extension(ctx): Extension<Arc<CrudContext>>,
    TenantId(tenant): TenantId,
    Path(uid): Path<Uuid>,
) -> Result<Json<Document<M>>, AppError> {
    let doc = CrudService::delete::<M>(&state.pool, uid, tenant.as_deref())
        .await?
        .ok_or_else(|| not_found(ctx.collection))?;
    Ok(Json(doc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_params_split_and_clamp() {
        let settings = Settings::default();
        let mut params = HashMap::new();
        params.insert("limit".to_string(), "500".to_string());
        params.insert("offset".to_string(), "20".to_string());
        params.insert("name".to_string(), "anvil".to_string());
        let (filters, offset, limit) = parse_page_params(params, &settings).unwrap();
        assert_eq!(filters, vec![("name".to_string(), "anvil".to_string())]);
        assert_eq!(offset, 20);
        assert_eq!(limit, settings.page_max_limit);
    }

    #[test]
    fn page_params_reject_unsafe_filter_names() {
        let settings = Settings::default();
        let mut params = HashMap::new();
        params.insert("name'; --".to_string(), "x".to_string());
        assert!(matches!(
            parse_page_params(params, &settings),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn patch_keys_must_be_safe_idents() {
        let ok: serde_json::Map<String, Value> =
            serde_json::from_str(r#"{"name": "anvil", "price": 2}"#).unwrap();
        assert!(check_patch_keys(&ok).is_ok());
        let bad: serde_json::Map<String, Value> =
            serde_json::from_str(r#"{"bad-name": 1}"#).unwrap();
        assert!(matches!(
            check_patch_keys(&bad),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn not_found_capitalizes_collection() {
        let err = not_found("widgets");
        assert_eq!(err.to_string(), "not found: Widgets not found");
    }
}
