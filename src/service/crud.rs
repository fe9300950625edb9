//! Generic CRUD execution against the per-collection document tables.

use crate::error::AppError;
use crate::model::{Document, Model};
use crate::sql;
use crate::store::qualified_table;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// One decoded envelope row, in `sql::DOC_COLUMNS` order.
type DocRow = (
    Uuid,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
    bool,
    Value,
);

/// Row with the trailing window-function total.
type DocRowWithTotal = (
    Uuid,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
    bool,
    Value,
    i64,
);

fn decode<M: Model>(row: DocRow) -> Result<Document<M>, AppError> {
    let (uid, tenant_id, created_at, updated_at, is_deleted, doc) = row;
    let data: M = serde_json::from_value(doc)?;
    Ok(Document {
        uid,
        tenant_id,
        created_at,
        updated_at,
        is_deleted,
        data,
    })
}

pub struct CrudService;

impl CrudService {
    /// List live documents with exact-match payload filters and the total
    /// matching count. Filter field names are validated before reaching SQL.
    pub async fn list<M: Model>(
        pool: &PgPool,
        filters: &[(String, String)],
        tenant: Option<&str>,
        offset: u32,
        limit: u32,
    ) -> Result<(Vec<Document<M>>, u64), AppError> {
        let fields: Vec<String> = filters
            .iter()
            .map(|(k, _)| sql::check_ident(k).map(str::to_string))
            .collect::<Result<_, _>>()?;
        let table = qualified_table(M::COLLECTION);
        let page_sql = sql::select_page(&table, tenant.is_some(), &fields, offset, limit);
        tracing::debug!(sql = %page_sql, "query");

        let mut q = sqlx::query_as::<_, DocRowWithTotal>(&page_sql);
        if let Some(t) = tenant {
            q = q.bind(t.to_string());
        }
        for (_, v) in filters {
            q = q.bind(v.clone());
        }
        let rows = q.fetch_all(pool).await?;

        let total = match rows.first() {
            Some(row) => row.6 as u64,
            // The window total is unavailable when the page is empty; the
            // offset may simply be past the end, so count separately.
            None => {
                let count_sql = sql::count(&table, tenant.is_some(), &fields);
                tracing::debug!(sql = %count_sql, "query");
                let mut q = sqlx::query_as::<_, (i64,)>(&count_sql);
                if let Some(t) = tenant {
                    q = q.bind(t.to_string());
                }
                for (_, v) in filters {
                    q = q.bind(v.clone());
                }
                q.fetch_one(pool).await?.0 as u64
            }
        };

        let items = rows
            .into_iter()
            .map(|(uid, tenant_id, created_at, updated_at, is_deleted, doc, _)| {
                decode::<M>((uid, tenant_id, created_at, updated_at, is_deleted, doc))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((items, total))
    }

    /// Fetch one document by uid. `None` when absent or soft-deleted (unless
    /// `include_deleted`).
    pub async fn get<M: Model>(
        pool: &PgPool,
        uid: Uuid,
        tenant: Option<&str>,
        include_deleted: bool,
    ) -> Result<Option<Document<M>>, AppError> {
        let table = qualified_table(M::COLLECTION);
        let q_sql = sql::select_by_uid(&table, tenant.is_some(), include_deleted);
        tracing::debug!(sql = %q_sql, %uid, "query");
        let mut q = sqlx::query_as::<_, DocRow>(&q_sql).bind(uid);
        if let Some(t) = tenant {
            q = q.bind(t.to_string());
        }
        let row = q.fetch_optional(pool).await?;
        row.map(decode::<M>).transpose()
    }

    /// Insert a fresh envelope. Returns the stored document.
    pub async fn create<M: Model>(
        pool: &PgPool,
        doc: Document<M>,
    ) -> Result<Document<M>, AppError> {
        let table = qualified_table(M::COLLECTION);
        let q_sql = sql::insert(&table);
        tracing::debug!(sql = %q_sql, uid = %doc.uid, "query");
        let payload = serde_json::to_value(&doc.data)?;
        let row = sqlx::query_as::<_, DocRow>(&q_sql)
            .bind(doc.uid)
            .bind(doc.tenant_id.clone())
            .bind(doc.created_at)
            .bind(doc.updated_at)
            .bind(doc.is_deleted)
            .bind(payload)
            .fetch_one(pool)
            .await?;
        decode::<M>(row)
    }

    /// Shallow-merge a JSON patch into the payload. `None` when the target is
    /// absent or already deleted. The whole patch is a single bound jsonb
    /// parameter; key vetting is the handlers' concern.
    pub async fn update<M: Model>(
        pool: &PgPool,
        uid: Uuid,
        tenant: Option<&str>,
        patch: &serde_json::Map<String, Value>,
    ) -> Result<Option<Document<M>>, AppError> {
        let table = qualified_table(M::COLLECTION);
        let q_sql = sql::update_patch(&table, tenant.is_some());
        tracing::debug!(sql = %q_sql, %uid, "query");
        let mut q = sqlx::query_as::<_, DocRow>(&q_sql)
            .bind(Value::Object(patch.clone()))
            .bind(uid);
        if let Some(t) = tenant {
            q = q.bind(t.to_string());
        }
        let row = q.fetch_optional(pool).await?;
        row.map(decode::<M>).transpose()
    }

    /// Soft delete. Returns the deleted document, or `None` when absent.
    pub async fn delete<M: Model>(
        pool: &PgPool,
        uid: Uuid,
        tenant: Option<&str>,
    ) -> Result<Option<Document<M>>, AppError> {
        let table = qualified_table(M::COLLECTION);
        let q_sql = sql::soft_delete(&table, tenant.is_some());
        tracing::debug!(sql = %q_sql, %uid, "query");
        let mut q = sqlx::query_as::<_, DocRow>(&q_sql).bind(uid);
        if let Some(t) = tenant {
            q = q.bind(t.to_string());
        }
        let row = q.fetch_optional(pool).await?;
        row.map(decode::<M>).transpose()
    }
}

/// Clamp a requested page size into `[1, max]`, defaulting when absent.
pub fn clamp_limit(requested: Option<u32>, default: u32, max: u32) -> u32 {
    requested.unwrap_or(default).clamp(1, max)
}
