//! Namespace-scoped key/value hashes with field-level access and event
//! publish. Backed by the shared `_kv_data` table; `publish` uses
//! `pg_notify` so listeners can subscribe with `LISTEN` on the derived
//! channel names.

use crate::error::AppError;
use crate::store::{qualified_table, KV_TABLE, SHARED_TENANT};
use serde_json::Value;
use sqlx::PgPool;

/// Entry key / notify channel: `[tenant:]namespace[:key]`.
pub fn entry_key(namespace: &str, tenant: Option<&str>, key: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(t) = tenant {
        out.push_str(t);
        out.push(':');
    }
    out.push_str(namespace);
    if let Some(k) = key {
        out.push(':');
        out.push_str(k);
    }
    out
}

#[derive(Clone)]
pub struct KvStore {
    pool: PgPool,
    namespace: String,
}

impl KvStore {
    pub fn new(pool: PgPool, namespace: impl Into<String>) -> Self {
        KvStore {
            pool,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn tenant_column(tenant: Option<&str>) -> String {
        tenant.unwrap_or(SHARED_TENANT).to_string()
    }

    /// Upsert the whole value for a key.
    pub async fn put(&self, tenant: Option<&str>, key: &str, value: &Value) -> Result<(), AppError> {
        let q_table = qualified_table(KV_TABLE);
        let sql = format!(
            "INSERT INTO {} (tenant_id, namespace, key, value, updated_at) VALUES ($1, $2, $3, $4, NOW()) \
             ON CONFLICT (tenant_id, namespace, key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()",
            q_table
        );
        sqlx::query(&sql)
            .bind(Self::tenant_column(tenant))
            .bind(&self.namespace)
            .bind(key)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get(&self, tenant: Option<&str>, key: &str) -> Result<Option<Value>, AppError> {
        let q_table = qualified_table(KV_TABLE);
        let sql = format!(
            "SELECT value FROM {} WHERE tenant_id = $1 AND namespace = $2 AND key = $3",
            q_table
        );
        let row: Option<(Value,)> = sqlx::query_as(&sql)
            .bind(Self::tenant_column(tenant))
            .bind(&self.namespace)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(v,)| v))
    }

    /// Remove a key. Returns whether it existed.
    pub async fn delete(&self, tenant: Option<&str>, key: &str) -> Result<bool, AppError> {
        let q_table = qualified_table(KV_TABLE);
        let sql = format!(
            "DELETE FROM {} WHERE tenant_id = $1 AND namespace = $2 AND key = $3",
            q_table
        );
        let done = sqlx::query(&sql)
            .bind(Self::tenant_column(tenant))
            .bind(&self.namespace)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    /// Set one field of the hash stored at key, creating the entry when
    /// missing.
    pub async fn set_field(
        &self,
        tenant: Option<&str>,
        key: &str,
        field: &str,
        value: &Value,
    ) -> Result<(), AppError> {
        let q_table = qualified_table(KV_TABLE);
        let sql = format!(
            "INSERT INTO {} AS kv (tenant_id, namespace, key, value, updated_at) \
             VALUES ($1, $2, $3, jsonb_build_object($4::text, $5::jsonb), NOW()) \
             ON CONFLICT (tenant_id, namespace, key) \
             DO UPDATE SET value = kv.value || EXCLUDED.value, updated_at = NOW()",
            q_table
        );
        sqlx::query(&sql)
            .bind(Self::tenant_column(tenant))
            .bind(&self.namespace)
            .bind(key)
            .bind(field)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Read one field of the hash stored at key.
    pub async fn get_field(
        &self,
        tenant: Option<&str>,
        key: &str,
        field: &str,
    ) -> Result<Option<Value>, AppError> {
        let q_table = qualified_table(KV_TABLE);
        let sql = format!(
            "SELECT value -> $4 FROM {} WHERE tenant_id = $1 AND namespace = $2 AND key = $3",
            q_table
        );
        let row: Option<(Option<Value>,)> = sqlx::query_as(&sql)
            .bind(Self::tenant_column(tenant))
            .bind(&self.namespace)
            .bind(key)
            .bind(field)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|(v,)| v))
    }

    pub async fn list_keys(&self, tenant: Option<&str>) -> Result<Vec<String>, AppError> {
        let q_table = qualified_table(KV_TABLE);
        let sql = format!(
            "SELECT key FROM {} WHERE tenant_id = $1 AND namespace = $2 ORDER BY key",
            q_table
        );
        let rows: Vec<(String,)> = sqlx::query_as(&sql)
            .bind(Self::tenant_column(tenant))
            .bind(&self.namespace)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(k,)| k).collect())
    }

    /// Publish a payload on the channel derived from namespace/tenant/key.
    pub async fn publish(
        &self,
        tenant: Option<&str>,
        key: Option<&str>,
        payload: &Value,
    ) -> Result<(), AppError> {
        let channel = entry_key(&self.namespace, tenant, key);
        let body = serde_json::to_string(payload)?;
        tracing::debug!(%channel, "publish");
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(channel)
            .bind(body)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
