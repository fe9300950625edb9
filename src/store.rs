//! Collection table DDL and database bootstrap. All tables live in a schema
//! named from `DOCBASE_SCHEMA` env (default `docbase`).

use crate::error::AppError;
use crate::sql::{check_ident, qualified_collection, quoted};
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;

/// Schema name for collection and KV tables. From env `DOCBASE_SCHEMA`,
/// default `docbase`. Must be a valid PostgreSQL identifier.
pub fn docbase_schema() -> String {
    std::env::var("DOCBASE_SCHEMA").unwrap_or_else(|_| "docbase".into())
}

/// Schema-qualified table name for a collection.
pub fn qualified_table(collection: &str) -> String {
    qualified_collection(&docbase_schema(), collection)
}

/// Shared KV table; rows without a tenant use this marker.
pub const KV_TABLE: &str = "_kv_data";
pub const SHARED_TENANT: &str = "_shared";

async fn ensure_schema(pool: &PgPool) -> Result<(), AppError> {
    let schema = docbase_schema();
    check_ident(&schema)?;
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))
        .execute(pool)
        .await?;
    Ok(())
}

/// Create the backing table for a collection if it does not exist, plus an
/// index for tenant-scoped listing. Idempotent.
pub async fn ensure_collection_table(pool: &PgPool, collection: &str) -> Result<(), AppError> {
    check_ident(collection)?;
    ensure_schema(pool).await?;
    let q_table = qualified_table(collection);
    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            uid UUID PRIMARY KEY,
            tenant_id TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
            doc JSONB NOT NULL
        )
        "#,
        q_table
    );
    sqlx::query(&ddl).execute(pool).await?;
    let idx = format!(
        "CREATE INDEX IF NOT EXISTS {}_tenant_live_idx ON {} (tenant_id, is_deleted, created_at)",
        collection, q_table
    );
    sqlx::query(&idx).execute(pool).await?;
    tracing::info!(collection, "collection table ready");
    Ok(())
}

/// Create the shared KV table if it does not exist. Idempotent.
pub async fn ensure_kv_table(pool: &PgPool) -> Result<(), AppError> {
    ensure_schema(pool).await?;
    let q_table = qualified_table(KV_TABLE);
    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            tenant_id TEXT NOT NULL DEFAULT '{}',
            namespace TEXT NOT NULL,
            key TEXT NOT NULL,
            value JSONB NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (tenant_id, namespace, key)
        )
        "#,
        q_table, SHARED_TENANT
    );
    sqlx::query(&ddl).execute(pool).await?;
    Ok(())
}

/// Ensure the database in `database_url` exists; create it if not. Connects
/// to the default `postgres` database to run CREATE DATABASE. Call before
/// creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await.map_err(AppError::Db)?;
    let exists: (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(&db_name)
            .fetch_one(&mut conn)
            .await
            .map_err(AppError::Db)?;
    if !exists.0 {
        sqlx::query(&format!("CREATE DATABASE {}", quoted(&db_name)))
            .execute(&mut conn)
            .await
            .map_err(AppError::Db)?;
        tracing::info!(db = %db_name, "database created");
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| AppError::BadRequest("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = format!("{}postgres", base);
    Ok((admin_url, db_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_name_parsing() {
        let (admin, name) = parse_db_name_from_url("postgres://localhost:5432/widgets").unwrap();
        assert_eq!(admin, "postgres://localhost:5432/postgres");
        assert_eq!(name, "widgets");

        let (_, name) = parse_db_name_from_url("postgres://u:p@host/db?sslmode=disable").unwrap();
        assert_eq!(name, "db");
    }

    #[test]
    fn qualified_table_uses_schema() {
        std::env::remove_var("DOCBASE_SCHEMA");
        assert_eq!(qualified_table("widgets"), "\"docbase\".\"widgets\"");
    }
}
