//! SQL text for the per-collection document tables. Values are always bound
//! parameters; identifiers are validated and quoted before splicing.

use crate::error::ConfigError;

/// Envelope columns of every collection table, in bind/decode order.
pub const DOC_COLUMNS: &str = "uid, tenant_id, created_at, updated_at, is_deleted, doc";

/// True when `s` can be safely used as an identifier or JSON field name:
/// starts with a letter or underscore, rest letters/digits/underscores.
pub fn is_safe_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn check_ident(s: &str) -> Result<&str, ConfigError> {
    if is_safe_ident(s) {
        Ok(s)
    } else {
        Err(ConfigError::InvalidIdentifier(s.to_string()))
    }
}

/// Quote identifier for PostgreSQL. Embedded quotes are doubled.
pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Schema-qualified collection table name.
pub fn qualified_collection(schema: &str, collection: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(collection))
}

/// Exact-match filter on a payload field. Field name must already be checked.
fn field_clause(field: &str, param: usize) -> String {
    format!("doc ->> '{}' = ${}", field, param)
}

fn where_clause(tenant: bool, fields: &[String], mut next_param: usize) -> String {
    let mut conds = vec!["is_deleted = FALSE".to_string()];
    if tenant {
        conds.push(format!("tenant_id = ${}", next_param));
        next_param += 1;
    }
    for f in fields {
        conds.push(field_clause(f, next_param));
        next_param += 1;
    }
    conds.join(" AND ")
}

/// Page query. Binds: tenant id first (when scoped), then field filter values
/// in order. The trailing `total` column is the filtered count via a window.
pub fn select_page(table: &str, tenant: bool, fields: &[String], offset: u32, limit: u32) -> String {
    format!(
        "SELECT {}, COUNT(*) OVER () AS total FROM {} WHERE {} ORDER BY created_at DESC, uid OFFSET {} LIMIT {}",
        DOC_COLUMNS,
        table,
        where_clause(tenant, fields, 1),
        offset,
        limit
    )
}

/// Count of matching documents. Same bind order as [`select_page`].
pub fn count(table: &str, tenant: bool, fields: &[String]) -> String {
    format!(
        "SELECT COUNT(*) FROM {} WHERE {}",
        table,
        where_clause(tenant, fields, 1)
    )
}

/// Fetch by uid. Binds: $1 uid, $2 tenant id (when scoped).
pub fn select_by_uid(table: &str, tenant: bool, include_deleted: bool) -> String {
    let mut sql = format!("SELECT {} FROM {} WHERE uid = $1", DOC_COLUMNS, table);
    if tenant {
        sql.push_str(" AND tenant_id = $2");
    }
    if !include_deleted {
        sql.push_str(" AND is_deleted = FALSE");
    }
    sql
}

/// Insert a full envelope. Binds: $1 uid, $2 tenant_id, $3 created_at,
/// $4 updated_at, $5 is_deleted, $6 doc.
pub fn insert(table: &str) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
        table, DOC_COLUMNS, DOC_COLUMNS
    )
}

/// Shallow-merge a JSON patch into the payload and bump updated_at.
/// Binds: $1 patch (jsonb), $2 uid, $3 tenant id (when scoped).
pub fn update_patch(table: &str, tenant: bool) -> String {
    let mut sql = format!(
        "UPDATE {} SET doc = doc || $1, updated_at = NOW() WHERE uid = $2 AND is_deleted = FALSE",
        table
    );
    if tenant {
        sql.push_str(" AND tenant_id = $3");
    }
    sql.push_str(&format!(" RETURNING {}", DOC_COLUMNS));
    sql
}

/// Soft delete. Binds: $1 uid, $2 tenant id (when scoped).
pub fn soft_delete(table: &str, tenant: bool) -> String {
    let mut sql = format!(
        "UPDATE {} SET is_deleted = TRUE, updated_at = NOW() WHERE uid = $1 AND is_deleted = FALSE",
        table
    );
    if tenant {
        sql.push_str(" AND tenant_id = $2");
    }
    sql.push_str(&format!(" RETURNING {}", DOC_COLUMNS));
    sql
}
