//! Membership schema, applied idempotently by every process that joins.

use sqlx::PgPool;
use tracing::debug;

use cohort_core::error::{CohortError, Result};

/// Schema for the membership registry.
pub const SCHEMA_SQL: &str = include_str!("../../migrations/0000_cohort_members.sql");

/// Advisory lock serializing schema setup across concurrently joining members.
/// "COHORT" in ASCII.
const SCHEMA_LOCK_ID: i64 = 0x434F_484F_5254;

/// Create the membership tables if they do not exist yet.
///
/// The lock and the statements share one connection, since advisory locks
/// are held per session.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    let mut conn = pool
        .acquire()
        .await
        .map_err(|e| CohortError::Database(format!("Failed to acquire connection: {}", e)))?;

    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(SCHEMA_LOCK_ID)
        .execute(&mut *conn)
        .await
        .map_err(|e| CohortError::Database(format!("Failed to acquire schema lock: {}", e)))?;

    let mut result = Ok(());
    for statement in statements(SCHEMA_SQL) {
        if let Err(e) = sqlx::query(&statement).execute(&mut *conn).await {
            result = Err(CohortError::Database(format!(
                "Failed to apply schema: {}",
                e
            )));
            break;
        }
    }

    if let Err(e) = sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(SCHEMA_LOCK_ID)
        .execute(&mut *conn)
        .await
    {
        tracing::warn!("Failed to release schema lock: {}", e);
    }

    if result.is_ok() {
        debug!("Membership schema ready");
    }
    result
}

/// Split the schema into executable statements, dropping comment-only chunks.
fn statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(|chunk| {
            chunk
                .lines()
                .filter(|l| !l.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .filter(|s| !s.is_empty())
        .collect()
}
