use std::time::Duration;

use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use cohort_core::cluster::{MemberId, MemberInfo, MemberRole, MemberStatus};
use cohort_core::error::{CohortError, Result};

const MEMBER_COLUMNS: &str =
    "id, hostname, pid, role, services, status, started_at, last_heartbeat";

/// Member registry for one cluster, backed by the `cohort_members` table.
pub struct MemberRegistry {
    pool: sqlx::PgPool,
    cluster: String,
    local_member: MemberInfo,
}

impl MemberRegistry {
    /// Create a new member registry.
    pub fn new(pool: sqlx::PgPool, cluster: impl Into<String>, local_member: MemberInfo) -> Self {
        Self {
            pool,
            cluster: cluster.into(),
            local_member,
        }
    }

    /// Get the local member info.
    pub fn local_member(&self) -> &MemberInfo {
        &self.local_member
    }

    /// Get the local member ID.
    pub fn local_id(&self) -> MemberId {
        self.local_member.id
    }

    /// Register the local member.
    pub async fn register(&self) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cohort_members (
                id, cluster, hostname, pid, role, services, status, started_at, last_heartbeat
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
            ON CONFLICT (id) DO UPDATE SET
                services = EXCLUDED.services,
                status = EXCLUDED.status,
                last_heartbeat = NOW()
            "#,
        )
        .bind(self.local_member.id.as_uuid())
        .bind(&self.cluster)
        .bind(&self.local_member.hostname)
        .bind(self.local_member.pid as i32)
        .bind(self.local_member.role.as_str())
        .bind(&self.local_member.services)
        .bind(self.local_member.status.as_str())
        .bind(self.local_member.started_at)
        .execute(&self.pool)
        .await
        .map_err(|e| CohortError::Database(e.to_string()))?;

        Ok(())
    }

    /// Update the local member's status.
    pub async fn set_status(&self, status: MemberStatus) -> Result<()> {
        sqlx::query("UPDATE cohort_members SET status = $2 WHERE id = $1")
            .bind(self.local_member.id.as_uuid())
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| CohortError::Database(e.to_string()))?;

        Ok(())
    }

    /// Remove the local member.
    pub async fn deregister(&self) -> Result<()> {
        sqlx::query("DELETE FROM cohort_members WHERE id = $1")
            .bind(self.local_member.id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| CohortError::Database(e.to_string()))?;

        Ok(())
    }

    /// Active members with a heartbeat newer than `dead_threshold`.
    pub async fn live_members(&self, dead_threshold: Duration) -> Result<Vec<MemberInfo>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM cohort_members
            WHERE cluster = $1
              AND status = 'active'
              AND last_heartbeat > NOW() - make_interval(secs => $2)
            ORDER BY started_at
            "#,
            MEMBER_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(&self.cluster)
            .bind(dead_threshold.as_secs_f64())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CohortError::Database(e.to_string()))?;

        Ok(rows.iter().map(member_from_row).collect())
    }

    /// IDs of live members advertising `service`.
    pub async fn members_running(
        &self,
        service: &str,
        dead_threshold: Duration,
    ) -> Result<Vec<MemberId>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id
            FROM cohort_members
            WHERE cluster = $1
              AND status = 'active'
              AND last_heartbeat > NOW() - make_interval(secs => $2)
              AND $3 = ANY(services)
            ORDER BY started_at
            "#,
        )
        .bind(&self.cluster)
        .bind(dead_threshold.as_secs_f64())
        .bind(service)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CohortError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(|(id,)| MemberId::from_uuid(id)).collect())
    }

    /// Delete rows of members that stopped heartbeating long ago.
    pub async fn purge_expired(&self, older_than: Duration) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM cohort_members
            WHERE cluster = $1
              AND last_heartbeat < NOW() - make_interval(secs => $2)
            "#,
        )
        .bind(&self.cluster)
        .bind(older_than.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(|e| CohortError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

fn member_from_row(row: &PgRow) -> MemberInfo {
    let id: Uuid = row.get("id");
    let role: String = row.get("role");
    let status: String = row.get("status");

    MemberInfo {
        id: MemberId::from_uuid(id),
        hostname: row.get("hostname"),
        pid: row.get::<i32, _>("pid") as u32,
        role: MemberRole::from_str(&role).unwrap_or(MemberRole::Member),
        services: row.get("services"),
        status: MemberStatus::from_str(&status),
        started_at: row.get("started_at"),
        last_heartbeat: row.get("last_heartbeat"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_exposes_local_member() {
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/test").unwrap();
        let local = MemberInfo::new_local("host".to_string(), MemberRole::Control, vec![]);
        let id = local.id;
        let registry = MemberRegistry::new(pool, "default", local);

        assert_eq!(registry.local_id(), id);
        assert_eq!(registry.local_member().role, MemberRole::Control);
    }
}
