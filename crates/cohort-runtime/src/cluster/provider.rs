use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use uuid::Uuid;

use cohort_core::cluster::{
    ClusterProvider, Invocation, MemberId, MemberInfo, MemberRole, MemberStatus, RemoteCommand,
    ServiceHandle,
};
use cohort_core::config::ClusterConfig;
use cohort_core::error::{CohortError, Result};

use super::heartbeat::HeartbeatLoop;
use super::registry::MemberRegistry;
use crate::db::{ensure_schema, Database};

/// PostgreSQL NOTIFY payloads must be shorter than 8000 bytes.
pub const MAX_NOTIFY_PAYLOAD: usize = 7999;

/// Rows that stopped heartbeating this many dead-thresholds ago are purged on join.
const PURGE_FACTOR: u32 = 4;

/// Cluster provider backed by a shared PostgreSQL database.
///
/// Joining registers the local process as a member and keeps it alive with a
/// heartbeat. Broadcasts travel over `LISTEN/NOTIFY`.
pub struct PgClusterProvider {
    db: Database,
    config: ClusterConfig,
    registry: MemberRegistry,
    heartbeat: Arc<HeartbeatLoop>,
    heartbeat_handle: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl PgClusterProvider {
    /// Join the cluster as a new member.
    ///
    /// Control processes are counted right away. Members register as
    /// `joining` and are counted only after [`activate`](Self::activate).
    /// On failure the database handle is closed before the error is returned.
    pub async fn join(
        db: Database,
        config: ClusterConfig,
        role: MemberRole,
        services: Vec<String>,
    ) -> Result<Self> {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let mut local = MemberInfo::new_local(hostname, role, services);
        local.status = initial_status(role);

        let registry = MemberRegistry::new(db.pool().clone(), config.name.clone(), local);
        if let Err(e) = Self::register(&db, &registry, &config).await {
            db.close().await;
            return Err(e);
        }

        let heartbeat = Arc::new(HeartbeatLoop::new(
            db.pool().clone(),
            registry.local_id(),
            config.heartbeat_interval(),
        ));
        let runner = heartbeat.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        tracing::info!(
            member = %registry.local_id(),
            role = %role,
            cluster = %config.name,
            "Joined cluster"
        );

        Ok(Self {
            db,
            config,
            registry,
            heartbeat,
            heartbeat_handle: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
        })
    }

    async fn register(
        db: &Database,
        registry: &MemberRegistry,
        config: &ClusterConfig,
    ) -> Result<()> {
        ensure_schema(db.pool()).await?;

        match registry.purge_expired(config.dead_threshold() * PURGE_FACTOR).await {
            Ok(0) => {}
            Ok(n) => tracing::debug!("Purged {} expired member rows", n),
            Err(e) => tracing::warn!("Failed to purge expired members: {}", e),
        }

        registry.register().await
    }

    /// Mark the local member active so it is counted and targeted.
    pub async fn activate(&self) -> Result<()> {
        self.registry.set_status(MemberStatus::Active).await?;
        tracing::debug!(member = %self.registry.local_id(), "Member active");
        Ok(())
    }

    /// The database handle this provider owns.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// NOTIFY channel carrying invocations.
    pub fn channel(&self) -> &str {
        &self.config.channel
    }
}

/// Status a freshly joined process registers with.
///
/// A member must not be targeted before it listens for invocations.
fn initial_status(role: MemberRole) -> MemberStatus {
    match role {
        MemberRole::Control => MemberStatus::Active,
        MemberRole::Member => MemberStatus::Joining,
    }
}

/// Encode an invocation for NOTIFY, rejecting payloads the server would refuse.
pub fn encode_invocation(invocation: &Invocation) -> Result<String> {
    let payload = invocation.encode()?;
    if payload.len() > MAX_NOTIFY_PAYLOAD {
        return Err(CohortError::InvalidArgument(format!(
            "Invocation payload is {} bytes, limit is {}",
            payload.len(),
            MAX_NOTIFY_PAYLOAD
        )));
    }
    Ok(payload)
}

impl ClusterProvider for PgClusterProvider {
    fn local_member(&self) -> &MemberInfo {
        self.registry.local_member()
    }

    fn members(&self) -> Pin<Box<dyn Future<Output = Result<Vec<MemberInfo>>> + Send + '_>> {
        Box::pin(async move { self.registry.live_members(self.config.dead_threshold()).await })
    }

    fn resolve_service<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ServiceHandle>> + Send + 'a>> {
        Box::pin(async move {
            let members = self
                .registry
                .members_running(name, self.config.dead_threshold())
                .await?;

            if members.is_empty() {
                return Err(CohortError::ServiceNotFound(name.to_string()));
            }
            Ok(ServiceHandle::new(name, members))
        })
    }

    fn broadcast<'a>(
        &'a self,
        service: &'a ServiceHandle,
        command: &'a RemoteCommand,
        targets: &'a [MemberId],
    ) -> Pin<Box<dyn Future<Output = Result<Uuid>> + Send + 'a>> {
        Box::pin(async move {
            let invocation = Invocation::new(
                service.name.clone(),
                self.registry.local_id(),
                targets.to_vec(),
                *command,
            );
            let payload = encode_invocation(&invocation)?;

            sqlx::query("SELECT pg_notify($1, $2)")
                .bind(&self.config.channel)
                .bind(&payload)
                .execute(self.db.pool())
                .await
                .map_err(|e| CohortError::Cluster(format!("Broadcast failed: {}", e)))?;

            Ok(invocation.id)
        })
    }

    fn shutdown(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if self.closed.swap(true, Ordering::SeqCst) {
                return;
            }

            if let Err(e) = self.registry.set_status(MemberStatus::Leaving).await {
                tracing::warn!("Failed to set leaving status: {}", e);
            }

            self.heartbeat.stop();
            let handle = self
                .heartbeat_handle
                .lock()
                .ok()
                .and_then(|mut guard| guard.take());
            if let Some(handle) = handle {
                let _ = handle.await;
            }

            if let Err(e) = self.registry.deregister().await {
                tracing::warn!("Failed to leave cluster: {}", e);
            }
            self.db.close().await;

            tracing::info!(member = %self.registry.local_id(), "Left cluster");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_members_join_inactive_until_listening() {
        assert_eq!(initial_status(MemberRole::Member), MemberStatus::Joining);
        assert_eq!(initial_status(MemberRole::Control), MemberStatus::Active);
    }

    #[test]
    fn test_encode_small_invocation() {
        let invocation = Invocation::new(
            "InvocationService",
            MemberId::new(),
            vec![MemberId::new(), MemberId::new()],
            RemoteCommand::terminate_after(Duration::from_secs(2)),
        );

        let payload = tokio_test::assert_ok!(encode_invocation(&invocation));
        assert!(payload.len() <= MAX_NOTIFY_PAYLOAD);
        assert_eq!(Invocation::decode(&payload).unwrap(), invocation);
    }

    #[test]
    fn test_oversized_invocation_rejected() {
        // Each target costs ~39 bytes of JSON; 300 of them exceed the limit.
        let targets = (0..300).map(|_| MemberId::new()).collect();
        let invocation = Invocation::new(
            "InvocationService",
            MemberId::new(),
            targets,
            RemoteCommand::terminate_after(Duration::from_secs(2)),
        );

        let err = encode_invocation(&invocation).unwrap_err();
        assert!(matches!(err, CohortError::InvalidArgument(_)));
    }
}
