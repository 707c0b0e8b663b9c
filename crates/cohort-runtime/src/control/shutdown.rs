use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use cohort_core::cluster::{ClusterProvider, RemoteCommand};
use cohort_core::config::ControlConfig;
use cohort_core::error::Result;

use super::fanout::FanoutInvoker;
use super::probe::MembershipProbe;

/// Cluster stop configuration.
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Service the terminate command is broadcast through.
    pub invocation_service: String,
    /// Grace period each member waits before exiting.
    pub terminate_delay: Duration,
    /// Wait before the residual membership check.
    pub settle_delay: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self::from(&ControlConfig::default())
    }
}

impl From<&ControlConfig> for ShutdownConfig {
    fn from(config: &ControlConfig) -> Self {
        Self {
            invocation_service: config.invocation_service.clone(),
            terminate_delay: config.terminate_delay(),
            settle_delay: config.settle_delay(),
        }
    }
}

/// Result of a stop request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReport {
    /// The invocation service did not resolve, so there was nothing to stop.
    AlreadyStopped,
    /// Terminate was broadcast.
    Requested {
        invocation_id: Uuid,
        targets: usize,
        /// Members seen after the settle delay, if the re-check succeeded.
        residual_members: Option<usize>,
    },
}

/// Stops every other member of the cluster.
pub struct ShutdownCoordinator {
    provider: Arc<dyn ClusterProvider>,
    config: ShutdownConfig,
}

impl ShutdownCoordinator {
    pub fn new(provider: Arc<dyn ClusterProvider>, config: ShutdownConfig) -> Self {
        Self { provider, config }
    }

    /// Broadcast terminate, wait for members to go, then report what is left.
    ///
    /// Nothing is retried. The residual check is informational and its
    /// failure only produces a warning.
    pub async fn run(&self) -> Result<ShutdownReport> {
        let handle = match self
            .provider
            .resolve_service(&self.config.invocation_service)
            .await
        {
            Ok(handle) => handle,
            Err(e) if e.is_service_not_found() => {
                tracing::info!(
                    service = %self.config.invocation_service,
                    "Invocation service not running, cluster already stopped"
                );
                return Ok(ShutdownReport::AlreadyStopped);
            }
            Err(e) => return Err(e),
        };

        let invoker = FanoutInvoker::new(self.provider.clone(), handle.name.clone());
        let command = RemoteCommand::terminate_after(self.config.terminate_delay);
        let receipt = invoker.broadcast_via(&handle, command).await?;

        tracing::info!(
            "Requested shutdown of {} members, waiting {:?}",
            receipt.targets,
            self.config.settle_delay
        );
        tokio::time::sleep(self.config.settle_delay).await;

        let residual_members = match MembershipProbe::new(self.provider.clone())
            .member_count()
            .await
        {
            Ok(count) => {
                tracing::info!("{} members remain after shutdown request", count);
                Some(count)
            }
            Err(e) => {
                tracing::warn!("Failed to re-check membership: {}", e);
                None
            }
        };

        Ok(ShutdownReport::Requested {
            invocation_id: receipt.invocation_id,
            targets: receipt.targets,
            residual_members,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_core::testing::MockClusterProvider;
    use cohort_core::CohortError;
    use tokio::time::Instant;

    fn coordinator(provider: Arc<MockClusterProvider>) -> ShutdownCoordinator {
        ShutdownCoordinator::new(provider, ShutdownConfig::default())
    }

    #[test]
    fn test_config_from_control_defaults() {
        let config = ShutdownConfig::default();
        assert_eq!(config.invocation_service, "InvocationService");
        assert_eq!(config.terminate_delay, Duration::from_secs(2));
        assert_eq!(config.settle_delay, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unresolvable_service_is_noop() {
        let provider = Arc::new(MockClusterProvider::new().with_member_counts([3]));
        let start = Instant::now();

        let report = coordinator(provider.clone()).run().await.unwrap();

        assert_eq!(report, ShutdownReport::AlreadyStopped);
        provider.assert_broadcast_count(0);
        assert_eq!(provider.members_calls(), 0);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcasts_then_rechecks_after_settle_delay() {
        let provider = Arc::new(
            MockClusterProvider::new()
                .with_member_counts([3, 1])
                .with_service("InvocationService", [true]),
        );
        let start = Instant::now();

        let report = coordinator(provider.clone()).run().await.unwrap();

        provider.assert_broadcast_count(1);
        provider.assert_local_never_targeted();
        let sent = &provider.broadcasts()[0];
        assert_eq!(sent.targets.len(), 2);
        assert_eq!(sent.command, RemoteCommand::TerminateSelf { delay_ms: 2000 });
        assert_eq!(
            report,
            ShutdownReport::Requested {
                invocation_id: sent.id,
                targets: 2,
                residual_members: Some(1),
            }
        );
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_recheck_is_not_an_error() {
        let provider = Arc::new(
            MockClusterProvider::new()
                .with_member_counts([2])
                .with_members_fault("connection reset")
                .with_service("InvocationService", [true]),
        );

        let report = coordinator(provider.clone()).run().await.unwrap();

        assert!(matches!(
            report,
            ShutdownReport::Requested {
                residual_members: None,
                ..
            }
        ));
        assert_eq!(provider.members_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_fault_is_returned() {
        let provider = Arc::new(
            MockClusterProvider::new()
                .with_member_counts([2])
                .with_service("InvocationService", [true])
                .with_broadcast_fault("channel closed"),
        );

        let err = coordinator(provider).run().await.unwrap_err();
        assert!(matches!(err, CohortError::Cluster(_)));
    }
}
