use std::sync::Arc;

use uuid::Uuid;

use cohort_core::cluster::{ClusterProvider, MemberId, MemberInfo, RemoteCommand, ServiceHandle};
use cohort_core::error::Result;

/// Every member except `local`, in snapshot order.
pub fn target_set(members: &[MemberInfo], local: &MemberId) -> Vec<MemberId> {
    members
        .iter()
        .map(|m| m.id)
        .filter(|id| id != local)
        .collect()
}

/// What the transport accepted for one broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutReceipt {
    pub invocation_id: Uuid,
    pub targets: usize,
}

/// Sends one command to all other members through a named service.
pub struct FanoutInvoker {
    provider: Arc<dyn ClusterProvider>,
    service: String,
}

impl FanoutInvoker {
    pub fn new(provider: Arc<dyn ClusterProvider>, service: impl Into<String>) -> Self {
        Self {
            provider,
            service: service.into(),
        }
    }

    /// Resolve the service, then broadcast through it.
    pub async fn broadcast(&self, command: RemoteCommand) -> Result<FanoutReceipt> {
        let handle = self.provider.resolve_service(&self.service).await?;
        self.broadcast_via(&handle, command).await
    }

    /// Broadcast through an already resolved service.
    ///
    /// Returns once the send is accepted. Remote execution is not confirmed.
    pub async fn broadcast_via(
        &self,
        handle: &ServiceHandle,
        command: RemoteCommand,
    ) -> Result<FanoutReceipt> {
        let members = self.provider.members().await?;
        let targets = target_set(&members, &self.provider.local_member().id);

        let invocation_id = self.provider.broadcast(handle, &command, &targets).await?;

        tracing::info!(
            invocation = %invocation_id,
            service = %handle.name,
            command = command.kind(),
            targets = targets.len(),
            "Broadcast sent"
        );

        Ok(FanoutReceipt {
            invocation_id,
            targets: targets.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohort_core::cluster::MemberRole;
    use cohort_core::testing::MockClusterProvider;
    use std::time::Duration;

    fn member() -> MemberInfo {
        MemberInfo::new_local("host".to_string(), MemberRole::Member, vec![])
    }

    #[test]
    fn test_target_set_excludes_local() {
        let local = member();
        let a = member();
        let b = member();
        let members = vec![a.clone(), local.clone(), b.clone()];

        assert_eq!(target_set(&members, &local.id), vec![a.id, b.id]);
    }

    #[test]
    fn test_target_set_of_lone_member_is_empty() {
        let local = member();
        assert!(target_set(&[local.clone()], &local.id).is_empty());
        assert!(target_set(&[], &local.id).is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_targets_all_others() {
        let provider = Arc::new(
            MockClusterProvider::new()
                .with_member_counts([4])
                .with_service("InvocationService", [true]),
        );
        let invoker = FanoutInvoker::new(provider.clone(), "InvocationService");

        let receipt = invoker
            .broadcast(RemoteCommand::terminate_after(Duration::from_secs(2)))
            .await
            .unwrap();

        assert_eq!(receipt.targets, 3);
        provider.assert_broadcast_count(1);
        provider.assert_local_never_targeted();
        let sent = &provider.broadcasts()[0];
        assert_eq!(sent.id, receipt.invocation_id);
        assert_eq!(sent.service, "InvocationService");
        assert_eq!(sent.command, RemoteCommand::TerminateSelf { delay_ms: 2000 });
    }

    #[tokio::test]
    async fn test_unresolvable_service_sends_nothing() {
        let provider = Arc::new(MockClusterProvider::new().with_member_counts([3]));
        let invoker = FanoutInvoker::new(provider.clone(), "InvocationService");

        let err = invoker
            .broadcast(RemoteCommand::terminate_after(Duration::from_secs(2)))
            .await
            .unwrap_err();

        assert!(err.is_service_not_found());
        provider.assert_broadcast_count(0);
    }

    #[tokio::test]
    async fn test_transport_fault_is_returned() {
        let provider = Arc::new(
            MockClusterProvider::new()
                .with_member_counts([2])
                .with_broadcast_fault("channel closed"),
        );
        let invoker = FanoutInvoker::new(provider, "InvocationService");
        let handle = ServiceHandle::new("InvocationService", vec![]);

        assert!(invoker
            .broadcast_via(&handle, RemoteCommand::terminate_after(Duration::from_secs(2)))
            .await
            .is_err());
    }
}
