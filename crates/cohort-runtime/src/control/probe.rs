use std::sync::Arc;

use cohort_core::cluster::ClusterProvider;
use cohort_core::control::ProbeResult;
use cohort_core::error::Result;

/// One-shot view of membership size and service availability.
#[derive(Clone)]
pub struct MembershipProbe {
    provider: Arc<dyn ClusterProvider>,
}

impl MembershipProbe {
    pub fn new(provider: Arc<dyn ClusterProvider>) -> Self {
        Self { provider }
    }

    /// Count the current members.
    ///
    /// Provider faults are returned as-is and never retried here.
    pub async fn member_count(&self) -> Result<usize> {
        Ok(self.provider.members().await?.len())
    }

    /// Count members and check whether `service` resolves.
    ///
    /// A failed lookup means the service is not up yet, so it is reported as
    /// `service_found = false` instead of an error.
    pub async fn probe(&self, service: &str) -> Result<ProbeResult> {
        let member_count = self.member_count().await?;

        let service_found = match self.provider.resolve_service(service).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(service, "Service lookup failed: {}", e);
                false
            }
        };

        Ok(ProbeResult::new(member_count, service_found))
    }
}
